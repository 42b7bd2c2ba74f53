// src/report.rs
use crate::types::{Address, CollisionMatch, Report, ScanDiagnostics, Transaction};

/// Assembles the final audit report. Pure aggregation: all filtering has
/// already happened in detection, this only stamps the generation time.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    target_address: Address,
    target_ledger: Vec<Transaction>,
    matches: Vec<CollisionMatch>,
    diagnostics: ScanDiagnostics,
}

impl ReportBuilder {
    pub fn new(target_address: Address) -> Self {
        Self {
            target_address,
            target_ledger: Vec::new(),
            matches: Vec::new(),
            diagnostics: ScanDiagnostics::default(),
        }
    }

    pub fn ledger(mut self, target_ledger: Vec<Transaction>) -> Self {
        self.target_ledger = target_ledger;
        self
    }

    pub fn matches(mut self, matches: Vec<CollisionMatch>) -> Self {
        self.matches = matches;
        self
    }

    pub fn diagnostics(mut self, diagnostics: ScanDiagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn build(self) -> Report {
        Report {
            target_address: self.target_address,
            generated_at: chrono::Utc::now(),
            target_ledger: self.target_ledger,
            matches: self.matches,
            diagnostics: self.diagnostics,
        }
    }
}
