// src/lib.rs
pub mod types;
pub mod error;
pub mod ledger;
pub mod whitelist;
pub mod sampler;
pub mod detector;
pub mod report;

pub use crate::error::{EngineError, EngineResult};
pub use crate::ledger::{FixtureLedger, LedgerSource, RetryPolicy, TronGridClient};
pub use crate::types::*;
pub use crate::whitelist::WhitelistRegistry;

use crate::detector::CollisionDetector;
use crate::ledger::retry::retry_with_backoff;
use crate::report::ReportBuilder;
use crate::sampler::CustomerSampler;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// The two-layer collision engine.
///
/// Wraps an injectable ledger source and exposes one operation: scan a
/// reported target address against a snapshot of registered merchant
/// wallets and produce an immutable [`Report`]. Each scan is a fresh,
/// stateless computation over freshly fetched data.
#[derive(Clone)]
pub struct RiskEngine {
    source: Arc<dyn LedgerSource>,
    config: ScanConfig,
}

impl RiskEngine {
    /// Create an engine over any ledger source.
    pub fn new(source: Arc<dyn LedgerSource>, config: ScanConfig) -> Self {
        Self { source, config }
    }

    /// Create an engine backed by the real ledger-query service.
    pub fn trongrid(api_key: Option<String>, config: ScanConfig) -> EngineResult<Self> {
        let client = TronGridClient::new(api_key, config.request_timeout_secs)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run a full scan with a throwaway session. Use [`run_scan_with`] to
    /// observe progress or cancel.
    ///
    /// [`run_scan_with`]: RiskEngine::run_scan_with
    pub async fn run_scan(
        &self,
        target: &str,
        merchants: &[MerchantWallet],
    ) -> EngineResult<Report> {
        let mut session = ScanSession::new();
        self.run_scan_with(target, merchants, &mut session).await
    }

    /// Run a full scan, advancing `session` through the pipeline phases
    /// and honoring its cancellation flag between suspension points.
    pub async fn run_scan_with(
        &self,
        target: &str,
        merchants: &[MerchantWallet],
        session: &mut ScanSession,
    ) -> EngineResult<Report> {
        let outcome = self.scan_inner(target, merchants, session).await;
        match &outcome {
            Ok(report) => {
                info!(
                    address = %report.target_address,
                    matches = report.matches.len(),
                    "scan complete"
                );
                session.advance(ScanPhase::Complete);
            }
            Err(EngineError::Cancelled) => session.advance(ScanPhase::Cancelled),
            Err(err) => {
                warn!(error = %err, category = err.category(), "scan failed");
                session.advance(ScanPhase::Failed);
            }
        }
        outcome
    }

    async fn scan_inner(
        &self,
        target: &str,
        merchants: &[MerchantWallet],
        session: &mut ScanSession,
    ) -> EngineResult<Report> {
        // Fail fast, before any network call.
        if merchants.is_empty() {
            return Err(EngineError::InvalidInput(
                "merchant registry is empty".to_string(),
            ));
        }
        let target = Address::parse(target)?;

        // One whitelist snapshot gates the whole scan.
        let whitelist = WhitelistRegistry::from_merchants(merchants);
        let mut diagnostics = ScanDiagnostics::default();

        session.advance(ScanPhase::FetchingTarget);
        self.check_cancelled(session)?;
        let target_ledger = self
            .fetch_with_retry(&target, self.config.target_sample_size, &mut diagnostics)
            .await
            .map_err(EngineError::target_fetch)?;
        info!(address = %target, transfers = target_ledger.len(), "target ledger fetched");

        session.advance(ScanPhase::SamplingCustomers);
        let mut sampled: Vec<(MerchantWallet, Vec<CustomerSample>)> =
            Vec::with_capacity(merchants.len());
        for merchant in merchants {
            self.check_cancelled(session)?;
            let ledger = match self
                .fetch_with_retry(
                    &merchant.address,
                    self.config.merchant_sample_size,
                    &mut diagnostics,
                )
                .await
            {
                Ok(ledger) => ledger,
                Err(err) => {
                    warn!(
                        merchant = %merchant.display_name,
                        error = %err,
                        "merchant ledger fetch failed, sampling no customers"
                    );
                    diagnostics.merchant_fetches_failed += 1;
                    Vec::new()
                }
            };
            self.pace().await;

            let mut customers = CustomerSampler::sample_customers(merchant, &ledger);
            customers.truncate(self.config.max_customers_per_merchant);
            diagnostics.customers_sampled += customers.len() as u32;
            sampled.push((merchant.clone(), customers));
        }

        session.advance(ScanPhase::CrossMatching);
        let detector = CollisionDetector::new(&whitelist, Arc::clone(&self.source), &self.config);
        let matches = detector
            .detect(&target, &target_ledger, &sampled, session, &mut diagnostics)
            .await?;

        Ok(ReportBuilder::new(target)
            .ledger(target_ledger)
            .matches(matches)
            .diagnostics(diagnostics)
            .build())
    }

    async fn fetch_with_retry(
        &self,
        address: &Address,
        limit: u32,
        diagnostics: &mut ScanDiagnostics,
    ) -> EngineResult<Vec<Transaction>> {
        let source = Arc::clone(&self.source);
        let address_owned = address.clone();

        retry_with_backoff(
            &self.config.retry,
            "ledger fetch",
            &mut diagnostics.retries_performed,
            move || {
                let source = Arc::clone(&source);
                let address = address_owned.clone();
                async move { source.fetch_ledger(&address, limit).await }
            },
        )
        .await
    }

    fn check_cancelled(&self, session: &ScanSession) -> EngineResult<()> {
        if session.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    async fn pace(&self) {
        if self.config.request_pacing_ms > 0 {
            sleep(Duration::from_millis(self.config.request_pacing_ms)).await;
        }
    }
}
