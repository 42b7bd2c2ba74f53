// src/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use crate::error::EngineError;
use crate::ledger::retry::RetryPolicy;

/// Minimum length of a plausible wallet address after normalization.
pub const MIN_ADDRESS_LEN: usize = 30;

/// Network prefix of a mainnet address, compared after lower-casing.
pub const ADDRESS_PREFIX: char = 't';

/// A wallet address, held in normalized (trimmed, lower-cased) form.
///
/// Two addresses are equal iff their normalized forms are equal, so the
/// derived `Eq`/`Hash` are the comparison the whole engine relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Parse operator-supplied input, rejecting anything that does not look
    /// like a mainnet wallet address.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let addr = Self::normalized(raw);
        if addr.0.len() < MIN_ADDRESS_LEN || !addr.0.starts_with(ADDRESS_PREFIX) {
            return Err(EngineError::InvalidInput(format!(
                "not a valid wallet address: {raw:?}"
            )));
        }
        Ok(addr)
    }

    /// Normalize without validating. Used for endpoints taken from upstream
    /// ledger records, which the upstream already vouches for.
    pub fn normalized(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = EngineError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Ok(Self::normalized(&raw))
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

/// Transfer direction relative to the address the ledger was fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Derived, not stored upstream: outbound iff the sender is the
    /// reference address.
    pub fn relative_to(reference: &Address, from: &Address) -> Self {
        if from == reference { Direction::Out } else { Direction::In }
    }
}

/// A single transfer record, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub from: Address,
    pub to: Address,
    pub amount: f64,
    pub direction: Direction,
}

impl Transaction {
    /// Whether either endpoint is the given address.
    pub fn involves(&self, addr: &Address) -> bool {
        &self.from == addr || &self.to == addr
    }
}

/// A registered merchant wallet. Owned by the external registry; the engine
/// treats it as read-only input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantWallet {
    pub id: Uuid,
    pub display_name: String,
    pub address: Address,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

impl MerchantWallet {
    pub fn new(display_name: impl Into<String>, address: Address) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            address,
            registered_at: chrono::Utc::now(),
        }
    }
}

/// A merchant's derived customer: an address that received an outbound
/// transfer from the merchant wallet. Recomputed every scan, never persisted.
#[derive(Debug, Clone)]
pub struct CustomerSample {
    pub merchant_id: Uuid,
    pub customer_address: Address,
    pub evidence_transactions: Vec<Transaction>,
}

/// How a collision was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// The target address is itself a sampled customer of the merchant.
    DirectHit,
    /// The target transacted directly with a customer of the merchant.
    DirectTransfer,
    /// The target and a customer share a non-whitelisted third-party node.
    ThirdPartyNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    High,
    Warning,
}

impl MatchType {
    /// Total, fixed mapping from match type to risk level.
    pub fn risk_level(self) -> RiskLevel {
        match self {
            MatchType::DirectHit => RiskLevel::Critical,
            MatchType::DirectTransfer => RiskLevel::High,
            MatchType::ThirdPartyNode => RiskLevel::Warning,
        }
    }
}

/// One detected, whitelist-filtered overlap between the target's footprint
/// and a merchant's customer footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionMatch {
    pub merchant_id: Uuid,
    pub merchant_name: String,
    pub customer_address: Address,
    /// `None` for a direct hit, the counterparty or common node otherwise.
    pub related_address: Option<Address>,
    pub match_type: MatchType,
    pub risk_level: RiskLevel,
    /// The single retained evidence transaction. Absent only for a direct
    /// hit against an empty target ledger.
    pub evidence: Option<Transaction>,
    pub narrative: String,
}

/// Counters for absorbed failures and work performed during one scan.
/// Surfaced on the report so upstream degradation is visible to operators
/// instead of silently swallowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanDiagnostics {
    pub merchant_fetches_failed: u32,
    pub customer_fetches_failed: u32,
    pub customers_sampled: u32,
    pub customer_ledgers_scanned: u32,
    pub retries_performed: u32,
}

/// The single output artifact of a scan. Immutable, not merged across scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub target_address: Address,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub target_ledger: Vec<Transaction>,
    pub matches: Vec<CollisionMatch>,
    pub diagnostics: ScanDiagnostics,
}

/// Tunables for one scan. Defaults mirror the upstream request budget the
/// engine was calibrated against.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// How many recent transfers to pull for the target address.
    pub target_sample_size: u32,
    /// How many recent transfers to pull per merchant wallet.
    pub merchant_sample_size: u32,
    /// How many recent transfers to pull per sampled customer.
    pub customer_sample_size: u32,
    /// Cap on customers penetrated per merchant. Precision/cost trade-off,
    /// not a correctness requirement.
    pub max_customers_per_merchant: usize,
    pub retry: RetryPolicy,
    /// Delay between consecutive upstream requests, to stay inside the
    /// ledger service's rate budget.
    pub request_pacing_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target_sample_size: 15,
            merchant_sample_size: 15,
            customer_sample_size: 10,
            max_customers_per_merchant: 5,
            retry: RetryPolicy::default(),
            request_pacing_ms: 200,
            request_timeout_secs: 10,
        }
    }
}

/// Pipeline stage of a scan, advanced by the engine as it works.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    FetchingTarget,
    SamplingCustomers,
    CrossMatching,
    Complete,
    Failed,
    Cancelled,
}

/// Per-scan state owned by the caller and threaded through the pipeline.
/// Holds the current phase and the cancellation flag the engine checks
/// between suspension points.
#[derive(Debug)]
pub struct ScanSession {
    phase: ScanPhase,
    cancelled: Arc<AtomicBool>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            phase: ScanPhase::Idle,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Handle the caller can use to abort the scan from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn advance(&mut self, phase: ScanPhase) {
        self.phase = phase;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancels the associated scan at its next suspension point.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_normalizes_case_and_whitespace() {
        let a = Address::parse("  TQoapgEJrsvVcUmKaLgVEz2nWAJA988888  ").unwrap();
        let b = Address::parse("tqoapgejrsvvcumkalgvez2nwaja988888").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "tqoapgejrsvvcumkalgvez2nwaja988888");
    }

    #[test]
    fn address_rejects_short_or_foreign_input() {
        assert!(Address::parse("TShort").is_err());
        assert!(Address::parse("0x00000000000000000000000000000000000000ab").is_err());
        assert!(Address::parse("").is_err());
    }

    #[test]
    fn normalized_accepts_anything() {
        let a = Address::normalized(" WeIrD ");
        assert_eq!(a.as_str(), "weird");
    }

    #[test]
    fn direction_is_relative_to_reference() {
        let me = Address::normalized("txaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa01");
        let other = Address::normalized("txbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb02");
        assert_eq!(Direction::relative_to(&me, &me), Direction::Out);
        assert_eq!(Direction::relative_to(&me, &other), Direction::In);
    }

    #[test]
    fn risk_mapping_is_fixed() {
        assert_eq!(MatchType::DirectHit.risk_level(), RiskLevel::Critical);
        assert_eq!(MatchType::DirectTransfer.risk_level(), RiskLevel::High);
        assert_eq!(MatchType::ThirdPartyNode.risk_level(), RiskLevel::Warning);
    }

    #[test]
    fn session_starts_idle_and_cancels() {
        let session = ScanSession::new();
        assert_eq!(session.phase(), ScanPhase::Idle);
        assert!(!session.is_cancelled());

        let handle = session.cancel_handle();
        handle.cancel();
        assert!(session.is_cancelled());
    }
}
