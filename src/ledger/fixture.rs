// src/ledger/fixture.rs
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerSource, clamp_sample_size};
use crate::types::{Address, Direction, Transaction};

/// Fixed epoch for fixture timestamps so repeated runs see identical data.
const FIXTURE_EPOCH_MS: i64 = 1_700_000_000_000;
const FIXTURE_SPACING_MS: i64 = 3_600_000;

/// Failure kinds a fixture can inject for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureFailure {
    RateLimited,
    UpstreamRejected,
    Network,
}

impl FixtureFailure {
    fn to_error(self) -> EngineError {
        match self {
            FixtureFailure::RateLimited => EngineError::RateLimited,
            FixtureFailure::UpstreamRejected => {
                EngineError::UpstreamRejected("fixture rejection".to_string())
            }
            FixtureFailure::Network => EngineError::Network("fixture outage".to_string()),
        }
    }
}

struct FailurePlan {
    kind: FixtureFailure,
    remaining: AtomicU32,
}

impl FailurePlan {
    /// Consume one planned failure, if any are left.
    fn take(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Deterministic in-memory ledger source.
///
/// The second `LedgerSource` implementation next to the network client:
/// ledgers are registered per address at build time, transfers come back
/// newest-first in registration order, and failures can be injected per
/// address to exercise retry and absorption paths without a network.
#[derive(Default)]
pub struct FixtureLedger {
    ledgers: HashMap<Address, Vec<FixtureTransfer>>,
    failures: HashMap<Address, FailurePlan>,
}

struct FixtureTransfer {
    from: Address,
    to: Address,
    amount: f64,
}

impl FixtureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transfer on `owner`'s ledger. The first transfer
    /// registered for an owner is its newest.
    pub fn with_transfer(mut self, owner: &Address, from: &Address, to: &Address, amount: f64) -> Self {
        self.ledgers
            .entry(owner.clone())
            .or_default()
            .push(FixtureTransfer {
                from: from.clone(),
                to: to.clone(),
                amount,
            });
        self
    }

    /// Make the next `times` fetches for `owner` fail with `kind` before
    /// the registered ledger becomes reachable.
    pub fn fail_with(mut self, owner: &Address, kind: FixtureFailure, times: u32) -> Self {
        self.failures.insert(
            owner.clone(),
            FailurePlan {
                kind,
                remaining: AtomicU32::new(times),
            },
        );
        self
    }

    /// Make every fetch for `owner` fail with `kind`.
    pub fn fail_always(self, owner: &Address, kind: FixtureFailure) -> Self {
        self.fail_with(owner, kind, u32::MAX)
    }
}

#[async_trait]
impl LedgerSource for FixtureLedger {
    async fn fetch_ledger(&self, address: &Address, limit: u32) -> EngineResult<Vec<Transaction>> {
        if let Some(plan) = self.failures.get(address) {
            if plan.take() {
                debug!(%address, "fixture injecting {:?}", plan.kind);
                return Err(plan.kind.to_error());
            }
        }

        let limit = clamp_sample_size(limit) as usize;
        let transfers = match self.ledgers.get(address) {
            Some(transfers) => transfers,
            None => return Ok(Vec::new()),
        };

        Ok(transfers
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, t)| Transaction {
                timestamp: chrono::DateTime::from_timestamp_millis(
                    FIXTURE_EPOCH_MS - i as i64 * FIXTURE_SPACING_MS,
                )
                .unwrap_or(chrono::DateTime::UNIX_EPOCH),
                from: t.from.clone(),
                to: t.to.clone(),
                amount: t.amount,
                direction: Direction::relative_to(address, &t.from),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: &str) -> Address {
        Address::normalized(&format!("t{tag:0<33}"))
    }

    #[tokio::test]
    async fn unknown_address_yields_empty_ledger() {
        let fixture = FixtureLedger::new();
        let ledger = fixture.fetch_ledger(&addr("nobody"), 10).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn transfers_come_back_in_registration_order_with_direction() {
        let owner = addr("owner");
        let peer = addr("peer");
        let fixture = FixtureLedger::new()
            .with_transfer(&owner, &owner, &peer, 12.5)
            .with_transfer(&owner, &peer, &owner, 3.0);

        let ledger = fixture.fetch_ledger(&owner, 10).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].direction, Direction::Out);
        assert_eq!(ledger[1].direction, Direction::In);
        assert!(ledger[0].timestamp > ledger[1].timestamp);
    }

    #[tokio::test]
    async fn repeated_fetches_are_identical() {
        let owner = addr("owner");
        let peer = addr("peer");
        let fixture = FixtureLedger::new().with_transfer(&owner, &owner, &peer, 1.0);

        let first = fixture.fetch_ledger(&owner, 10).await.unwrap();
        let second = fixture.fetch_ledger(&owner, 10).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn planned_failures_run_out_then_data_flows() {
        let owner = addr("owner");
        let peer = addr("peer");
        let fixture = FixtureLedger::new()
            .with_transfer(&owner, &owner, &peer, 1.0)
            .fail_with(&owner, FixtureFailure::RateLimited, 2);

        assert!(matches!(
            fixture.fetch_ledger(&owner, 10).await,
            Err(EngineError::RateLimited)
        ));
        assert!(matches!(
            fixture.fetch_ledger(&owner, 10).await,
            Err(EngineError::RateLimited)
        ));
        let ledger = fixture.fetch_ledger(&owner, 10).await.unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn always_failing_address_never_recovers() {
        let owner = addr("owner");
        let fixture = FixtureLedger::new().fail_always(&owner, FixtureFailure::Network);

        for _ in 0..5 {
            assert!(fixture.fetch_ledger(&owner, 10).await.is_err());
        }
    }
}
