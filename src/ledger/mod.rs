// src/ledger/mod.rs
pub mod client;
pub mod fixture;
pub mod retry;

pub use client::TronGridClient;
pub use fixture::{FixtureFailure, FixtureLedger};
pub use retry::{RetryPolicy, retry_with_backoff};

use async_trait::async_trait;
use crate::error::EngineResult;
use crate::types::{Address, Transaction};

/// Bounds on the per-address sample size accepted by a ledger source.
pub const MIN_SAMPLE_SIZE: u32 = 8;
pub const MAX_SAMPLE_SIZE: u32 = 40;

pub fn clamp_sample_size(limit: u32) -> u32 {
    limit.clamp(MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE)
}

/// A source of recent transfer records for a wallet address.
///
/// One call is one logical upstream request; retry/backoff is layered on
/// top by the engine so every source gets the same treatment. Records come
/// back in upstream order (newest first) with `direction` computed against
/// the queried address.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    async fn fetch_ledger(&self, address: &Address, limit: u32) -> EngineResult<Vec<Transaction>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_size_is_clamped() {
        assert_eq!(clamp_sample_size(0), MIN_SAMPLE_SIZE);
        assert_eq!(clamp_sample_size(15), 15);
        assert_eq!(clamp_sample_size(500), MAX_SAMPLE_SIZE);
    }
}
