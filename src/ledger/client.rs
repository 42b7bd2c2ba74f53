// src/ledger/client.rs
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerSource, clamp_sample_size};
use crate::types::{Address, Direction, Transaction};

/// Public ledger-query service endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.trongrid.io";

/// Decimal precision assumed when the upstream omits token metadata.
/// Kept at 6 on purpose: the reference deployment displays amounts under
/// this assumption, so changing it silently changes reported amounts for
/// tokens with non-6 precision.
pub const DEFAULT_TOKEN_DECIMALS: u32 = 6;

/// Real ledger source backed by the TRC-20 transfer-history API.
#[derive(Debug, Clone)]
pub struct TronGridClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransferPage {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<TransferRecord>,
}

#[derive(Debug, Deserialize)]
struct TransferRecord {
    block_timestamp: i64,
    from: String,
    to: String,
    value: String,
    #[serde(default)]
    token_info: Option<TokenInfo>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    decimals: Option<u32>,
}

impl TransferRecord {
    fn into_transaction(self, reference: &Address) -> EngineResult<Transaction> {
        let timestamp = chrono::DateTime::from_timestamp_millis(self.block_timestamp)
            .ok_or_else(|| {
                EngineError::UpstreamRejected(format!(
                    "unrepresentable timestamp {}",
                    self.block_timestamp
                ))
            })?;
        let raw: f64 = self.value.parse().map_err(|_| {
            EngineError::UpstreamRejected(format!("non-numeric value {:?}", self.value))
        })?;
        let decimals = self
            .token_info
            .and_then(|t| t.decimals)
            .unwrap_or(DEFAULT_TOKEN_DECIMALS);

        let from = Address::normalized(&self.from);
        let to = Address::normalized(&self.to);
        let direction = Direction::relative_to(reference, &from);

        Ok(Transaction {
            timestamp,
            from,
            to,
            amount: raw / 10f64.powi(decimals as i32),
            direction,
        })
    }
}

impl TronGridClient {
    pub fn new(api_key: Option<String>, timeout_secs: u64) -> EngineResult<Self> {
        Self::with_base_url(DEFAULT_API_BASE, api_key, timeout_secs)
    }

    /// Point the client at another endpoint (mirror deployments, tests).
    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EngineError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn parse_page(page: TransferPage, reference: &Address) -> EngineResult<Vec<Transaction>> {
        if !page.success {
            return Err(EngineError::UpstreamRejected(
                "upstream flagged the query unsuccessful".to_string(),
            ));
        }
        page.data
            .into_iter()
            .map(|record| record.into_transaction(reference))
            .collect()
    }
}

#[async_trait]
impl LedgerSource for TronGridClient {
    async fn fetch_ledger(&self, address: &Address, limit: u32) -> EngineResult<Vec<Transaction>> {
        let limit = clamp_sample_size(limit);
        let url = format!(
            "{}/v1/accounts/{}/transactions/trc20",
            self.base_url, address
        );
        debug!(%address, limit, "fetching transfer history");

        let mut request = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string())]);
        if let Some(key) = &self.api_key {
            request = request.header("TRON-PRO-API-KEY", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout
            } else {
                EngineError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::UpstreamRejected(format!("HTTP {status}: {body}")));
        }

        let page: TransferPage = response
            .json()
            .await
            .map_err(|e| EngineError::UpstreamRejected(format!("malformed payload: {e}")))?;

        Self::parse_page(page, address)
    }
}
