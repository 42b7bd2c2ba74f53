// src/detector.rs
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};
use crate::ledger::{LedgerSource, retry::retry_with_backoff};
use crate::types::{
    Address, CollisionMatch, CustomerSample, MatchType, MerchantWallet, ScanConfig,
    ScanDiagnostics, ScanSession, Transaction,
};
use crate::whitelist::WhitelistRegistry;

/// The two-layer collision core: cross-references a target address against
/// each merchant's sampled customers, penetrating one level into every
/// customer's own ledger.
///
/// Whitelisted addresses are filtered out of every step, never merely
/// deprioritized: a relationship that runs through a registered merchant is
/// normal business, not risk.
pub struct CollisionDetector<'a> {
    whitelist: &'a WhitelistRegistry,
    source: Arc<dyn LedgerSource>,
    config: &'a ScanConfig,
}

impl<'a> CollisionDetector<'a> {
    pub fn new(
        whitelist: &'a WhitelistRegistry,
        source: Arc<dyn LedgerSource>,
        config: &'a ScanConfig,
    ) -> Self {
        Self {
            whitelist,
            source,
            config,
        }
    }

    /// Every third-party counterparty in the target's ledger: all endpoints
    /// that are neither the target itself nor whitelisted.
    pub fn extract_neighbors(&self, target: &Address, ledger: &[Transaction]) -> HashSet<Address> {
        let mut neighbors = HashSet::new();
        for tx in ledger {
            for endpoint in [&tx.from, &tx.to] {
                if endpoint != target && !self.whitelist.contains(endpoint) {
                    neighbors.insert(endpoint.clone());
                }
            }
        }
        neighbors
    }

    /// Run detection across every (merchant, customer-sample) pair, in
    /// registry order and sampler order. Each customer contributes at most
    /// one match; a merchant may contribute through several customers.
    ///
    /// A customer whose ledger cannot be fetched is skipped, logged and
    /// counted; only the caller's target fetch is fatal to a scan.
    pub async fn detect(
        &self,
        target: &Address,
        target_ledger: &[Transaction],
        merchants: &[(MerchantWallet, Vec<CustomerSample>)],
        session: &ScanSession,
        diagnostics: &mut ScanDiagnostics,
    ) -> EngineResult<Vec<CollisionMatch>> {
        let neighbors = self.extract_neighbors(target, target_ledger);
        debug!(neighbor_count = neighbors.len(), "extracted target neighbor set");

        let mut matches = Vec::new();

        for (merchant, customers) in merchants {
            for sample in customers {
                if session.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }

                let customer = &sample.customer_address;
                if self.whitelist.contains(customer) {
                    continue;
                }

                if customer == target {
                    debug!(merchant = %merchant.display_name, "direct hit on sampled customer");
                    matches.push(self.direct_hit(merchant, customer, target_ledger));
                    continue;
                }

                let fetched = self
                    .fetch_customer_ledger(customer, &mut diagnostics.retries_performed)
                    .await;
                self.pace().await;

                let ledger = match fetched {
                    Ok(ledger) => ledger,
                    Err(err) => {
                        warn!(
                            customer = %customer,
                            error = %err,
                            "customer ledger fetch failed, skipping customer"
                        );
                        diagnostics.customer_fetches_failed += 1;
                        continue;
                    }
                };
                diagnostics.customer_ledgers_scanned += 1;

                if let Some(found) = self.match_customer(target, &neighbors, merchant, customer, &ledger)
                {
                    matches.push(found);
                }
            }
        }

        Ok(matches)
    }

    /// Scan one customer's transactions in received order and return the
    /// first qualifying, non-excluded collision. Transactions touching a
    /// whitelisted address are excluded wholesale, not just their merchant
    /// endpoint.
    fn match_customer(
        &self,
        target: &Address,
        neighbors: &HashSet<Address>,
        merchant: &MerchantWallet,
        customer: &Address,
        ledger: &[Transaction],
    ) -> Option<CollisionMatch> {
        for tx in ledger {
            if self.whitelist.contains(&tx.from) || self.whitelist.contains(&tx.to) {
                continue;
            }

            if tx.involves(target) {
                return Some(CollisionMatch {
                    merchant_id: merchant.id,
                    merchant_name: merchant.display_name.clone(),
                    customer_address: customer.clone(),
                    related_address: Some(target.clone()),
                    match_type: MatchType::DirectTransfer,
                    risk_level: MatchType::DirectTransfer.risk_level(),
                    evidence: Some(tx.clone()),
                    narrative: format!(
                        "Target has exchanged funds on-chain with {}'s customer {}.",
                        merchant.display_name, customer
                    ),
                });
            }

            // From-side wins when both endpoints are known neighbors.
            let node = if neighbors.contains(&tx.from) {
                &tx.from
            } else if neighbors.contains(&tx.to) {
                &tx.to
            } else {
                continue;
            };
            if node == target || node == customer {
                continue;
            }

            return Some(CollisionMatch {
                merchant_id: merchant.id,
                merchant_name: merchant.display_name.clone(),
                customer_address: customer.clone(),
                related_address: Some(node.clone()),
                match_type: MatchType::ThirdPartyNode,
                risk_level: MatchType::ThirdPartyNode.risk_level(),
                evidence: Some(tx.clone()),
                narrative: format!(
                    "Target and {}'s customer {} have both moved funds through external address {}.",
                    merchant.display_name, customer, node
                ),
            });
        }
        None
    }

    fn direct_hit(
        &self,
        merchant: &MerchantWallet,
        customer: &Address,
        target_ledger: &[Transaction],
    ) -> CollisionMatch {
        CollisionMatch {
            merchant_id: merchant.id,
            merchant_name: merchant.display_name.clone(),
            customer_address: customer.clone(),
            related_address: None,
            match_type: MatchType::DirectHit,
            risk_level: MatchType::DirectHit.risk_level(),
            evidence: target_ledger.first().cloned(),
            narrative: format!(
                "Target address appears verbatim in {}'s payout recipient list.",
                merchant.display_name
            ),
        }
    }

    async fn fetch_customer_ledger(
        &self,
        customer: &Address,
        retries: &mut u32,
    ) -> EngineResult<Vec<Transaction>> {
        let source = Arc::clone(&self.source);
        let address = customer.clone();
        let limit = self.config.customer_sample_size;

        retry_with_backoff(&self.config.retry, "customer ledger fetch", retries, move || {
            let source = Arc::clone(&source);
            let address = address.clone();
            async move { source.fetch_ledger(&address, limit).await }
        })
        .await
    }

    async fn pace(&self) {
        if self.config.request_pacing_ms > 0 {
            sleep(Duration::from_millis(self.config.request_pacing_ms)).await;
        }
    }
}
