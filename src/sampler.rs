// src/sampler.rs
use std::collections::HashMap;
use crate::types::{Address, CustomerSample, MerchantWallet, Transaction};

/// Derives a merchant's real customer set from its own ledger.
///
/// The domain treats the merchant's outbound transfers as rewards/payouts
/// to real customers, so the customer set is exactly the unique recipients
/// of those transfers, order-preserving by first occurrence. Truncating to
/// a bounded prefix is the caller's cost decision, not done here.
pub struct CustomerSampler;

impl CustomerSampler {
    pub fn sample_customers(
        merchant: &MerchantWallet,
        ledger: &[Transaction],
    ) -> Vec<CustomerSample> {
        let mut order: Vec<Address> = Vec::new();
        let mut evidence: HashMap<Address, Vec<Transaction>> = HashMap::new();

        for tx in ledger {
            if tx.from != merchant.address {
                continue;
            }
            evidence
                .entry(tx.to.clone())
                .or_insert_with(|| {
                    order.push(tx.to.clone());
                    Vec::new()
                })
                .push(tx.clone());
        }

        order
            .into_iter()
            .map(|customer_address| CustomerSample {
                merchant_id: merchant.id,
                evidence_transactions: evidence.remove(&customer_address).unwrap_or_default(),
                customer_address,
            })
            .collect()
    }
}
