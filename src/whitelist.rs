// src/whitelist.rs
use std::collections::HashSet;
use crate::types::{Address, MerchantWallet};

/// Immutable snapshot of every registered merchant address.
///
/// Built once per scan and shared by sampling and detection, so a merchant
/// added mid-scan can never be excluded from only part of the pipeline.
/// Any address in here is suppressed as evidence of risk.
#[derive(Debug, Clone)]
pub struct WhitelistRegistry {
    addresses: HashSet<Address>,
}

impl WhitelistRegistry {
    pub fn from_merchants(merchants: &[MerchantWallet]) -> Self {
        Self {
            addresses: merchants.iter().map(|m| m.address.clone()).collect(),
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant(addr: &str) -> MerchantWallet {
        MerchantWallet::new("shop", Address::normalized(addr))
    }

    #[test]
    fn membership_uses_normalized_form() {
        let registry =
            WhitelistRegistry::from_merchants(&[merchant("TMERCHANT0000000000000000000000001")]);

        assert!(registry.contains(&Address::normalized("tmerchant0000000000000000000000001")));
        assert!(registry.contains(&Address::normalized(" TMERCHANT0000000000000000000000001 ")));
        assert!(!registry.contains(&Address::normalized("tother0000000000000000000000000002")));
    }

    #[test]
    fn duplicate_merchant_addresses_collapse() {
        let registry = WhitelistRegistry::from_merchants(&[
            merchant("TMERCHANT0000000000000000000000001"),
            merchant("tmerchant0000000000000000000000001"),
        ]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_registry() {
        let registry = WhitelistRegistry::from_merchants(&[]);
        assert!(registry.is_empty());
    }
}
