//! # Account Ledger Builder
//!
//! Stake weights depend on the staking ordinal only:
//! `bonded_amount(i) = base_weight + i`. Identical key lists always give an
//! identical ledger.

use crate::config::LedgerSettings;
use crate::domain::{AccountKind, AccountLedger, AccountRecord, PublicKey};

/// Builds the genesis account ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerBuilder {
    balance: u128,
    base_weight: u128,
}

impl LedgerBuilder {
    pub fn new(settings: &LedgerSettings) -> Self {
        Self {
            balance: settings.balance,
            base_weight: settings.base_weight,
        }
    }

    /// Stake of the validator at staking ordinal `ordinal`.
    pub fn weight(&self, ordinal: usize) -> u128 {
        self.base_weight.saturating_add(ordinal as u128)
    }

    /// Faucet first, then `staked` in staking order, then `zero_weight`.
    pub fn build(
        &self,
        faucet: PublicKey,
        staked: Vec<PublicKey>,
        zero_weight: Vec<PublicKey>,
    ) -> AccountLedger {
        let mut accounts = Vec::with_capacity(1 + staked.len() + zero_weight.len());

        accounts.push(self.record(faucet, 0, AccountKind::Faucet));
        accounts.extend(
            staked
                .into_iter()
                .enumerate()
                .map(|(i, key)| self.record(key, self.weight(i), AccountKind::Validator)),
        );
        accounts.extend(
            zero_weight
                .into_iter()
                .map(|key| self.record(key, 0, AccountKind::ZeroWeight)),
        );

        AccountLedger::new(accounts)
    }

    fn record(&self, public_key: PublicKey, bonded_amount: u128, kind: AccountKind) -> AccountRecord {
        AccountRecord {
            public_key,
            balance: self.balance,
            bonded_amount,
            kind,
        }
    }
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self::new(&LedgerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_ACCOUNT_BALANCE, DEFAULT_BASE_WEIGHT};
    use proptest::prelude::*;

    fn key(n: u8) -> PublicKey {
        PublicKey::from_bytes(&[1, n])
    }

    #[test]
    fn test_ledger_order_and_amounts() {
        let ledger = LedgerBuilder::default().build(key(0), vec![key(1), key(2)], vec![key(3)]);
        let accounts = ledger.accounts();

        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.faucet().unwrap().public_key, key(0));
        assert_eq!(accounts[0].bonded_amount, 0);
        assert_eq!(accounts[1].bonded_amount, DEFAULT_BASE_WEIGHT);
        assert_eq!(accounts[2].bonded_amount, DEFAULT_BASE_WEIGHT + 1);
        assert_eq!(accounts[3].bonded_amount, 0);
        assert_eq!(accounts[3].kind, AccountKind::ZeroWeight);
        assert!(accounts.iter().all(|a| a.balance == DEFAULT_ACCOUNT_BALANCE));
    }

    #[test]
    fn test_custom_settings() {
        let builder = LedgerBuilder::new(&LedgerSettings {
            balance: 5,
            base_weight: 100,
        });
        let ledger = builder.build(key(0), vec![key(1)], vec![]);

        assert_eq!(ledger.accounts()[1].bonded_amount, 100);
        assert_eq!(ledger.accounts()[1].balance, 5);
    }

    #[test]
    fn test_faucet_only() {
        let ledger = LedgerBuilder::default().build(key(9), vec![], vec![]);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.faucet().is_some());
    }

    proptest! {
        #[test]
        fn prop_weights_strictly_increase(count in 1usize..64, base in 0u128..1_000_000_000_000_000) {
            let builder = LedgerBuilder::new(&LedgerSettings { balance: 1, base_weight: base });
            let staked: Vec<PublicKey> = (0..count as u8).map(key).collect();
            let ledger = builder.build(PublicKey::from_bytes(&[2]), staked, vec![]);

            let weights: Vec<u128> = ledger.accounts()[1..].iter().map(|a| a.bonded_amount).collect();
            for (i, weight) in weights.iter().enumerate() {
                prop_assert_eq!(*weight, base + i as u128);
            }
            prop_assert!(weights.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
