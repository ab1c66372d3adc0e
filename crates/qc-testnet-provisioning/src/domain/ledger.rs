//! # Genesis Account Ledger
//!
//! Account records and their `accounts.toml` rendering.

use std::fmt;

use serde::Serialize;

use super::errors::{ProvisioningError, Result};

/// Balance credited to every genesis account, in motes (10^32).
pub const DEFAULT_ACCOUNT_BALANCE: u128 = 100_000_000_000_000_000_000_000_000_000_000;

/// Stake of the first validator in staking order (10^13); each following
/// validator gets one mote more.
pub const DEFAULT_BASE_WEIGHT: u128 = 10_000_000_000_000;

/// Hex-encoded account public key as written by the key generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey(String);

impl PublicKey {
    /// Parse a key from generator output. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProvisioningError::InvalidConfig(
                "public key is empty".to_string(),
            ));
        }
        hex::decode(trimmed).map_err(|e| {
            ProvisioningError::InvalidConfig(format!("public key '{trimmed}' is not hex: {e}"))
        })?;
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Key from raw bytes (tag byte included).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Hex string form.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of genesis account; controls how the stake is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    /// Funding account for test transfers.
    Faucet,
    /// Bonded validator.
    Validator,
    /// Funded node operator without stake.
    ZeroWeight,
}

/// One genesis account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// Account key.
    pub public_key: PublicKey,
    /// Liquid balance in motes.
    pub balance: u128,
    /// Bonded stake in motes.
    pub bonded_amount: u128,
    /// Account kind.
    pub kind: AccountKind,
}

/// Ordered genesis accounts: faucet, staked validators, zero-weight operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLedger {
    accounts: Vec<AccountRecord>,
}

#[derive(Serialize)]
struct LedgerDocument {
    delegators: Vec<toml::Table>,
    accounts: Vec<AccountEntry>,
}

#[derive(Serialize)]
struct AccountEntry {
    public_key: String,
    balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bonded_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validator: Option<ValidatorEntry>,
}

#[derive(Serialize)]
struct ValidatorEntry {
    bonded_amount: String,
}

impl AccountLedger {
    /// Wrap an ordered list of accounts.
    pub fn new(accounts: Vec<AccountRecord>) -> Self {
        Self { accounts }
    }

    /// All accounts in ledger order.
    pub fn accounts(&self) -> &[AccountRecord] {
        &self.accounts
    }

    /// The faucet account, always first.
    pub fn faucet(&self) -> Option<&AccountRecord> {
        self.accounts.first().filter(|a| a.kind == AccountKind::Faucet)
    }

    /// Look an account up by key.
    pub fn find(&self, key: &PublicKey) -> Option<&AccountRecord> {
        self.accounts.iter().find(|a| &a.public_key == key)
    }

    /// Number of accounts including the faucet.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Render as `accounts.toml`.
    ///
    /// Amounts are decimal strings (they exceed 64 bits). Validators carry
    /// their stake under `validator.bonded_amount`.
    pub fn to_toml_string(&self) -> Result<String> {
        let accounts = self
            .accounts
            .iter()
            .map(|account| {
                let (bonded_amount, validator) = match account.kind {
                    AccountKind::Validator => (
                        None,
                        Some(ValidatorEntry {
                            bonded_amount: account.bonded_amount.to_string(),
                        }),
                    ),
                    AccountKind::Faucet | AccountKind::ZeroWeight => {
                        (Some(account.bonded_amount.to_string()), None)
                    }
                };
                AccountEntry {
                    public_key: account.public_key.as_hex().to_string(),
                    balance: account.balance.to_string(),
                    bonded_amount,
                    validator,
                }
            })
            .collect();

        let document = LedgerDocument {
            delegators: Vec::new(),
            accounts,
        };

        toml::to_string(&document).map_err(|e| {
            ProvisioningError::InvalidConfig(format!("failed to serialize accounts: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PublicKey {
        PublicKey::parse(s).unwrap()
    }

    #[test]
    fn test_public_key_trims_whitespace() {
        let k = PublicKey::parse("  01ab\n").unwrap();
        assert_eq!(k.as_hex(), "01ab");
    }

    #[test]
    fn test_public_key_rejects_non_hex() {
        assert!(PublicKey::parse("zz").is_err());
        assert!(PublicKey::parse("   ").is_err());
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_ACCOUNT_BALANCE, 10u128.pow(32));
        assert_eq!(DEFAULT_BASE_WEIGHT, 10u128.pow(13));
    }

    #[test]
    fn test_toml_rendering_shapes() {
        let ledger = AccountLedger::new(vec![
            AccountRecord {
                public_key: key("01aa"),
                balance: DEFAULT_ACCOUNT_BALANCE,
                bonded_amount: 0,
                kind: AccountKind::Faucet,
            },
            AccountRecord {
                public_key: key("01bb"),
                balance: DEFAULT_ACCOUNT_BALANCE,
                bonded_amount: DEFAULT_BASE_WEIGHT,
                kind: AccountKind::Validator,
            },
        ]);

        let rendered = ledger.to_toml_string().unwrap();
        let parsed: toml::Table = toml::from_str(&rendered).unwrap();

        let accounts = parsed["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0]["bonded_amount"].as_str(), Some("0"));
        assert_eq!(
            accounts[1]["validator"]["bonded_amount"].as_str(),
            Some("10000000000000")
        );
        assert_eq!(
            accounts[1]["balance"].as_str(),
            Some("100000000000000000000000000000000")
        );
        assert!(parsed["delegators"].as_array().unwrap().is_empty());
    }
}
