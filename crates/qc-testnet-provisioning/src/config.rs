//! # Provisioning Configuration
//!
//! One immutable struct handed by reference to every component. Values come
//! from defaults, an optional TOML file, `QC_*` environment overrides and
//! finally CLI flags, in that order.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QC_NODE_PORT` | `network.port` |
//! | `QC_STORAGE_ROOT` | `network.storage_root` |
//! | `QC_MAX_PARALLEL_NODES` | `concurrency.max_parallel_nodes` |
//! | `QC_MAX_PARALLEL_UPLOADS` | `concurrency.max_parallel_uploads` |
//! | `QC_FETCH_TIMEOUT_SECS` | `fetch.timeout_secs` |

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{ProvisioningError, Result, DEFAULT_ACCOUNT_BALANCE, DEFAULT_BASE_WEIGHT};

/// Port every node listens on.
pub const DEFAULT_NODE_PORT: u16 = 34553;

/// Complete provisioning configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Node networking and storage overrides.
    pub network: NetworkSettings,
    /// Chainspec tuning constants.
    pub tuning: ProtocolTuning,
    /// Genesis ledger amounts.
    pub ledger: LedgerSettings,
    /// Directory and binary naming.
    pub layout: LayoutSettings,
    /// Worker pool bounds.
    pub concurrency: ConcurrencySettings,
    /// Release download settings.
    pub fetch: FetchSettings,
}

impl ProvisioningConfig {
    /// Load a TOML config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(ProvisioningError::io(path))?;
        toml::from_str(&contents).map_err(|e| {
            ProvisioningError::InvalidConfig(format!("{}: {e}", path.display()))
        })
    }

    /// Apply `QC_*` environment overrides. Unparseable values are ignored with a warning.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(port) = env_parse("QC_NODE_PORT") {
            self.network.port = port;
        }
        if let Ok(root) = env::var("QC_STORAGE_ROOT") {
            self.network.storage_root = root;
        }
        if let Some(n) = env_parse("QC_MAX_PARALLEL_NODES") {
            self.concurrency.max_parallel_nodes = n;
        }
        if let Some(n) = env_parse("QC_MAX_PARALLEL_UPLOADS") {
            self.concurrency.max_parallel_uploads = n;
        }
        if let Some(secs) = env_parse("QC_FETCH_TIMEOUT_SECS") {
            self.fetch.timeout_secs = secs;
        }
        self
    }

    /// Reject values that cannot produce a working network.
    pub fn validate(&self) -> Result<()> {
        if self.network.port == 0 {
            return Err(ProvisioningError::InvalidConfig(
                "network.port must be non-zero".to_string(),
            ));
        }
        if self.concurrency.max_parallel_nodes == 0 || self.concurrency.max_parallel_uploads == 0 {
            return Err(ProvisioningError::InvalidConfig(
                "concurrency limits must be at least 1".to_string(),
            ));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ProvisioningError::InvalidConfig(
                "fetch.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.layout.project_dir.is_empty() || self.layout.project_dir.contains('/') {
            return Err(ProvisioningError::InvalidConfig(format!(
                "layout.project_dir '{}' must be a single path component",
                self.layout.project_dir
            )));
        }
        if self.ledger.base_weight.checked_add(u128::from(u64::MAX)).is_none() {
            return Err(ProvisioningError::InvalidConfig(format!(
                "ledger.base_weight {} leaves no room for per-validator increments",
                self.ledger.base_weight
            )));
        }
        Ok(())
    }

    /// Small, fast configuration for tests.
    pub fn for_testing() -> Self {
        Self {
            concurrency: ConcurrencySettings {
                max_parallel_nodes: 2,
                max_parallel_uploads: 2,
            },
            fetch: FetchSettings { timeout_secs: 5 },
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Per-node network and storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Port used for public, bind and known addresses.
    pub port: u16,
    /// `network.gossip_interval` in milliseconds.
    pub gossip_interval_ms: i64,
    /// `logging.format` written into node configs.
    pub log_format: String,
    /// Parent of the per-node storage directories.
    pub storage_root: String,
    /// Secret key path relative to the versioned config directory.
    pub secret_key_path: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_NODE_PORT,
            gossip_interval_ms: 120_000,
            log_format: "json".to_string(),
            storage_root: "/storage".to_string(),
            secret_key_path: "../keys/secret_key.pem".to_string(),
        }
    }
}

impl NetworkSettings {
    /// Storage directory of a node.
    pub fn storage_path(&self, address: &str) -> String {
        format!("{}/{}", self.storage_root.trim_end_matches('/'), address)
    }
}

/// Chainspec constants tuned for short-lived test networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolTuning {
    /// `core.unbonding_delay` in eras.
    pub unbonding_delay: i64,
    /// `core.auction_delay` in eras.
    pub auction_delay: i64,
    /// `core.era_duration`.
    pub era_duration: String,
    /// `deploys.block_max_transfer_count`.
    pub block_max_transfer_count: i64,
    /// `highway.minimum_round_exponent`, written when the section exists.
    pub minimum_round_exponent: i64,
    /// `highway.maximum_round_exponent`, written when the section exists.
    pub maximum_round_exponent: i64,
}

impl Default for ProtocolTuning {
    fn default() -> Self {
        Self {
            unbonding_delay: 7,
            auction_delay: 1,
            era_duration: "15min".to_string(),
            block_max_transfer_count: 500,
            minimum_round_exponent: 13,
            maximum_round_exponent: 16,
        }
    }
}

/// Genesis account amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Balance of every account, in motes.
    pub balance: u128,
    /// Stake of the first validator; later validators get `+1` each.
    pub base_weight: u128,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            balance: DEFAULT_ACCOUNT_BALANCE,
            base_weight: DEFAULT_BASE_WEIGHT,
        }
    }
}

/// Directory and executable names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Name of the `etc/<project>` and `var/lib/<project>` directories.
    pub project_dir: String,
    /// Node executable, staged under `bin/<version>/`.
    pub node_binary: String,
    /// Launcher executable, staged under `bin/`.
    pub launcher_binary: String,
    /// Client executable, staged under `bin/` for full network creation.
    pub client_binary: String,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            project_dir: "casper".to_string(),
            node_binary: "casper-node".to_string(),
            launcher_binary: "casper-node-launcher".to_string(),
            client_binary: "casper-client".to_string(),
        }
    }
}

/// Worker pool bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    /// Concurrent per-node tasks.
    pub max_parallel_nodes: usize,
    /// Concurrent object uploads.
    pub max_parallel_uploads: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 4,
            max_parallel_uploads: 8,
        }
    }
}

/// Release download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Whole-request timeout per archive.
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProvisioningConfig::default();
        assert_eq!(config.network.port, 34553);
        assert_eq!(config.network.gossip_interval_ms, 120_000);
        assert_eq!(config.tuning.unbonding_delay, 7);
        assert_eq!(config.tuning.era_duration, "15min");
        assert_eq!(config.ledger.base_weight, 10u128.pow(13));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_path() {
        let mut settings = NetworkSettings::default();
        assert_eq!(settings.storage_path("node-1"), "/storage/node-1");
        settings.storage_root = "/data/".to_string();
        assert_eq!(settings.storage_path("node-1"), "/data/node-1");
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let config: ProvisioningConfig = toml::from_str(
            r#"
[network]
port = 40000

[layout]
project_dir = "qc"
"#,
        )
        .unwrap();
        assert_eq!(config.network.port, 40000);
        assert_eq!(config.network.log_format, "json");
        assert_eq!(config.layout.project_dir, "qc");
        assert_eq!(config.layout.node_binary, "casper-node");
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = ProvisioningConfig::for_testing();
        config.concurrency.max_parallel_nodes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nested_project_dir() {
        let mut config = ProvisioningConfig::default();
        config.layout.project_dir = "a/b".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_base_weight() {
        let mut config = ProvisioningConfig::for_testing();
        config.ledger.base_weight = u128::MAX - 3;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ProvisioningError::InvalidConfig(ref msg) if msg.contains("base_weight")));

        config.ledger.base_weight = u128::MAX - u128::from(u64::MAX);
        assert!(config.validate().is_ok());
    }
}
