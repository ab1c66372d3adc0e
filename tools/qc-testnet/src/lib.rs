//! # QC-Testnet
//!
//! Command-line front end for `qc-testnet-provisioning`.
//!
//! ## Commands
//!
//! | Command | Effect |
//! |---------|--------|
//! | `create-network` | new network tree, keys, configs, genesis accounts, archives |
//! | `add-joiners` | joiner nodes for an existing tree |
//! | `package` | `target/<version>/{bin,config}.tar.gz` from the staged tree |
//! | `publish` | upload `target/` to an object store or a directory |
//! | `fetch` | download and unpack a release |

pub mod cli;
pub mod commands;

use anyhow::{Context, Result};
use qc_testnet_provisioning::ProvisioningConfig;

/// Resolve the provisioning config: file, then environment, then CLI flags.
pub fn resolve_config(cli: &cli::Cli) -> Result<ProvisioningConfig> {
    let config = match &cli.config {
        Some(path) => ProvisioningConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ProvisioningConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(limit) = cli.max_parallel {
        config.concurrency.max_parallel_nodes = limit;
    }
    config.validate()?;
    Ok(config)
}
