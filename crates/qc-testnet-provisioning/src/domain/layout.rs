//! # On-Disk Layout
//!
//! Path arithmetic for one network's output tree:
//!
//! ```text
//! <root>/
//! ├── nodes/<address>/etc/<project>/<version>/config.toml, chainspec.toml, ...
//! ├── nodes/<address>/etc/<project>/keys/{secret_key.pem,public_key_hex,faucet/}
//! ├── nodes/<address>/var/lib/<project>/
//! ├── staging/{bin,config}/<version>/
//! ├── staging/faucet/
//! ├── release/<version>/              (remote release downloads)
//! └── target/<version>/{bin.tar.gz,config.tar.gz}, target/protocol_versions
//! ```

use std::path::{Path, PathBuf};

use super::entities::ProtocolVersion;

/// Genesis specification file name.
pub const CHAINSPEC_FILE: &str = "chainspec.toml";
/// Account ledger file name.
pub const ACCOUNTS_FILE: &str = "accounts.toml";
/// Per-node config file name.
pub const CONFIG_FILE: &str = "config.toml";
/// Example node config file name.
pub const EXAMPLE_CONFIG_FILE: &str = "config-example.toml";
/// Secret key file written by the key generator.
pub const SECRET_KEY_FILE: &str = "secret_key.pem";
/// Public key file written by the key generator.
pub const PUBLIC_KEY_HEX_FILE: &str = "public_key_hex";
/// Binary archive name.
pub const BIN_ARCHIVE: &str = "bin.tar.gz";
/// Config archive name.
pub const CONFIG_ARCHIVE: &str = "config.tar.gz";
/// Registry of packaged versions under `target/`.
pub const PROTOCOL_VERSIONS_FILE: &str = "protocol_versions";

/// Paths of one network tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkLayout {
    root: PathBuf,
    project: String,
}

impl NetworkLayout {
    /// Layout rooted at `root`; `project` names the `etc/` and `var/lib/` subdirectories.
    pub fn new(root: impl Into<PathBuf>, project: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project: project.into(),
        }
    }

    /// Network root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn nodes_dir(&self) -> PathBuf {
        self.root.join("nodes")
    }

    pub fn node_dir(&self, address: &str) -> PathBuf {
        self.nodes_dir().join(address)
    }

    fn node_etc(&self, address: &str) -> PathBuf {
        self.node_dir(address).join("etc").join(&self.project)
    }

    /// Versioned config directory of a node.
    pub fn node_config_dir(&self, address: &str, version: &ProtocolVersion) -> PathBuf {
        self.node_etc(address).join(version.dir_name())
    }

    /// Key directory of a node, sibling of its versioned config directories.
    pub fn node_keys_dir(&self, address: &str) -> PathBuf {
        self.node_etc(address).join("keys")
    }

    pub fn node_faucet_keys_dir(&self, address: &str) -> PathBuf {
        self.node_keys_dir(address).join("faucet")
    }

    pub fn node_var_lib(&self, address: &str) -> PathBuf {
        self.node_dir(address)
            .join("var")
            .join("lib")
            .join(&self.project)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn staging_bin_dir(&self) -> PathBuf {
        self.staging_dir().join("bin")
    }

    pub fn staging_bin_version_dir(&self, version: &ProtocolVersion) -> PathBuf {
        self.staging_bin_dir().join(version.dir_name())
    }

    pub fn staging_config_dir(&self) -> PathBuf {
        self.staging_dir().join("config")
    }

    pub fn staging_config_version_dir(&self, version: &ProtocolVersion) -> PathBuf {
        self.staging_config_dir().join(version.dir_name())
    }

    pub fn staging_faucet_dir(&self) -> PathBuf {
        self.staging_dir().join("faucet")
    }

    pub fn release_dir(&self, version: &ProtocolVersion) -> PathBuf {
        self.root.join("release").join(version.dir_name())
    }

    pub fn target_dir(&self) -> PathBuf {
        self.root.join("target")
    }

    pub fn target_version_dir(&self, version: &ProtocolVersion) -> PathBuf {
        self.target_dir().join(version.dir_name())
    }

    pub fn protocol_versions_file(&self) -> PathBuf {
        self.target_dir().join(PROTOCOL_VERSIONS_FILE)
    }
}
