//! # Artifact Bundles
//!
//! Value objects describing packaged and published artifacts.

use std::path::PathBuf;

use super::entities::ProtocolVersion;

/// Versioned pair of archives for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    /// Network the bundle belongs to.
    pub network_name: String,
    /// Protocol version of the staged binaries and config.
    pub version: ProtocolVersion,
    /// `target/<version>/bin.tar.gz`.
    pub bin_archive: PathBuf,
    /// `target/<version>/config.tar.gz`.
    pub config_archive: PathBuf,
    /// Hex SHA-256 of the binary archive.
    pub bin_sha256: String,
    /// Hex SHA-256 of the config archive.
    pub config_sha256: String,
}

/// Archives downloaded from a remote release location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedRelease {
    /// Version that was fetched.
    pub version: ProtocolVersion,
    /// Local copy of `bin.tar.gz`.
    pub bin_archive: PathBuf,
    /// Local copy of `config.tar.gz`.
    pub config_archive: PathBuf,
}

/// Outcome of a publish run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Object keys uploaded, sorted.
    pub keys: Vec<String>,
    /// Total bytes uploaded.
    pub bytes: u64,
}

/// Remote object key for a file under a network's target tree.
pub fn object_key(network_name: &str, relative_path: &str) -> String {
    format!(
        "networks/{}/{}",
        network_name,
        relative_path.trim_start_matches('/')
    )
}
