//! Artifact packaging and publishing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quantum_telemetry::{BUNDLES_PACKAGED, BYTES_UPLOADED, OBJECTS_UPLOADED};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::tasks::run_bounded;
use crate::adapters::{archive, fs};
use crate::config::LayoutSettings;
use crate::domain::{
    object_key, ArtifactBundle, NetworkLayout, ProtocolVersion, ProvisioningError, PublishReport,
    Result, ACCOUNTS_FILE, BIN_ARCHIVE, CHAINSPEC_FILE, CONFIG_ARCHIVE, EXAMPLE_CONFIG_FILE,
};
use crate::ports::ObjectStore;

/// Checksum listing written next to the archives.
pub const CHECKSUMS_FILE: &str = "SHA256SUMS";

/// Files that must be staged before anything is packaged.
pub fn required_staged_files(
    layout: &NetworkLayout,
    settings: &LayoutSettings,
    version: &ProtocolVersion,
) -> [PathBuf; 4] {
    let config = layout.staging_config_version_dir(version);
    [
        layout
            .staging_bin_version_dir(version)
            .join(&settings.node_binary),
        config.join(CHAINSPEC_FILE),
        config.join(ACCOUNTS_FILE),
        config.join(EXAMPLE_CONFIG_FILE),
    ]
}

/// Package the staged tree into `target/<version>/`.
///
/// All four staged files are checked first; if any is missing nothing is
/// written. The version is then registered in `target/protocol_versions`.
pub async fn package(
    layout: &NetworkLayout,
    settings: &LayoutSettings,
    network_name: &str,
    version: ProtocolVersion,
) -> Result<ArtifactBundle> {
    for path in required_staged_files(layout, settings, &version) {
        let present = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !present {
            return Err(ProvisioningError::Packaging {
                path,
                reason: "staged file is missing".to_string(),
            });
        }
    }

    let target = layout.target_version_dir(&version);
    fs::create_dir(&target).await?;

    let bin_archive = target.join(BIN_ARCHIVE);
    let config_archive = target.join(CONFIG_ARCHIVE);
    let (bin_sha256, config_sha256) = {
        let bin_source = layout.staging_bin_dir();
        let config_source = layout.staging_config_dir();
        let (bin_archive, config_archive) = (bin_archive.clone(), config_archive.clone());

        tokio::task::spawn_blocking(move || -> Result<(String, String)> {
            archive::create_tar_gz(&bin_source, "bin", &bin_archive)?;
            archive::create_tar_gz(&config_source, "config", &config_archive)?;
            Ok((
                archive::sha256_file(&bin_archive)?,
                archive::sha256_file(&config_archive)?,
            ))
        })
        .await
        .map_err(|e| ProvisioningError::Task(e.to_string()))??
    };

    let checksums = format!("{bin_sha256}  {BIN_ARCHIVE}\n{config_sha256}  {CONFIG_ARCHIVE}\n");
    fs::write_file(&target.join(CHECKSUMS_FILE), checksums).await?;
    register_version(&layout.protocol_versions_file(), &version).await?;

    BUNDLES_PACKAGED.inc();
    info!(
        network = network_name,
        version = %version,
        bin_sha256 = %bin_sha256,
        config_sha256 = %config_sha256,
        "Packaged artifacts"
    );

    Ok(ArtifactBundle {
        network_name: network_name.to_string(),
        version,
        bin_archive,
        config_archive,
        bin_sha256,
        config_sha256,
    })
}

/// Add `version` to the registry file, one directory-form version per line.
async fn register_version(path: &Path, version: &ProtocolVersion) -> Result<()> {
    let existing = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(ProvisioningError::io(path)(e)),
    };

    let entry = version.dir_name();
    let mut versions: Vec<&str> = existing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if versions.contains(&entry.as_str()) {
        return Ok(());
    }
    versions.push(&entry);

    let mut contents = versions.join("\n");
    contents.push('\n');
    fs::write_file(path, contents).await
}

/// Every file under `target_dir` paired with its object key, sorted by path.
fn collect_uploads(target_dir: &Path, network_name: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut uploads = Vec::new();
    for entry in WalkDir::new(target_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| ProvisioningError::Packaging {
            path: target_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(target_dir)
            .map_err(|e| ProvisioningError::Packaging {
                path: entry.path().to_path_buf(),
                reason: e.to_string(),
            })?;
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        uploads.push((
            object_key(network_name, &relative.join("/")),
            entry.path().to_path_buf(),
        ));
    }
    Ok(uploads)
}

/// Upload every file under `target_dir` to `networks/<network_name>/<relative path>`.
///
/// At most `limit` uploads run at once. The first failure cancels the rest
/// and is returned; nothing is retried.
pub async fn publish(
    target_dir: &Path,
    store: Arc<dyn ObjectStore>,
    network_name: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<PublishReport> {
    if !target_dir.is_dir() {
        return Err(ProvisioningError::Packaging {
            path: target_dir.to_path_buf(),
            reason: "nothing to publish".to_string(),
        });
    }

    let uploads = {
        let (dir, name) = (target_dir.to_path_buf(), network_name.to_string());
        tokio::task::spawn_blocking(move || collect_uploads(&dir, &name))
            .await
            .map_err(|e| ProvisioningError::Task(e.to_string()))??
    };
    let keys: Vec<String> = uploads.iter().map(|(key, _)| key.clone()).collect();

    info!(
        objects = uploads.len(),
        destination = %store.describe(),
        "Publishing artifacts"
    );

    let sizes = run_bounded(uploads, limit, cancel, move |(key, path)| {
        let store = Arc::clone(&store);
        async move {
            let body = tokio::fs::read(&path)
                .await
                .map_err(ProvisioningError::io(&path))?;
            let size = body.len() as u64;
            store.put(&key, body).await?;

            OBJECTS_UPLOADED.inc();
            BYTES_UPLOADED.inc_by(size as f64);
            debug!(key = %key, bytes = size, "Published object");
            Ok(size)
        }
    })
    .await?;

    let report = PublishReport {
        keys,
        bytes: sizes.iter().sum(),
    };
    info!(objects = report.keys.len(), bytes = report.bytes, "Published artifacts");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InMemoryObjectStore;

    fn stage(layout: &NetworkLayout, version: &ProtocolVersion) {
        let settings = LayoutSettings::default();
        for path in required_staged_files(layout, &settings, version) {
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, path.display().to_string()).unwrap();
        }
        std::fs::write(layout.staging_bin_dir().join("casper-node-launcher"), "l").unwrap();
    }

    #[tokio::test]
    async fn test_package_writes_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let layout = NetworkLayout::new(dir.path(), "casper");
        let version = ProtocolVersion::new(1, 0, 0);
        stage(&layout, &version);

        let bundle = package(&layout, &LayoutSettings::default(), "chain-1", version)
            .await
            .unwrap();

        assert!(bundle.bin_archive.is_file());
        assert!(bundle.config_archive.is_file());
        assert_eq!(bundle.bin_sha256.len(), 64);
        let sums = std::fs::read_to_string(
            layout.target_version_dir(&version).join(CHECKSUMS_FILE),
        )
        .unwrap();
        assert!(sums.contains(&bundle.config_sha256));
        assert_eq!(
            std::fs::read_to_string(layout.protocol_versions_file()).unwrap(),
            "1_0_0\n"
        );
    }

    #[tokio::test]
    async fn test_package_missing_example_config() {
        let dir = tempfile::tempdir().unwrap();
        let layout = NetworkLayout::new(dir.path(), "casper");
        let version = ProtocolVersion::new(1, 0, 0);
        stage(&layout, &version);
        let missing = layout
            .staging_config_version_dir(&version)
            .join(EXAMPLE_CONFIG_FILE);
        std::fs::remove_file(&missing).unwrap();

        let err = package(&layout, &LayoutSettings::default(), "chain-1", version)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisioningError::Packaging { ref path, .. } if path == &missing));
        assert!(!layout.target_dir().exists());
    }

    #[tokio::test]
    async fn test_versions_registered_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("protocol_versions");

        register_version(&file, &ProtocolVersion::new(1, 0, 0)).await.unwrap();
        register_version(&file, &ProtocolVersion::new(1, 1, 0)).await.unwrap();
        register_version(&file, &ProtocolVersion::new(1, 0, 0)).await.unwrap();

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "1_0_0\n1_1_0\n");
    }

    #[tokio::test]
    async fn test_publish_uploads_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir_all(target.join("1_0_0")).unwrap();
        std::fs::write(target.join("1_0_0/bin.tar.gz"), "abc").unwrap();
        std::fs::write(target.join("protocol_versions"), "1_0_0\n").unwrap();

        let store = Arc::new(InMemoryObjectStore::new());
        let report = publish(&target, store.clone(), "chain-1", 2, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            store.keys(),
            vec![
                "networks/chain-1/1_0_0/bin.tar.gz".to_string(),
                "networks/chain-1/protocol_versions".to_string(),
            ]
        );
        assert_eq!(report.bytes, 9);
        assert_eq!(report.keys, store.keys());
    }

    #[tokio::test]
    async fn test_publish_failure_reports_key() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("protocol_versions"), "1_0_0\n").unwrap();

        let store = Arc::new(InMemoryObjectStore::failing_on("protocol_versions"));
        let err = publish(&target, store, "chain-1", 4, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::Publish { ref key, .. } if key == "networks/chain-1/protocol_versions"
        ));
    }
}
