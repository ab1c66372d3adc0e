//! # Artifact Tests
//!
//! Packaging, publishing and release fetching across module boundaries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use qc_testnet_provisioning::adapters::{create_tar_gz, FsObjectStore, HttpObjectStore};
use qc_testnet_provisioning::application::CHECKSUMS_FILE;
use qc_testnet_provisioning::ports::{InMemoryObjectStore, MockClock, MockKeyGenerator};
use qc_testnet_provisioning::{
    package, publish, BinarySource, NetworkLayout, NetworkPlan, NetworkTopology, ProtocolVersion,
    ProvisioningConfig, ProvisioningError, Provisioner,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// TEST HELPERS
// =============================================================================

const CHAINSPEC: &str = "[network]\nname = \"x\"\ntimestamp = \"x\"\n[core]\n[deploys]\n";
const NODE_CONFIG: &str = "[network]\nknown_addresses = []\n[consensus]\n[logging]\n[storage]\npath = \"/x\"\n";

fn provisioner() -> Provisioner {
    Provisioner::new(
        ProvisioningConfig::for_testing(),
        Arc::new(MockKeyGenerator::new()),
        Arc::new(MockClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
    )
}

/// Create a packaged network under `dir/net` and return its layout.
async fn packaged_network(dir: &std::path::Path) -> NetworkLayout {
    let inputs = dir.join("inputs");
    std::fs::create_dir_all(&inputs).unwrap();
    for (name, body) in [
        ("chainspec.toml", CHAINSPEC),
        ("config.toml", NODE_CONFIG),
        ("node", "n"),
        ("launcher", "l"),
    ] {
        std::fs::write(inputs.join(name), body).unwrap();
    }

    let plan = NetworkPlan {
        root: dir.join("net"),
        network_name: "net".to_string(),
        version: ProtocolVersion::new(1, 0, 0),
        genesis_offset: TimeDelta::seconds(60),
        chainspec_template: Some(inputs.join("chainspec.toml")),
        config_template: Some(inputs.join("config.toml")),
        binaries: BinarySource::Local {
            node: inputs.join("node"),
            launcher: inputs.join("launcher"),
            client: None,
        },
        package: true,
    };
    provisioner()
        .create_network(&plan, &NetworkTopology::from_counts(2, 0).unwrap())
        .await
        .unwrap();
    NetworkLayout::new(dir.join("net"), "casper")
}

// =============================================================================
// PACKAGING
// =============================================================================

#[tokio::test]
async fn test_repackage_keeps_single_registry_entry() {
    let dir = tempfile::tempdir().unwrap();
    let layout = packaged_network(dir.path()).await;
    let config = ProvisioningConfig::for_testing();
    let version = ProtocolVersion::new(1, 0, 0);

    let bundle = package(&layout, &config.layout, "net", version).await.unwrap();

    let sums = std::fs::read_to_string(layout.target_version_dir(&version).join(CHECKSUMS_FILE))
        .unwrap();
    assert!(sums.contains(&format!("{}  bin.tar.gz", bundle.bin_sha256)));
    assert_eq!(
        std::fs::read_to_string(layout.protocol_versions_file()).unwrap(),
        "1_0_0\n"
    );
}

#[tokio::test]
async fn test_package_without_staging_fails() {
    let dir = tempfile::tempdir().unwrap();
    let layout = NetworkLayout::new(dir.path(), "casper");
    let config = ProvisioningConfig::for_testing();

    let err = package(&layout, &config.layout, "net", ProtocolVersion::new(1, 0, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisioningError::Packaging { .. }));
}

// =============================================================================
// PUBLISHING
// =============================================================================

#[tokio::test]
async fn test_publish_to_directory_store() {
    let dir = tempfile::tempdir().unwrap();
    let layout = packaged_network(dir.path()).await;
    let bucket = dir.path().join("bucket");

    let report = publish(
        &layout.target_dir(),
        Arc::new(FsObjectStore::new(&bucket)),
        "net",
        2,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.keys.len(), 4);
    for key in &report.keys {
        assert!(key.starts_with("networks/net/"));
        assert!(bucket.join(key).is_file(), "missing {key}");
    }
}

#[tokio::test]
async fn test_publish_to_memory_store_matches_files() {
    let dir = tempfile::tempdir().unwrap();
    let layout = packaged_network(dir.path()).await;
    let store = Arc::new(InMemoryObjectStore::new());

    publish(
        &layout.target_dir(),
        store.clone(),
        "net",
        4,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let registry = store.get("networks/net/protocol_versions").unwrap();
    assert_eq!(registry, b"1_0_0\n".to_vec());
}

#[tokio::test]
async fn test_publish_cancelled_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let layout = packaged_network(dir.path()).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = publish(
        &layout.target_dir(),
        Arc::new(InMemoryObjectStore::new()),
        "net",
        1,
        &cancel,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisioningError::Cancelled));
}

#[tokio::test]
async fn test_publish_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let layout = packaged_network(dir.path()).await;
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(4)
        .mount(&server)
        .await;

    let store = HttpObjectStore::new(server.uri(), "testnets", Duration::from_secs(5))
        .unwrap()
        .with_bearer_token("s3cret");
    let report = publish(
        &layout.target_dir(),
        Arc::new(store),
        "net",
        2,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.keys.len(), 4);
}

// =============================================================================
// REMOTE RELEASES
// =============================================================================

#[tokio::test]
async fn test_create_network_from_remote_release() {
    let dir = tempfile::tempdir().unwrap();

    // Build release archives shaped like packaged output
    let staging = dir.path().join("release-src");
    std::fs::create_dir_all(staging.join("bin/1_0_0")).unwrap();
    std::fs::create_dir_all(staging.join("config/1_0_0")).unwrap();
    std::fs::write(staging.join("bin/1_0_0/casper-node"), "n").unwrap();
    std::fs::write(staging.join("bin/casper-node-launcher"), "l").unwrap();
    std::fs::write(staging.join("config/1_0_0/chainspec.toml"), CHAINSPEC).unwrap();
    std::fs::write(staging.join("config/1_0_0/config-example.toml"), NODE_CONFIG).unwrap();
    let bin_archive = dir.path().join("bin.tar.gz");
    let config_archive = dir.path().join("config.tar.gz");
    create_tar_gz(&staging.join("bin"), "bin", &bin_archive).unwrap();
    create_tar_gz(&staging.join("config"), "config", &config_archive).unwrap();

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/1_0_0/bin.tar.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(std::fs::read(&bin_archive).unwrap()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/releases/1_0_0/config.tar.gz"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(std::fs::read(&config_archive).unwrap()),
        )
        .mount(&server)
        .await;

    let plan = NetworkPlan {
        root: dir.path().join("net"),
        network_name: "remote-net".to_string(),
        version: ProtocolVersion::new(1, 0, 0),
        genesis_offset: TimeDelta::seconds(60),
        chainspec_template: None,
        config_template: None,
        binaries: BinarySource::Remote {
            base_url: format!("{}/releases", server.uri()),
        },
        package: false,
    };
    let report = provisioner()
        .create_network(&plan, &NetworkTopology::from_counts(1, 1).unwrap())
        .await
        .unwrap();

    let layout = NetworkLayout::new(dir.path().join("net"), "casper");
    let version = ProtocolVersion::new(1, 0, 0);
    assert_eq!(report.nodes.len(), 2);
    assert!(layout.staging_bin_version_dir(&version).join("casper-node").is_file());
    let chainspec: toml::Table = std::fs::read_to_string(
        layout
            .staging_config_version_dir(&version)
            .join("chainspec.toml"),
    )
    .unwrap()
    .parse()
    .unwrap();
    assert_eq!(chainspec["network"]["name"].as_str(), Some("remote-net"));
}

#[tokio::test]
async fn test_remote_release_missing() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let plan = NetworkPlan {
        root: dir.path().join("net"),
        network_name: "net".to_string(),
        version: ProtocolVersion::new(2, 0, 0),
        genesis_offset: TimeDelta::seconds(60),
        chainspec_template: None,
        config_template: None,
        binaries: BinarySource::Remote {
            base_url: server.uri(),
        },
        package: false,
    };
    let err = provisioner()
        .create_network(&plan, &NetworkTopology::from_counts(1, 0).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisioningError::Fetch { ref reason, .. } if reason.contains("404")));
}
