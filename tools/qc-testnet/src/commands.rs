//! Subcommand handlers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::TimeDelta;
use qc_testnet_provisioning::adapters::{
    ClientKeyGenerator, FsObjectStore, HttpObjectStore, ReleaseFetcher, SystemClock,
};
use qc_testnet_provisioning::ports::ObjectStore;
use qc_testnet_provisioning::{
    adapters, package, publish, Inventory, JoinPlan, NetworkLayout, NetworkPlan, NetworkTopology,
    ProtocolVersion, ProvisioningConfig, Provisioner,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{
    default_network_name, AddJoinersArgs, CreateNetworkArgs, FetchArgs, KeygenArgs, PackageArgs,
    PublishArgs, TopologyArgs,
};

fn parse_version(raw: &str) -> Result<ProtocolVersion> {
    raw.parse::<ProtocolVersion>()
        .with_context(|| format!("invalid node version '{raw}'"))
}

fn network_name(explicit: Option<&str>, target_path: &Path) -> Result<String> {
    explicit
        .map(str::to_string)
        .or_else(|| default_network_name(target_path))
        .ok_or_else(|| anyhow!("cannot derive a network name from {}", target_path.display()))
}

fn genesis_offset(seconds: i64) -> Result<TimeDelta> {
    TimeDelta::try_seconds(seconds).ok_or_else(|| anyhow!("--genesis-in {seconds} is out of range"))
}

fn load_topology(args: &TopologyArgs) -> Result<NetworkTopology> {
    match (&args.hosts_file, args.validators) {
        (Some(path), _) => {
            let inventory = Inventory::load(path)
                .with_context(|| format!("failed to read hosts file {}", path.display()))?;
            Ok(NetworkTopology::from_inventory(&inventory)?)
        }
        (None, Some(validators)) => Ok(NetworkTopology::from_counts(validators, args.zero_weight)?),
        (None, None) => bail!("either --hosts-file or --validators is required"),
    }
}

fn provisioner(
    config: &ProvisioningConfig,
    keygen: &KeygenArgs,
    cancel: &CancellationToken,
) -> Provisioner {
    let generator = ClientKeyGenerator::new(&keygen.casper_client)
        .with_prefix_args(keygen.client_args.clone());
    Provisioner::new(config.clone(), Arc::new(generator), Arc::new(SystemClock))
        .with_cancellation(cancel.clone())
}

pub async fn create_network(
    config: &ProvisioningConfig,
    args: CreateNetworkArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let topology = load_topology(&args.topology)?;
    let plan = NetworkPlan {
        network_name: network_name(args.network_name.as_deref(), &args.target_path)?,
        version: parse_version(&args.node_version)?,
        genesis_offset: genesis_offset(args.genesis_in)?,
        chainspec_template: args.chainspec_template,
        config_template: args.config_template,
        binaries: args.binaries.source(Some(&args.keygen.casper_client)),
        package: !args.no_package,
        root: args.target_path,
    };

    let report = provisioner(config, &args.keygen, cancel)
        .create_network(&plan, &topology)
        .await
        .with_context(|| format!("failed to create network at {}", plan.root.display()))?;

    info!(
        network = %report.network_name,
        genesis = %report.genesis_timestamp,
        nodes = report.nodes.len(),
        accounts = report.ledger.len(),
        faucet = %report.faucet_key,
        "Network ready"
    );
    if let Some(bundle) = &report.bundle {
        info!(
            bin = %bundle.bin_archive.display(),
            config = %bundle.config_archive.display(),
            "Artifacts packaged"
        );
    }
    Ok(())
}

pub async fn add_joiners(
    config: &ProvisioningConfig,
    args: AddJoinersArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let inventory = Inventory::load(&args.hosts_file)
        .with_context(|| format!("failed to read hosts file {}", args.hosts_file.display()))?;
    let topology = NetworkTopology::from_inventory(&inventory)?;
    let plan = JoinPlan {
        version: parse_version(&args.node_version)?,
        trusted_hash: args.trusted_hash,
        config_template: args.config_template,
        binaries: args.binaries.source(None),
        root: args.target_path,
    };

    let report = provisioner(config, &args.keygen, cancel)
        .add_joiners(&plan, &topology)
        .await
        .with_context(|| format!("failed to add joiners to {}", plan.root.display()))?;

    for node in &report.nodes {
        info!(node = node.identity.address(), key = %node.public_key, "Joiner ready");
    }
    Ok(())
}

pub async fn package_network(config: &ProvisioningConfig, args: PackageArgs) -> Result<()> {
    let name = network_name(args.network_name.as_deref(), &args.target_path)?;
    let version = parse_version(&args.node_version)?;
    let layout = NetworkLayout::new(&args.target_path, config.layout.project_dir.clone());

    let bundle = package(&layout, &config.layout, &name, version)
        .await
        .with_context(|| format!("failed to package {}", args.target_path.display()))?;

    info!(
        bin_sha256 = %bundle.bin_sha256,
        config_sha256 = %bundle.config_sha256,
        "Packaged {}",
        layout.target_version_dir(&version).display()
    );
    Ok(())
}

pub async fn publish_network(
    config: &ProvisioningConfig,
    args: PublishArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    let name = network_name(args.network_name.as_deref(), &args.target_path)?;
    let layout = NetworkLayout::new(&args.target_path, config.layout.project_dir.clone());

    let store: Arc<dyn ObjectStore> = match (&args.to_dir, &args.endpoint) {
        (Some(dir), _) => Arc::new(FsObjectStore::new(dir)),
        (None, Some(endpoint)) => {
            let store = HttpObjectStore::new(
                endpoint.clone(),
                args.bucket.clone(),
                Duration::from_secs(args.timeout_secs),
            )?;
            match &args.token {
                Some(token) => Arc::new(store.with_bearer_token(token.clone())),
                None => Arc::new(store),
            }
        }
        (None, None) => bail!("either --endpoint or --to-dir is required"),
    };

    let report = publish(
        &layout.target_dir(),
        store,
        &name,
        config.concurrency.max_parallel_uploads,
        cancel,
    )
    .await
    .context("publish aborted")?;

    info!(objects = report.keys.len(), bytes = report.bytes, "Publish complete");
    Ok(())
}

pub async fn fetch_release(config: &ProvisioningConfig, args: FetchArgs) -> Result<()> {
    let version = parse_version(&args.node_version)?;
    let fetcher = ReleaseFetcher::new(
        args.release_url.clone(),
        Duration::from_secs(config.fetch.timeout_secs),
    )?;

    let release = fetcher
        .fetch(&version, &args.dest)
        .await
        .with_context(|| format!("failed to fetch release {version}"))?;

    if !args.no_unpack {
        for archive in [&release.bin_archive, &release.config_archive] {
            adapters::unpack(archive, &args.dest)
                .await
                .with_context(|| format!("failed to unpack {}", archive.display()))?;
        }
    }
    info!(dest = %args.dest.display(), version = %version, "Release ready");
    Ok(())
}
