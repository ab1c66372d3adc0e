//! # Provisioning Orchestrator
//!
//! Drives the pipeline for a whole network:
//!
//! ```text
//! create_network:
//!   dirs ─→ binaries ─→ templates ─→ chainspec
//!        ─→ [per node: keygen + config.toml]  (bounded pool)
//!        ─→ faucet key ─→ accounts.toml ─→ config-example.toml
//!        ─→ [per node: var/lib, staged config, faucet key]  (bounded pool)
//!        ─→ package
//!
//! add_joiners:
//!   binaries ─→ template ─→ [per joiner: keygen + config.toml + populate]
//! ```
//!
//! Topology and peer lists are fully resolved before any task starts; each
//! task writes only under its own `nodes/<address>` directory. The first
//! failing task cancels the others. Nothing is cleaned up on failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use quantum_telemetry::{KEYS_GENERATED, NETWORK_DURATION, NODES_PROVISIONED, PROVISIONING_ERRORS};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::artifacts;
use super::tasks::run_bounded;
use crate::adapters::{fs, load_template, unpack, ReleaseFetcher};
use crate::algorithms::{known_peers, GenesisSynthesizer, LedgerBuilder, NodeConfigSynthesizer};
use crate::config::{LayoutSettings, ProvisioningConfig};
use crate::domain::{
    AccountLedger, ArtifactBundle, NetworkLayout, NetworkTopology, NodeIdentity, NodeRole,
    ProtocolVersion, ProvisioningError, PublicKey, Result, ACCOUNTS_FILE,
    CHAINSPEC_FILE, CONFIG_FILE, EXAMPLE_CONFIG_FILE, SECRET_KEY_FILE,
};
use crate::ports::{Clock, KeyGenerator};

/// Where node, launcher and client executables come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinarySource {
    /// Local build outputs.
    Local {
        node: PathBuf,
        launcher: PathBuf,
        /// Client binary, staged alongside the launcher when given.
        client: Option<PathBuf>,
    },
    /// Release archives under `<base_url>/<version>/`.
    Remote { base_url: String },
}

/// Inputs of `create_network`.
#[derive(Debug, Clone)]
pub struct NetworkPlan {
    /// Network directory; must not exist.
    pub root: PathBuf,
    pub network_name: String,
    pub version: ProtocolVersion,
    /// Genesis happens this long after synthesis.
    pub genesis_offset: TimeDelta,
    /// Required for local binaries; remote releases fall back to their config archive.
    pub chainspec_template: Option<PathBuf>,
    pub config_template: Option<PathBuf>,
    pub binaries: BinarySource,
    /// Write `target/` archives at the end.
    pub package: bool,
}

/// Inputs of `add_joiners`.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    /// Existing network directory created by `create_network`.
    pub root: PathBuf,
    pub version: ProtocolVersion,
    pub trusted_hash: Option<String>,
    /// Defaults to the staged `config-example.toml`.
    pub config_template: Option<PathBuf>,
    pub binaries: BinarySource,
}

/// One node written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedNode {
    pub identity: NodeIdentity,
    pub public_key: PublicKey,
    pub config_path: PathBuf,
}

/// Outcome of `create_network`.
#[derive(Debug, Clone)]
pub struct NetworkReport {
    pub root: PathBuf,
    pub network_name: String,
    pub version: ProtocolVersion,
    /// Genesis time as written into the chainspec.
    pub genesis_timestamp: String,
    /// Genesis nodes in topology order.
    pub nodes: Vec<ProvisionedNode>,
    pub faucet_key: PublicKey,
    pub ledger: AccountLedger,
    pub bundle: Option<ArtifactBundle>,
}

/// Outcome of `add_joiners`.
#[derive(Debug, Clone)]
pub struct JoinReport {
    pub root: PathBuf,
    pub nodes: Vec<ProvisionedNode>,
}

/// Template paths recovered from a fetched release.
#[derive(Debug, Default)]
struct ReleaseTemplates {
    chainspec: Option<PathBuf>,
    config: Option<PathBuf>,
}

/// Per-node work, resolved before any task runs.
struct NodeJob {
    identity: NodeIdentity,
    peers: Vec<String>,
    keys_dir: PathBuf,
    config_dir: PathBuf,
}

/// Test network provisioner.
pub struct Provisioner {
    config: ProvisioningConfig,
    keygen: Arc<dyn KeyGenerator>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl Provisioner {
    /// Provisioner with its own cancellation token.
    ///
    /// Keys come from `keygen`; genesis time is read from `clock`.
    pub fn new(
        config: ProvisioningConfig,
        keygen: Arc<dyn KeyGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            keygen,
            clock,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token (e.g. tied to Ctrl-C).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &ProvisioningConfig {
        &self.config
    }

    /// Token that aborts in-flight operations when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn layout(&self, root: &Path) -> NetworkLayout {
        NetworkLayout::new(root, self.config.layout.project_dir.clone())
    }

    /// Provision a fresh network from `topology`.
    pub async fn create_network(
        &self,
        plan: &NetworkPlan,
        topology: &NetworkTopology,
    ) -> Result<NetworkReport> {
        let _timer = quantum_telemetry::time_histogram!(NETWORK_DURATION);
        self.create_network_inner(plan, topology)
            .await
            .inspect_err(|e| record_failure("create_network", e))
    }

    async fn create_network_inner(
        &self,
        plan: &NetworkPlan,
        topology: &NetworkTopology,
    ) -> Result<NetworkReport> {
        self.config.validate()?;
        topology.require(NodeRole::Bootstrap)?;
        if let BinarySource::Local { .. } = plan.binaries {
            if plan.chainspec_template.is_none() || plan.config_template.is_none() {
                return Err(ProvisioningError::InvalidConfig(
                    "local binaries need both a chainspec and a config template".to_string(),
                ));
            }
        }

        let layout = self.layout(&plan.root);
        let version = plan.version;
        info!(
            root = %plan.root.display(),
            network = %plan.network_name,
            version = %version,
            nodes = topology.len(),
            "Creating network"
        );

        fs::create_fresh_dir(layout.root()).await?;
        fs::create_dir(&layout.nodes_dir()).await?;
        fs::create_dir(&layout.staging_bin_version_dir(&version)).await?;
        fs::create_dir(&layout.staging_config_version_dir(&version)).await?;

        let fetched = self.stage_binaries(&layout, &plan.binaries, &version, true).await?;

        let chainspec_path = resolve_template(&plan.chainspec_template, &fetched.chainspec, "chainspec")?;
        let config_path = resolve_template(&plan.config_template, &fetched.config, "node config")?;
        let chainspec_template = load_template(&chainspec_path).await?;
        let config_template = Arc::new(load_template(&config_path).await?);

        // Chainspec
        let genesis = GenesisSynthesizer::new(&self.config.tuning, self.clock.as_ref()).synthesize(
            &chainspec_template,
            &plan.network_name,
            plan.genesis_offset,
            &version,
        )?;
        let staged_config = layout.staging_config_version_dir(&version);
        fs::write_file(&staged_config.join(CHAINSPEC_FILE), genesis.to_toml_string()?).await?;
        info!(timestamp = %genesis.timestamp_string(), "Wrote chainspec");

        // Per-node keys and configs
        let synthesizer = Arc::new(NodeConfigSynthesizer::new(
            config_template,
            self.config.network.clone(),
        ));
        let jobs = self.node_jobs(&layout, topology, topology.genesis_nodes(), &version);
        let nodes = self.run_node_jobs(jobs, synthesizer.clone(), None).await?;

        // Faucet and ledger
        let faucet_key = self.keygen.generate(&layout.staging_faucet_dir()).await?;
        KEYS_GENERATED.inc();

        let ledger = build_ledger(&self.config, topology, &nodes, faucet_key.clone())?;
        fs::write_file(&staged_config.join(ACCOUNTS_FILE), ledger.to_toml_string()?).await?;

        let example = synthesizer.synthesize_example(topology)?;
        fs::write_file(&staged_config.join(EXAMPLE_CONFIG_FILE), example.to_toml_string()?).await?;
        info!(accounts = ledger.len(), "Wrote genesis accounts");

        self.populate_nodes(&layout, &nodes, &version).await?;

        let bundle = if plan.package {
            Some(
                artifacts::package(&layout, &self.config.layout, &plan.network_name, version)
                    .await?,
            )
        } else {
            None
        };

        info!(network = %plan.network_name, nodes = nodes.len(), "Network created");
        Ok(NetworkReport {
            root: plan.root.clone(),
            network_name: plan.network_name.clone(),
            version,
            genesis_timestamp: genesis.timestamp_string(),
            nodes,
            faucet_key,
            ledger,
            bundle,
        })
    }

    /// Provision the joiners of `topology` into an existing network.
    pub async fn add_joiners(
        &self,
        plan: &JoinPlan,
        topology: &NetworkTopology,
    ) -> Result<JoinReport> {
        let _timer = quantum_telemetry::time_histogram!(NETWORK_DURATION);
        self.add_joiners_inner(plan, topology)
            .await
            .inspect_err(|e| record_failure("add_joiners", e))
    }

    async fn add_joiners_inner(
        &self,
        plan: &JoinPlan,
        topology: &NetworkTopology,
    ) -> Result<JoinReport> {
        self.config.validate()?;
        topology.require(NodeRole::Joiner)?;

        let layout = self.layout(&plan.root);
        let version = plan.version;
        let staged_config = layout.staging_config_version_dir(&version);
        let faucet_secret = layout.staging_faucet_dir().join(SECRET_KEY_FILE);
        for required in [&staged_config, &faucet_secret] {
            if !required.exists() {
                return Err(ProvisioningError::InvalidConfig(format!(
                    "{} not found; create the network first",
                    required.display()
                )));
            }
        }

        info!(
            root = %plan.root.display(),
            joiners = topology.count(NodeRole::Joiner),
            trusted_hash = plan.trusted_hash.is_some(),
            "Adding joiners"
        );

        self.stage_binaries(&layout, &plan.binaries, &version, false).await?;

        let template_path = plan
            .config_template
            .clone()
            .unwrap_or_else(|| staged_config.join(EXAMPLE_CONFIG_FILE));
        let template = Arc::new(load_template(&template_path).await?);
        let synthesizer = Arc::new(NodeConfigSynthesizer::new(
            template,
            self.config.network.clone(),
        ));

        let jobs = self.node_jobs(&layout, topology, topology.by_role(NodeRole::Joiner), &version);
        let nodes = self
            .run_node_jobs(jobs, synthesizer, plan.trusted_hash.clone())
            .await?;
        self.populate_nodes(&layout, &nodes, &version).await?;

        info!(joiners = nodes.len(), "Joiners added");
        Ok(JoinReport {
            root: plan.root.clone(),
            nodes,
        })
    }

    fn node_jobs<'a>(
        &self,
        layout: &NetworkLayout,
        topology: &NetworkTopology,
        nodes: impl Iterator<Item = &'a NodeIdentity>,
        version: &ProtocolVersion,
    ) -> Vec<NodeJob> {
        nodes
            .map(|node| NodeJob {
                identity: node.clone(),
                peers: known_peers(topology, node),
                keys_dir: layout.node_keys_dir(node.address()),
                config_dir: layout.node_config_dir(node.address(), version),
            })
            .collect()
    }

    /// Key generation and config synthesis, one task per node.
    async fn run_node_jobs(
        &self,
        jobs: Vec<NodeJob>,
        synthesizer: Arc<NodeConfigSynthesizer>,
        trusted_hash: Option<String>,
    ) -> Result<Vec<ProvisionedNode>> {
        let keygen = Arc::clone(&self.keygen);
        let trusted_hash: Option<Arc<str>> = trusted_hash.map(Arc::from);

        run_bounded(
            jobs,
            self.config.concurrency.max_parallel_nodes,
            &self.cancel,
            move |job| {
                let keygen = Arc::clone(&keygen);
                let synthesizer = Arc::clone(&synthesizer);
                let trusted_hash = trusted_hash.clone();
                async move {
                    let NodeJob {
                        identity,
                        peers,
                        keys_dir,
                        config_dir,
                    } = job;
                    let address = identity.address().to_string();
                    let role = identity.role();

                    let result = async {
                        let public_key = keygen.generate(&keys_dir).await?;
                        KEYS_GENERATED.inc();

                        let config =
                            synthesizer.synthesize(&identity, &peers, trusted_hash.as_deref())?;
                        let config_path = config_dir.join(CONFIG_FILE);
                        fs::write_file(&config_path, config.to_toml_string()?).await?;

                        debug!(node = %address, role = %role, key = %public_key, "Node keys and config written");
                        Ok::<_, ProvisioningError>(ProvisionedNode {
                            identity,
                            public_key,
                            config_path,
                        })
                    }
                    .await;

                    result.map_err(|e| e.for_node(&address, role))
                }
            },
        )
        .await
    }

    /// Runtime directory, staged config files and faucet key for each node.
    async fn populate_nodes(
        &self,
        layout: &NetworkLayout,
        nodes: &[ProvisionedNode],
        version: &ProtocolVersion,
    ) -> Result<()> {
        let layout = layout.clone();
        let version = *version;
        let identities: Vec<NodeIdentity> = nodes.iter().map(|n| n.identity.clone()).collect();

        run_bounded(
            identities,
            self.config.concurrency.max_parallel_nodes,
            &self.cancel,
            move |identity| {
                let layout = layout.clone();
                async move {
                    let address = identity.address();
                    let result = async {
                        fs::create_dir(&layout.node_var_lib(address)).await?;
                        fs::copy_dir_files(
                            &layout.staging_config_version_dir(&version),
                            &layout.node_config_dir(address, &version),
                        )
                        .await?;
                        fs::copy_file(
                            &layout.staging_faucet_dir().join(SECRET_KEY_FILE),
                            &layout.node_faucet_keys_dir(address).join(SECRET_KEY_FILE),
                        )
                        .await
                    }
                    .await;

                    result.map_err(|e| e.for_node(address, identity.role()))?;
                    NODES_PROVISIONED
                        .with_label_values(&[identity.role().group_name()])
                        .inc();
                    debug!(node = address, "Node populated");
                    Ok(())
                }
            },
        )
        .await
        .map(|_| ())
    }

    /// Put executables under `staging/bin`, fetching a release first if needed.
    ///
    /// Returns template paths found in a fetched config archive.
    async fn stage_binaries(
        &self,
        layout: &NetworkLayout,
        source: &BinarySource,
        version: &ProtocolVersion,
        with_client: bool,
    ) -> Result<ReleaseTemplates> {
        let names = &self.config.layout;
        let node_target = layout.staging_bin_version_dir(version).join(&names.node_binary);
        let launcher_target = layout.staging_bin_dir().join(&names.launcher_binary);
        let client_target = layout.staging_bin_dir().join(&names.client_binary);

        match source {
            BinarySource::Local {
                node,
                launcher,
                client,
            } => {
                fs::copy_executable(node, &node_target).await?;
                fs::copy_executable(launcher, &launcher_target).await?;
                if let (true, Some(client)) = (with_client, client) {
                    fs::copy_executable(client, &client_target).await?;
                }
                info!(source = "local", "Staged binaries");
                Ok(ReleaseTemplates::default())
            }
            BinarySource::Remote { base_url } => {
                let release_dir = layout.release_dir(version);
                let fetcher = ReleaseFetcher::new(
                    base_url.clone(),
                    Duration::from_secs(self.config.fetch.timeout_secs),
                )?;
                let release = fetcher.fetch(version, &release_dir).await?;
                unpack(&release.bin_archive, &release_dir).await?;
                unpack(&release.config_archive, &release_dir).await?;

                let extracted = ExtractedRelease::new(&release_dir, names, version);
                fs::copy_executable(&extracted.node, &node_target).await?;
                fs::copy_executable(&extracted.launcher, &launcher_target).await?;
                if with_client && extracted.client.is_file() {
                    fs::copy_executable(&extracted.client, &client_target).await?;
                }
                info!(source = %base_url, "Staged binaries from release");

                Ok(ReleaseTemplates {
                    chainspec: Some(extracted.chainspec).filter(|p| p.is_file()),
                    config: Some(extracted.example_config).filter(|p| p.is_file()),
                })
            }
        }
    }
}

/// Paths inside an unpacked release (archives hold `bin/...` and `config/...`).
struct ExtractedRelease {
    node: PathBuf,
    launcher: PathBuf,
    client: PathBuf,
    chainspec: PathBuf,
    example_config: PathBuf,
}

impl ExtractedRelease {
    fn new(root: &Path, names: &LayoutSettings, version: &ProtocolVersion) -> Self {
        let bin = root.join("bin");
        let config = root.join("config").join(version.dir_name());
        Self {
            node: bin.join(version.dir_name()).join(&names.node_binary),
            launcher: bin.join(&names.launcher_binary),
            client: bin.join(&names.client_binary),
            chainspec: config.join(CHAINSPEC_FILE),
            example_config: config.join(EXAMPLE_CONFIG_FILE),
        }
    }
}

fn resolve_template(
    explicit: &Option<PathBuf>,
    fallback: &Option<PathBuf>,
    what: &str,
) -> Result<PathBuf> {
    explicit
        .clone()
        .or_else(|| fallback.clone())
        .ok_or_else(|| ProvisioningError::InvalidConfig(format!("no {what} template available")))
}

/// Faucet, staked nodes in staking order, zero-weight operators.
fn build_ledger(
    config: &ProvisioningConfig,
    topology: &NetworkTopology,
    nodes: &[ProvisionedNode],
    faucet_key: PublicKey,
) -> Result<AccountLedger> {
    let keys: HashMap<&str, &PublicKey> = nodes
        .iter()
        .map(|n| (n.identity.address(), &n.public_key))
        .collect();
    let key_of = |node: &NodeIdentity| -> Result<PublicKey> {
        keys.get(node.address())
            .map(|key| (*key).clone())
            .ok_or_else(|| {
                ProvisioningError::InvalidTopology(format!(
                    "no key generated for {}",
                    node.address()
                ))
            })
    };

    let staked = topology
        .staking_order()
        .into_iter()
        .map(key_of)
        .collect::<Result<Vec<_>>>()?;
    let zero_weight = topology
        .by_role(NodeRole::ZeroWeight)
        .map(key_of)
        .collect::<Result<Vec<_>>>()?;

    Ok(LedgerBuilder::new(&config.ledger).build(faucet_key, staked, zero_weight))
}

fn record_failure(stage: &str, error: &ProvisioningError) {
    if matches!(error, ProvisioningError::Cancelled) {
        warn!(stage, "Provisioning cancelled");
    }
    PROVISIONING_ERRORS
        .with_label_values(&[stage, error.kind()])
        .inc();
}
