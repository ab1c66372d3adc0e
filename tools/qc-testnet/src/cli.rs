//! Command-line arguments.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use qc_testnet_provisioning::BinarySource;

const DEFAULT_TARGET: &str = "artifacts/chain-1";

/// QC-Testnet: test network provisioning tool
#[derive(Parser, Debug)]
#[command(name = "qc-testnet", version)]
#[command(about = "Create multi-node test networks with generated keys, configs and genesis accounts")]
pub struct Cli {
    /// Provisioning config file (TOML); defaults apply when absent
    #[arg(long, global = true, env = "QC_TESTNET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// JSON log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print Prometheus metrics to stdout when done
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Override the per-node task limit
    #[arg(long, global = true)]
    pub max_parallel: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new network directory with every genesis node
    CreateNetwork(CreateNetworkArgs),
    /// Add joiner nodes to an existing network directory
    AddJoiners(AddJoinersArgs),
    /// Archive the staged binaries and configs under target/
    Package(PackageArgs),
    /// Upload target/ to an object store
    Publish(PublishArgs),
    /// Download and unpack a release
    Fetch(FetchArgs),
}

/// Where the node topology comes from.
#[derive(Args, Debug, Clone)]
pub struct TopologyArgs {
    /// Ansible-style hosts file with bootstrap/validators/zero_weight/joiners groups
    #[arg(short = 'k', long, conflicts_with = "validators")]
    pub hosts_file: Option<PathBuf>,

    /// Generate a topology with this many validators (the first one bootstraps)
    #[arg(long)]
    pub validators: Option<usize>,

    /// Zero-weight operators added to a generated topology
    #[arg(long, default_value_t = 0, requires = "validators")]
    pub zero_weight: usize,
}

/// Where node executables come from.
#[derive(Args, Debug, Clone)]
pub struct BinaryArgs {
    /// casper-node executable
    #[arg(long, default_value = "../casper-node/target/release/casper-node")]
    pub node_bin: PathBuf,

    /// casper-node-launcher executable
    #[arg(long, default_value = "../casper-node-launcher/target/release/casper-node-launcher")]
    pub launcher_bin: PathBuf,

    /// Fetch binaries (and fallback templates) from `<url>/<version>/` instead
    #[arg(long)]
    pub release_url: Option<String>,
}

/// External key generator.
#[derive(Args, Debug, Clone)]
pub struct KeygenArgs {
    /// Client binary used for `keygen` (also staged for new networks)
    #[arg(long, default_value = "../casper-node/target/release/casper-client")]
    pub casper_client: PathBuf,

    /// Extra arguments placed before `keygen`, e.g. `--client-arg run --client-arg --`
    #[arg(long = "client-arg", allow_hyphen_values = true)]
    pub client_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CreateNetworkArgs {
    /// Network directory to create
    #[arg(default_value = DEFAULT_TARGET)]
    pub target_path: PathBuf,

    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Network name; defaults to the target directory name
    #[arg(short = 'n', long)]
    pub network_name: Option<String>,

    /// Seconds from now until genesis
    #[arg(short = 'g', long, default_value_t = 300)]
    pub genesis_in: i64,

    /// Protocol version, e.g. 1_0_0
    #[arg(short = 'v', long, default_value = "1_0_0")]
    pub node_version: String,

    /// Chainspec template
    #[arg(short = 'C', long)]
    pub chainspec_template: Option<PathBuf>,

    /// Node config template
    #[arg(short = 'c', long)]
    pub config_template: Option<PathBuf>,

    #[command(flatten)]
    pub binaries: BinaryArgs,

    #[command(flatten)]
    pub keygen: KeygenArgs,

    /// Skip writing target/ archives
    #[arg(long)]
    pub no_package: bool,
}

#[derive(Args, Debug)]
pub struct AddJoinersArgs {
    /// Existing network directory
    #[arg(default_value = DEFAULT_TARGET)]
    pub target_path: PathBuf,

    /// Hosts file listing the joiners group
    #[arg(short = 'k', long)]
    pub hosts_file: PathBuf,

    /// Protocol version, e.g. 1_0_0
    #[arg(short = 'v', long, default_value = "1_0_0")]
    pub node_version: String,

    /// Trusted block hash the joiners sync from
    #[arg(short = 'j', long)]
    pub trusted_hash: Option<String>,

    /// Node config template; defaults to the staged config-example.toml
    #[arg(short = 'c', long)]
    pub config_template: Option<PathBuf>,

    #[command(flatten)]
    pub binaries: BinaryArgs,

    #[command(flatten)]
    pub keygen: KeygenArgs,
}

#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Network directory
    #[arg(default_value = DEFAULT_TARGET)]
    pub target_path: PathBuf,

    /// Network name; defaults to the target directory name
    #[arg(short = 'n', long)]
    pub network_name: Option<String>,

    /// Protocol version, e.g. 1_0_0
    #[arg(short = 'v', long, default_value = "1_0_0")]
    pub node_version: String,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Network directory
    #[arg(default_value = DEFAULT_TARGET)]
    pub target_path: PathBuf,

    /// Network name; defaults to the target directory name
    #[arg(short = 'n', long)]
    pub network_name: Option<String>,

    /// Object store endpoint, e.g. https://store.example.com
    #[arg(long, required_unless_present = "to_dir")]
    pub endpoint: Option<String>,

    /// Bucket under the endpoint
    #[arg(long, default_value = "testnets")]
    pub bucket: String,

    /// Bearer token for uploads
    #[arg(long, env = "QC_PUBLISH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Mirror into a local directory instead of uploading
    #[arg(long, conflicts_with = "endpoint")]
    pub to_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Release base URL; archives are read from `<url>/<version>/`
    #[arg(long)]
    pub release_url: String,

    /// Protocol version, e.g. 1_0_0
    #[arg(short = 'v', long, default_value = "1_0_0")]
    pub node_version: String,

    /// Directory to download and unpack into
    #[arg(default_value = "release")]
    pub dest: PathBuf,

    /// Keep the archives packed
    #[arg(long)]
    pub no_unpack: bool,
}

impl BinaryArgs {
    /// Binary source, with the client staged alongside when it exists.
    pub fn source(&self, client: Option<&Path>) -> BinarySource {
        match &self.release_url {
            Some(base_url) => BinarySource::Remote {
                base_url: base_url.clone(),
            },
            None => BinarySource::Local {
                node: self.node_bin.clone(),
                launcher: self.launcher_bin.clone(),
                client: client.filter(|p| p.is_file()).map(Path::to_path_buf),
            },
        }
    }
}

/// Network name derived from the last component of the target path.
pub fn default_network_name(target_path: &Path) -> Option<String> {
    target_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}
