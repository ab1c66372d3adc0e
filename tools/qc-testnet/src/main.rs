//! QC-Testnet: test network provisioning tool
//!
//! Creates multi-node test networks for local and cloud testing.

use anyhow::Result;
use clap::Parser;
use quantum_telemetry::{init_telemetry, TelemetryConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use qc_testnet::cli::{Cli, Command};
use qc_testnet::{commands, resolve_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut telemetry_config = TelemetryConfig::for_tool("qc-testnet").verbose(cli.verbose);
    telemetry_config.json_logs |= cli.json_logs;
    let telemetry = init_telemetry(&telemetry_config)?;

    let config = resolve_config(&cli)?;

    // Ctrl-C cancels in-flight node tasks and uploads
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining work");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Command::CreateNetwork(args) => commands::create_network(&config, args, &cancel).await,
        Command::AddJoiners(args) => commands::add_joiners(&config, args, &cancel).await,
        Command::Package(args) => commands::package_network(&config, args).await,
        Command::Publish(args) => commands::publish_network(&config, args, &cancel).await,
        Command::Fetch(args) => commands::fetch_release(&config, args).await,
    };

    if cli.metrics {
        match telemetry.metrics().encode() {
            Ok(text) => print!("{text}"),
            Err(e) => error!(error = %e, "Failed to encode metrics"),
        }
    }

    result
}
