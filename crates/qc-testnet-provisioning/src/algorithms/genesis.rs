//! # Genesis Synthesizer
//!
//! Turns a chainspec template into the network's genesis specification.
//! Pure: the only input not in the arguments is the injected [`Clock`].

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use tracing::debug;

use crate::config::ProtocolTuning;
use crate::domain::{ProtocolVersion, ProvisioningError, Result, Template};
use crate::ports::Clock;

/// Chainspec timestamp format, second precision.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Synthesized chainspec.
#[derive(Debug, Clone, PartialEq)]
pub struct GenesisSpec {
    network_name: String,
    timestamp: DateTime<Utc>,
    table: toml::Table,
}

impl GenesisSpec {
    /// Value written into `network.name`.
    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    /// Genesis instant, truncated to whole seconds.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Genesis instant as written into `network.timestamp`.
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Full chainspec document.
    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    /// Render as `chainspec.toml`.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(&self.table).map_err(|e| {
            ProvisioningError::InvalidConfig(format!("failed to serialize chainspec: {e}"))
        })
    }
}

/// Applies network identity, genesis time and tuning constants to a template.
pub struct GenesisSynthesizer<'a> {
    tuning: &'a ProtocolTuning,
    clock: &'a dyn Clock,
}

impl<'a> GenesisSynthesizer<'a> {
    /// Synthesizer reading "now" from `clock`.
    pub fn new(tuning: &'a ProtocolTuning, clock: &'a dyn Clock) -> Self {
        Self { tuning, clock }
    }

    /// Synthesize the chainspec.
    ///
    /// `genesis_offset` is added to the current time; `network`, `core` and
    /// `deploys` must exist in the template. `highway` and `protocol` are
    /// only touched when present.
    pub fn synthesize(
        &self,
        template: &Template,
        network_name: &str,
        genesis_offset: TimeDelta,
        version: &ProtocolVersion,
    ) -> Result<GenesisSpec> {
        for section in ["network", "core", "deploys"] {
            template.section(section)?;
        }

        let timestamp = self
            .clock
            .now()
            .checked_add_signed(genesis_offset)
            .ok_or_else(|| {
                ProvisioningError::InvalidConfig(format!(
                    "genesis offset of {}s is out of range",
                    genesis_offset.num_seconds()
                ))
            })?
            .trunc_subsecs(0);
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let tuning = self.tuning;

        let mut overlay = template.overlay();
        overlay.set("network", "name", network_name)?;
        overlay.set("network", "timestamp", stamp.as_str())?;

        overlay.set("core", "unbonding_delay", tuning.unbonding_delay)?;
        overlay.set("core", "auction_delay", tuning.auction_delay)?;
        overlay.set("core", "era_duration", tuning.era_duration.as_str())?;

        overlay.set(
            "deploys",
            "block_max_transfer_count",
            tuning.block_max_transfer_count,
        )?;

        overlay.set_if_present(
            "highway",
            "minimum_round_exponent",
            tuning.minimum_round_exponent,
        );
        overlay.set_if_present(
            "highway",
            "maximum_round_exponent",
            tuning.maximum_round_exponent,
        );

        if overlay.set_if_present("protocol", "version", version.to_string()) {
            overlay.set("protocol", "activation_point", stamp.as_str())?;
        }

        debug!(network = network_name, timestamp = %stamp, "Synthesized chainspec");

        Ok(GenesisSpec {
            network_name: network_name.to_string(),
            timestamp,
            table: overlay.into_table(),
        })
    }
}
