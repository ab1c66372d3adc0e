//! # Node Config Synthesizer
//!
//! Produces one `config.toml` per node from the shared node template.
//!
//! ## Overrides
//!
//! | Field | Value |
//! |-------|-------|
//! | `network.public_address` | `<address>:<port>` |
//! | `network.bind_address` | `0.0.0.0:<port>` |
//! | `network.known_addresses` | role-dependent peers, `<peer>:<port>` |
//! | `network.gossip_interval` | from settings |
//! | `logging.format` | from settings |
//! | `<consensus>.secret_key_path` | from settings |
//! | `<consensus>.unit_hashes_folder` | storage path |
//! | `storage.path` | `<storage_root>/<address>` |
//! | `node.trusted_hash` | joiners only, when supplied |
//!
//! `<consensus>` is `consensus` or, for templates that nest the engine
//! settings, `consensus.highway`.

use std::sync::Arc;

use tracing::debug;

use super::peers::{all_staked_peers, known_peers};
use crate::config::NetworkSettings;
use crate::domain::{
    NetworkTopology, NodeIdentity, NodeRole, Overlay, ProvisioningError, Result, Template,
};

/// Address written into the example config.
pub const PUBLIC_ADDRESS_PLACEHOLDER: &str = "<PUBLIC_ADDRESS>";

const REQUIRED_SECTIONS: [&str; 4] = ["network", "consensus", "logging", "storage"];

/// Where consensus key material is configured in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusLayout {
    /// `consensus.secret_key_path`
    Flat,
    /// `consensus.highway.secret_key_path`
    Highway,
}

impl ConsensusLayout {
    /// Detect the layout from the template shape.
    pub fn detect(template: &Template) -> Self {
        let nested = template
            .section("consensus")
            .ok()
            .and_then(|consensus| consensus.get("highway"))
            .is_some_and(toml::Value::is_table);
        if nested {
            Self::Highway
        } else {
            Self::Flat
        }
    }

    fn section(self) -> &'static str {
        match self {
            Self::Flat => "consensus",
            Self::Highway => "consensus.highway",
        }
    }
}

/// Synthesized node configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    address: String,
    table: toml::Table,
}

impl NodeConfig {
    /// Host address of the node this config belongs to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Full config document.
    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    /// Render as `config.toml`.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(&self.table).map_err(|e| ProvisioningError::ConfigSynthesis {
            node: self.address.clone(),
            reason: format!("failed to serialize config: {e}"),
        })
    }
}

/// Applies per-node overrides to the shared node template.
///
/// Cheap to clone; the template is shared.
#[derive(Debug, Clone)]
pub struct NodeConfigSynthesizer {
    template: Arc<Template>,
    settings: NetworkSettings,
    layout: ConsensusLayout,
}

impl NodeConfigSynthesizer {
    /// Detects the consensus layout once; every node shares it.
    pub fn new(template: Arc<Template>, settings: NetworkSettings) -> Self {
        let layout = ConsensusLayout::detect(&template);
        Self {
            template,
            settings,
            layout,
        }
    }

    /// Where the template keeps `secret_key_path`.
    pub fn layout(&self) -> ConsensusLayout {
        self.layout
    }

    /// Config for `node` with an explicit known-peer list (addresses without port).
    ///
    /// `trusted_hash` is only accepted for joiners.
    pub fn synthesize(
        &self,
        node: &NodeIdentity,
        peers: &[String],
        trusted_hash: Option<&str>,
    ) -> Result<NodeConfig> {
        let address = node.address();
        let synthesis_error = |reason: String| ProvisioningError::ConfigSynthesis {
            node: address.to_string(),
            reason,
        };

        for section in REQUIRED_SECTIONS {
            self.template
                .section(section)
                .map_err(|_| synthesis_error(format!("template has no [{section}] section")))?;
        }
        if trusted_hash.is_some() && node.role() != NodeRole::Joiner {
            return Err(synthesis_error(format!(
                "trusted hash given for {} node",
                node.role()
            )));
        }

        let port = self.settings.port;
        let storage_path = self.settings.storage_path(address);
        let known_addresses: Vec<toml::Value> = peers
            .iter()
            .map(|peer| toml::Value::String(format!("{peer}:{port}")))
            .collect();

        let mut overlay = self.template.overlay();
        let consensus = self.layout.section();
        let apply = |overlay: &mut Overlay| -> Result<()> {
            overlay.set("network", "public_address", node.socket_address(port))?;
            overlay.set("network", "bind_address", format!("0.0.0.0:{port}"))?;
            overlay.set("network", "known_addresses", known_addresses.clone())?;
            overlay.set("network", "gossip_interval", self.settings.gossip_interval_ms)?;
            overlay.set("logging", "format", self.settings.log_format.as_str())?;
            overlay.set(consensus, "secret_key_path", self.settings.secret_key_path.as_str())?;
            overlay.set(consensus, "unit_hashes_folder", storage_path.as_str())?;
            overlay.set("storage", "path", storage_path.as_str())?;
            if let Some(hash) = trusted_hash {
                overlay.ensure_section("node")?;
                overlay.set("node", "trusted_hash", hash)?;
            }
            Ok(())
        };
        apply(&mut overlay).map_err(|e| synthesis_error(e.to_string()))?;

        debug!(
            node = address,
            role = %node.role(),
            peers = peers.len(),
            "Synthesized node config"
        );

        Ok(NodeConfig {
            address: address.to_string(),
            table: overlay.into_table(),
        })
    }

    /// Config for `node` with its role-dependent peers.
    pub fn synthesize_for(
        &self,
        topology: &NetworkTopology,
        node: &NodeIdentity,
        trusted_hash: Option<&str>,
    ) -> Result<NodeConfig> {
        self.synthesize(node, &known_peers(topology, node), trusted_hash)
    }

    /// Example config for operators: placeholder address and the full
    /// bootstrap + validator peer set.
    pub fn synthesize_example(&self, topology: &NetworkTopology) -> Result<NodeConfig> {
        let placeholder = NodeIdentity::new(PUBLIC_ADDRESS_PLACEHOLDER, NodeRole::Validator);
        self.synthesize(&placeholder, &all_staked_peers(topology), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoleGroups;
    use proptest::prelude::*;

    const FLAT: &str = r#"
[node]
trusted_hash = ""

[logging]
format = "text"
color = false

[consensus]
secret_key_path = "/etc/casper/validator_keys/secret_key.pem"
max_execution_delay = 3

[network]
public_address = "127.0.0.1:0"
bind_address = "0.0.0.0:0"
known_addresses = []
gossip_interval = 30000

[storage]
path = "/var/lib/casper"
"#;

    const NESTED: &str = r#"
[logging]
format = "text"

[consensus]
secret_key_path = "unused"

[consensus.highway]
unit_hashes_folder = "/tmp"

[network]
known_addresses = []

[storage]
path = "/var/lib/casper"
"#;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn topology() -> NetworkTopology {
        NetworkTopology::from_groups(RoleGroups {
            bootstrap: strings(&["node-1"]),
            validators: strings(&["node-2", "node-3"]),
            zero_weight: strings(&["node-4"]),
            joiners: strings(&["node-5"]),
        })
        .unwrap()
    }

    fn synthesizer(text: &str) -> NodeConfigSynthesizer {
        let template = Template::parse("config.toml", text).unwrap();
        NodeConfigSynthesizer::new(Arc::new(template), NetworkSettings::default())
    }

    fn known(config: &NodeConfig) -> Vec<String> {
        config.table()["network"]["known_addresses"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_overrides_applied() {
        let topology = topology();
        let node = topology.find("node-2").unwrap();
        let config = synthesizer(FLAT).synthesize_for(&topology, node, None).unwrap();
        let table = config.table();

        assert_eq!(table["network"]["public_address"].as_str(), Some("node-2:34553"));
        assert_eq!(table["network"]["bind_address"].as_str(), Some("0.0.0.0:34553"));
        assert_eq!(table["network"]["gossip_interval"].as_integer(), Some(120_000));
        assert_eq!(known(&config), strings(&["node-1:34553"]));
        assert_eq!(table["logging"]["format"].as_str(), Some("json"));
        assert_eq!(
            table["consensus"]["secret_key_path"].as_str(),
            Some("../keys/secret_key.pem")
        );
        assert_eq!(
            table["consensus"]["unit_hashes_folder"].as_str(),
            Some("/storage/node-2")
        );
        assert_eq!(table["storage"]["path"].as_str(), Some("/storage/node-2"));
        // Untouched template fields survive.
        assert_eq!(table["logging"]["color"].as_bool(), Some(false));
        assert_eq!(table["consensus"]["max_execution_delay"].as_integer(), Some(3));
    }

    #[test]
    fn test_nested_consensus_layout() {
        let synthesizer = synthesizer(NESTED);
        assert_eq!(synthesizer.layout(), ConsensusLayout::Highway);

        let topology = topology();
        let config = synthesizer
            .synthesize_for(&topology, topology.find("node-3").unwrap(), None)
            .unwrap();
        let highway = &config.table()["consensus"]["highway"];

        assert_eq!(highway["secret_key_path"].as_str(), Some("../keys/secret_key.pem"));
        assert_eq!(highway["unit_hashes_folder"].as_str(), Some("/storage/node-3"));
        assert_eq!(config.table()["consensus"]["secret_key_path"].as_str(), Some("unused"));
    }

    #[test]
    fn test_missing_storage_section() {
        let text = FLAT.replace("[storage]\npath = \"/var/lib/casper\"\n", "");
        let topology = topology();
        let err = synthesizer(&text)
            .synthesize_for(&topology, topology.find("node-1").unwrap(), None)
            .unwrap_err();

        assert!(matches!(
            err,
            ProvisioningError::ConfigSynthesis { ref node, ref reason }
                if node == "node-1" && reason.contains("storage")
        ));
    }

    #[test]
    fn test_joiner_trusted_hash() {
        let topology = topology();
        let joiner = topology.find("node-5").unwrap();
        let config = synthesizer(NESTED)
            .synthesize_for(&topology, joiner, Some("abcd"))
            .unwrap();

        assert_eq!(config.table()["node"]["trusted_hash"].as_str(), Some("abcd"));
        assert_eq!(
            known(&config),
            strings(&["node-2:34553", "node-3:34553", "node-1:34553"])
        );
    }

    #[test]
    fn test_trusted_hash_rejected_for_validator() {
        let topology = topology();
        let err = synthesizer(FLAT)
            .synthesize_for(&topology, topology.find("node-2").unwrap(), Some("abcd"))
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::ConfigSynthesis { .. }));
    }

    #[test]
    fn test_example_config() {
        let topology = topology();
        let config = synthesizer(FLAT).synthesize_example(&topology).unwrap();
        let table = config.table();

        assert_eq!(
            table["network"]["public_address"].as_str(),
            Some("<PUBLIC_ADDRESS>:34553")
        );
        assert_eq!(
            known(&config),
            strings(&["node-1:34553", "node-2:34553", "node-3:34553"])
        );
    }

    #[test]
    fn test_custom_port() {
        let template = Template::parse("config.toml", FLAT).unwrap();
        let settings = NetworkSettings {
            port: 40000,
            ..Default::default()
        };
        let synthesizer = NodeConfigSynthesizer::new(Arc::new(template), settings);
        let topology = topology();
        let config = synthesizer
            .synthesize_for(&topology, topology.find("node-4").unwrap(), None)
            .unwrap();

        assert_eq!(
            known(&config),
            strings(&["node-1:40000", "node-2:40000", "node-3:40000"])
        );
    }

    proptest! {
        #[test]
        fn prop_synthesis_is_idempotent(validators in 1usize..8, zero_weight in 0usize..4, pick in 0usize..64) {
            let topology = NetworkTopology::from_counts(validators, zero_weight).unwrap();
            let node = &topology.nodes()[pick % topology.len()];
            let synthesizer = synthesizer(FLAT);

            let first = synthesizer.synthesize_for(&topology, node, None).unwrap();
            let second = synthesizer.synthesize_for(&topology, node, None).unwrap();
            prop_assert_eq!(first.to_toml_string().unwrap(), second.to_toml_string().unwrap());
        }
    }
}
