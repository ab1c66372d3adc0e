//! # Domain Errors
//!
//! Error taxonomy for the provisioning pipeline. Every variant is fatal for
//! the run: nothing is retried and nothing is cleaned up.

use std::path::PathBuf;

use thiserror::Error;

use super::entities::NodeRole;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, ProvisioningError>;

/// Provisioning error types.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Inventory or counts cannot form a valid network.
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    /// Template path does not resolve to a readable document.
    #[error("Template not found: {path}")]
    TemplateNotFound {
        /// Path that was requested
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Template is not well-formed TOML.
    #[error("Failed to parse template {path}: {reason}")]
    TemplateParse {
        /// Template path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// A field or section the synthesizer dereferences is absent.
    #[error("Template field missing: {field}")]
    TemplateFieldMissing {
        /// Dotted path of the missing field
        field: String,
    },

    /// Node config template lacks a section needed for an override.
    #[error("Config synthesis failed for {node}: {reason}")]
    ConfigSynthesis {
        /// Node address
        node: String,
        /// What was missing or inconsistent
        reason: String,
    },

    /// External key generator exited unsuccessfully or wrote an unusable key.
    #[error("Key generation failed in {dir}: {reason}")]
    KeyGenerationFailed {
        /// Output directory handed to the generator
        dir: PathBuf,
        /// Exit status / stderr summary
        reason: String,
    },

    /// An expected staged file is absent or an archive could not be written.
    #[error("Packaging failed at {path}: {reason}")]
    Packaging {
        /// Offending path
        path: PathBuf,
        /// Failure description
        reason: String,
    },

    /// A single object upload failed; the whole publish is aborted.
    #[error("Publish failed for {key}: {reason}")]
    Publish {
        /// Remote object key
        key: String,
        /// Failure description
        reason: String,
    },

    /// Release download returned non-2xx or timed out.
    #[error("Fetch failed for {url}: {reason}")]
    Fetch {
        /// Requested URL
        url: String,
        /// Failure description
        reason: String,
    },

    /// Target directory already exists.
    #[error("Target already exists: {0}")]
    TargetExists(PathBuf),

    /// Invalid provisioning configuration or arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A per-node task failed.
    #[error("Node {node} ({role}) failed: {source}")]
    Node {
        /// Node address
        node: String,
        /// Node role
        role: NodeRole,
        /// Causing error
        #[source]
        source: Box<ProvisioningError>,
    },

    /// A spawned task panicked or was aborted by the runtime.
    #[error("Task failed: {0}")]
    Task(String),

    /// Work was cancelled before completion.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ProvisioningError {
    /// Build an `Io` error mapper bound to `path`, for use with `map_err`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// Attach node context to an error.
    pub fn for_node(self, node: &str, role: NodeRole) -> Self {
        Self::Node {
            node: node.to_string(),
            role,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping node context wrappers.
    pub fn root_cause(&self) -> &ProvisioningError {
        match self {
            Self::Node { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Short label of the root cause, for metrics.
    pub fn kind(&self) -> &'static str {
        match self.root_cause() {
            Self::InvalidTopology(_) => "invalid_topology",
            Self::TemplateNotFound { .. } => "template_not_found",
            Self::TemplateParse { .. } => "template_parse",
            Self::TemplateFieldMissing { .. } => "template_field_missing",
            Self::ConfigSynthesis { .. } => "config_synthesis",
            Self::KeyGenerationFailed { .. } => "key_generation",
            Self::Packaging { .. } => "packaging",
            Self::Publish { .. } => "publish",
            Self::Fetch { .. } => "fetch",
            Self::TargetExists(_) => "target_exists",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Io { .. } => "io",
            Self::Task(_) => "task",
            Self::Cancelled => "cancelled",
            Self::Node { .. } => "node",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_topology_message() {
        let err = ProvisioningError::InvalidTopology("duplicate address node-1".to_string());
        assert!(err.to_string().contains("node-1"));
    }

    #[test]
    fn test_node_context_root_cause() {
        let err = ProvisioningError::KeyGenerationFailed {
            dir: PathBuf::from("/tmp/keys"),
            reason: "exit status 1".to_string(),
        }
        .for_node("node-2", NodeRole::Validator);

        assert!(err.to_string().contains("node-2"));
        assert!(err.to_string().contains("validator"));
        assert!(matches!(
            err.root_cause(),
            ProvisioningError::KeyGenerationFailed { .. }
        ));
        assert_eq!(err.kind(), "key_generation");
    }

    #[test]
    fn test_io_mapper() {
        let err = ProvisioningError::io("/nope")(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(matches!(err, ProvisioningError::Io { ref path, .. } if path == &PathBuf::from("/nope")));
    }
}
