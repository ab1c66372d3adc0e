//! Template loading from disk.

use std::path::Path;

use tracing::debug;

use crate::domain::{ProvisioningError, Result, Template};

/// Read and parse a TOML template.
///
/// An unreadable or absent file is `TemplateNotFound`; malformed TOML is
/// `TemplateParse`. No schema validation happens here.
pub async fn load_template(path: &Path) -> Result<Template> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProvisioningError::TemplateNotFound {
            path: path.to_path_buf(),
            source,
        })?;
    let template = Template::parse(path, &contents)?;
    debug!(path = %path.display(), sections = template.table().len(), "Loaded template");
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_template(&dir.path().join("nope.toml")).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::TemplateNotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[network\n").unwrap();

        let err = load_template(&path).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::TemplateParse { .. }));
    }

    #[tokio::test]
    async fn test_loads_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[network]\nname = \"x\"\n").unwrap();

        let template = load_template(&path).await.unwrap();
        assert_eq!(template.source(), path.as_path());
        assert!(template.section("network").is_ok());
    }
}
