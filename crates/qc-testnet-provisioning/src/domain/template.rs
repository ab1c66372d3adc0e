//! # Templates and Overlays
//!
//! A [`Template`] is a parsed TOML document kept as an ordered table so that
//! fields the pipeline does not know about pass through untouched.
//!
//! Mutation only happens through an [`Overlay`], which writes known fields
//! into sections that must already exist. A missing section is an error, it
//! is never silently created (unless the caller asks for it explicitly).

use std::path::{Path, PathBuf};

use super::errors::{ProvisioningError, Result};

/// Parsed TOML template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: PathBuf,
    table: toml::Table,
}

impl Template {
    /// Parse template text; `source` is only used for error messages.
    pub fn parse(source: impl Into<PathBuf>, contents: &str) -> Result<Self> {
        let source = source.into();
        let table = contents
            .parse::<toml::Table>()
            .map_err(|e| ProvisioningError::TemplateParse {
                path: source.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { source, table })
    }

    /// Where the template was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Underlying table.
    pub fn table(&self) -> &toml::Table {
        &self.table
    }

    /// A top-level section; `TemplateFieldMissing` if absent or not a table.
    pub fn section(&self, name: &str) -> Result<&toml::Table> {
        self.table
            .get(name)
            .and_then(toml::Value::as_table)
            .ok_or_else(|| ProvisioningError::TemplateFieldMissing {
                field: name.to_string(),
            })
    }

    /// Start an overlay over a private copy of the tree.
    pub fn overlay(&self) -> Overlay {
        Overlay {
            table: self.table.clone(),
        }
    }
}

/// Write-through view applying field overrides to a template copy.
#[derive(Debug, Clone)]
pub struct Overlay {
    table: toml::Table,
}

impl Overlay {
    /// Whether a dotted section path exists as a table.
    pub fn has_section(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    fn lookup(&self, path: &str) -> Option<&toml::Table> {
        let mut current = &self.table;
        for part in path.split('.') {
            current = current.get(part)?.as_table()?;
        }
        Some(current)
    }

    fn section_mut(&mut self, path: &str) -> Result<&mut toml::Table> {
        let missing = || ProvisioningError::TemplateFieldMissing {
            field: path.to_string(),
        };
        let mut current = &mut self.table;
        for part in path.split('.') {
            current = current
                .get_mut(part)
                .and_then(toml::Value::as_table_mut)
                .ok_or_else(missing)?;
        }
        Ok(current)
    }

    /// Set `section.key`; the section must already exist.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<toml::Value>) -> Result<()> {
        self.section_mut(section)?
            .insert(key.to_string(), value.into());
        Ok(())
    }

    /// Set `section.key` only if the section exists. Returns whether it was written.
    pub fn set_if_present(
        &mut self,
        section: &str,
        key: &str,
        value: impl Into<toml::Value>,
    ) -> bool {
        match self.section_mut(section) {
            Ok(table) => {
                table.insert(key.to_string(), value.into());
                true
            }
            Err(_) => false,
        }
    }

    /// Create a top-level section if it does not exist yet.
    pub fn ensure_section(&mut self, name: &str) -> Result<()> {
        let entry = self
            .table
            .entry(name.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if entry.is_table() {
            Ok(())
        } else {
            Err(ProvisioningError::TemplateFieldMissing {
                field: format!("{name} (present but not a table)"),
            })
        }
    }

    /// Finish and return the overridden tree.
    pub fn into_table(self) -> toml::Table {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[network]
name = "template"
extra = 42

[consensus.highway]
secret_key_path = "old"
"#;

    #[test]
    fn test_parse_error_is_reported() {
        let err = Template::parse("bad.toml", "[network\nname =").unwrap_err();
        assert!(matches!(err, ProvisioningError::TemplateParse { .. }));
    }

    #[test]
    fn test_section_lookup() {
        let template = Template::parse("t.toml", SAMPLE).unwrap();
        assert!(template.section("network").is_ok());
        assert!(matches!(
            template.section("storage"),
            Err(ProvisioningError::TemplateFieldMissing { field }) if field == "storage"
        ));
    }

    #[test]
    fn test_overlay_preserves_unknown_fields() {
        let template = Template::parse("t.toml", SAMPLE).unwrap();
        let mut overlay = template.overlay();
        overlay.set("network", "name", "chain-1").unwrap();

        let table = overlay.into_table();
        assert_eq!(table["network"]["name"].as_str(), Some("chain-1"));
        assert_eq!(table["network"]["extra"].as_integer(), Some(42));
        // The original template is untouched.
        assert_eq!(template.table()["network"]["name"].as_str(), Some("template"));
    }

    #[test]
    fn test_overlay_nested_sections() {
        let template = Template::parse("t.toml", SAMPLE).unwrap();
        let mut overlay = template.overlay();

        assert!(overlay.has_section("consensus.highway"));
        overlay
            .set("consensus.highway", "secret_key_path", "../keys/secret_key.pem")
            .unwrap();
        assert!(overlay.set("storage", "path", "/storage/x").is_err());
        assert!(!overlay.set_if_present("highway", "minimum_round_exponent", 13_i64));
    }

    #[test]
    fn test_ensure_section_creates_once() {
        let template = Template::parse("t.toml", SAMPLE).unwrap();
        let mut overlay = template.overlay();
        overlay.ensure_section("node").unwrap();
        overlay.set("node", "trusted_hash", "ab").unwrap();
        overlay.ensure_section("node").unwrap();

        let table = overlay.into_table();
        assert_eq!(table["node"]["trusted_hash"].as_str(), Some("ab"));
    }
}
