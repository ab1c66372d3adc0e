//! Key generation through the external client binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::{ProvisioningError, PublicKey, Result, PUBLIC_KEY_HEX_FILE};
use crate::ports::KeyGenerator;

/// Runs `<program> [prefix args...] keygen <dir>`.
#[derive(Debug, Clone)]
pub struct ClientKeyGenerator {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl ClientKeyGenerator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Arguments inserted before `keygen`, e.g. a wrapper's `run --` prefix.
    pub fn with_prefix_args(mut self, args: Vec<String>) -> Self {
        self.prefix_args = args;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl KeyGenerator for ClientKeyGenerator {
    async fn generate(&self, output_dir: &Path) -> Result<PublicKey> {
        let failed = |reason: String| ProvisioningError::KeyGenerationFailed {
            dir: output_dir.to_path_buf(),
            reason,
        };

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(ProvisioningError::io(output_dir))?;

        let output = Command::new(&self.program)
            .args(&self.prefix_args)
            .arg("keygen")
            .arg(output_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| failed(format!("cannot run {}: {e}", self.program.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!("{}: {}", output.status, stderr.trim())));
        }

        let key_file = output_dir.join(PUBLIC_KEY_HEX_FILE);
        let raw = tokio::fs::read_to_string(&key_file)
            .await
            .map_err(|e| failed(format!("cannot read {}: {e}", key_file.display())))?;
        let key = PublicKey::parse(&raw).map_err(|e| failed(e.to_string()))?;

        debug!(dir = %output_dir.display(), key = %key, "Generated key pair");
        Ok(key)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// Runs `body` through `/bin/sh` so the script never needs exec permission.
    fn client(dir: &Path, body: &str) -> ClientKeyGenerator {
        let path = dir.join("client.sh");
        std::fs::write(&path, format!("{body}\n")).unwrap();
        ClientKeyGenerator::new("/bin/sh").with_prefix_args(vec![path.display().to_string()])
    }

    #[tokio::test]
    async fn test_reads_trimmed_public_key() {
        let dir = tempfile::tempdir().unwrap();
        let generator = client(
            dir.path(),
            r#"[ "$1" = "keygen" ] || exit 2
printf '  01AbCd\n' > "$2/public_key_hex"
touch "$2/secret_key.pem""#,
        );

        let keys = dir.path().join("keys");
        let key = generator.generate(&keys).await.unwrap();

        assert_eq!(key.as_hex(), "01abcd");
        assert!(keys.join("secret_key.pem").exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_fails() {
        let dir = tempfile::tempdir().unwrap();
        let generator = client(dir.path(), "echo boom >&2\nexit 3");

        let err = generator.generate(&dir.path().join("keys")).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::KeyGenerationFailed { ref reason, .. } if reason.contains("boom")
        ));
    }

    #[tokio::test]
    async fn test_missing_key_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let generator = client(dir.path(), "exit 0");

        let err = generator.generate(&dir.path().join("keys")).await.unwrap_err();
        assert!(matches!(err, ProvisioningError::KeyGenerationFailed { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientKeyGenerator::new(dir.path().join("absent"))
            .generate(&dir.path().join("keys"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisioningError::KeyGenerationFailed { .. }));
    }
}
