//! Async filesystem helpers with path-carrying errors.

use std::path::Path;

use tracing::debug;

use crate::domain::{ProvisioningError, Result};

/// Mode given to staged executables.
pub const EXECUTABLE_MODE: u32 = 0o744;

/// `mkdir -p`.
pub async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(ProvisioningError::io(path))
}

/// Create a directory that must not exist yet; an existing path is `TargetExists`.
pub async fn create_fresh_dir(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(ProvisioningError::io(path))?
    {
        return Err(ProvisioningError::TargetExists(path.to_path_buf()));
    }
    create_dir(path).await
}

/// Write `contents` to `path`, creating parent directories.
pub async fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent).await?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(ProvisioningError::io(path))?;
    debug!(path = %path.display(), "Wrote file");
    Ok(())
}

/// Copy a single file, creating the destination's parent directories.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        create_dir(parent).await?;
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(ProvisioningError::io(from))?;
    Ok(())
}

/// Copy an executable and set its mode to [`EXECUTABLE_MODE`].
pub async fn copy_executable(from: &Path, to: &Path) -> Result<()> {
    copy_file(from, to).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(to, std::fs::Permissions::from_mode(EXECUTABLE_MODE))
            .await
            .map_err(ProvisioningError::io(to))?;
    }
    debug!(from = %from.display(), to = %to.display(), "Staged executable");
    Ok(())
}

/// Copy the regular files directly inside `from` into `to`. Subdirectories are skipped.
///
/// Returns the number of files copied.
pub async fn copy_dir_files(from: &Path, to: &Path) -> Result<usize> {
    create_dir(to).await?;
    let mut entries = tokio::fs::read_dir(from)
        .await
        .map_err(ProvisioningError::io(from))?;

    let mut copied = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(ProvisioningError::io(from))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(ProvisioningError::io(entry.path()))?;
        if !file_type.is_file() {
            continue;
        }
        tokio::fs::copy(entry.path(), to.join(entry.file_name()))
            .await
            .map_err(ProvisioningError::io(entry.path()))?;
        copied += 1;
    }
    Ok(copied)
}
