//! Gzip tarballs and SHA-256 digests.
//!
//! Blocking; callers on the runtime wrap these in `spawn_blocking`.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use tar::{Archive, Builder as TarBuilder, HeaderMode};
use walkdir::WalkDir;

use crate::domain::{ProvisioningError, Result};

/// Archive `source_dir` into `output` with every entry under `prefix/`.
///
/// Entries are sorted and headers carry no timestamps or ownership, so the
/// same tree always produces the same archive bytes.
pub fn create_tar_gz(source_dir: &Path, prefix: &str, output: &Path) -> Result<()> {
    let packaging = |reason: String| ProvisioningError::Packaging {
        path: output.to_path_buf(),
        reason,
    };

    let file = File::create(output).map_err(ProvisioningError::io(output))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = TarBuilder::new(encoder);
    builder.mode(HeaderMode::Deterministic);

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| packaging(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| packaging(e.to_string()))?;
        let name = if relative.as_os_str().is_empty() {
            Path::new(prefix).to_path_buf()
        } else {
            Path::new(prefix).join(relative)
        };

        if entry.file_type().is_dir() {
            builder
                .append_dir(&name, entry.path())
                .map_err(ProvisioningError::io(entry.path()))?;
        } else {
            builder
                .append_path_with_name(entry.path(), &name)
                .map_err(ProvisioningError::io(entry.path()))?;
        }
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .and_then(|mut writer| writer.flush())
        .map_err(ProvisioningError::io(output))?;
    Ok(())
}

/// Extract a gzip tarball into `dest`.
pub fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(ProvisioningError::io(archive))?;
    std::fs::create_dir_all(dest).map_err(ProvisioningError::io(dest))?;
    Archive::new(GzDecoder::new(file))
        .unpack(dest)
        .map_err(ProvisioningError::io(archive))
}

/// Lowercase hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(ProvisioningError::io(path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer).map_err(ProvisioningError::io(path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
