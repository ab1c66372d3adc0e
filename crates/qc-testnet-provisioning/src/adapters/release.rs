//! Release archive downloads.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use super::archive::extract_tar_gz;
use crate::domain::{
    FetchedRelease, ProtocolVersion, ProvisioningError, Result, BIN_ARCHIVE, CONFIG_ARCHIVE,
};

/// Downloads `<base_url>/<version>/{bin,config}.tar.gz`.
#[derive(Debug, Clone)]
pub struct ReleaseFetcher {
    client: Client,
    base_url: String,
}

impl ReleaseFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisioningError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL of one release archive.
    pub fn url_for(&self, version: &ProtocolVersion, archive: &str) -> String {
        format!("{}/{}/{}", self.base_url, version.dir_name(), archive)
    }

    /// Download both archives of `version` into `dest`.
    pub async fn fetch(&self, version: &ProtocolVersion, dest: &Path) -> Result<FetchedRelease> {
        super::fs::create_dir(dest).await?;

        let bin_archive = dest.join(BIN_ARCHIVE);
        let config_archive = dest.join(CONFIG_ARCHIVE);
        self.download(&self.url_for(version, BIN_ARCHIVE), &bin_archive)
            .await?;
        self.download(&self.url_for(version, CONFIG_ARCHIVE), &config_archive)
            .await?;

        info!(version = %version, dest = %dest.display(), "Fetched release");
        Ok(FetchedRelease {
            version: *version,
            bin_archive,
            config_archive,
        })
    }

    async fn download(&self, url: &str, to: &Path) -> Result<()> {
        let fetch_error = |reason: String| ProvisioningError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(describe(&e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("HTTP {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| fetch_error(describe(&e)))?;

        super::fs::write_file(to, &body).await?;
        debug!(url, bytes = body.len(), "Downloaded archive");
        Ok(())
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("timed out: {error}")
    } else {
        error.to_string()
    }
}

/// Extract a fetched archive into `dest` off the runtime threads.
pub async fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let (archive, dest) = (archive.to_path_buf(), dest.to_path_buf());
    tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &dest))
        .await
        .map_err(|e| ProvisioningError::Task(e.to_string()))?
}
