//! Object store adapters: HTTP PUT and a local directory mirror.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::domain::{ProvisioningError, Result};
use crate::ports::ObjectStore;

/// Uploads with `PUT <endpoint>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| ProvisioningError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into().trim_matches('/').to_string(),
            token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every upload.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// URL an object key is uploaded to.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let publish = |reason: String| ProvisioningError::Publish {
            key: key.to_string(),
            reason,
        };

        let mut request = self.client.put(self.url_for(key)).body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| publish(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(publish(format!("HTTP {status}")));
        }

        debug!(key, status = status.as_u16(), "Uploaded object");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.endpoint, self.bucket)
    }
}

/// Mirrors objects into a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(ProvisioningError::Publish {
                key: key.to_string(),
                reason: "key is not a relative path".to_string(),
            });
        }
        let path = self.root.join(key);
        super::fs::write_file(&path, body).await
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
