//! Best-effort toast icon cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Download timeout for the icon.
pub const ICON_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Why the icon could not be cached.
#[derive(Debug, Error)]
pub enum IconError {
    /// The HTTP client could not be built at startup.
    #[error("http client unavailable")]
    NoClient,

    /// The request or the body read failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The icon could not be written to disk.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Fetches the site icon once and serves it from disk afterwards.
///
/// Every failure resolves to "no icon"; a later call retries the download.
pub struct IconCache {
    url: String,
    path: PathBuf,
    client: Option<reqwest::Client>,
}

impl IconCache {
    /// Cache `url` at `path`.
    pub fn new(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let client = match reqwest::Client::builder().timeout(ICON_FETCH_TIMEOUT).build() {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "failed to build icon http client, toasts will have no icon");
                None
            }
        };
        Self {
            url: url.into(),
            path: path.into(),
            client,
        }
    }

    /// Cache location.
    pub fn location(&self) -> &Path {
        &self.path
    }

    /// Path to the cached icon, downloading it first if needed.
    pub async fn resolve(&self) -> Option<PathBuf> {
        if tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            return Some(self.path.clone());
        }
        match self.download().await {
            Ok(()) => Some(self.path.clone()),
            Err(e) => {
                warn!(url = %self.url, error = %e, "icon unavailable, notifying without it");
                None
            }
        }
    }

    async fn download(&self) -> Result<(), IconError> {
        let client = self.client.as_ref().ok_or(IconError::NoClient)?;
        let response = client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IconError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?;
        let write_err = |source: std::io::Error| IconError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&self.path, &bytes).await.map_err(write_err)?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "icon cached");
        Ok(())
    }
}
