//! Downloads result URLs and stores them as `<created>.png` files.

use crate::error::{CanvasGenError, Result};
use crate::image::{ImageBatch, ImageResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default folder generated images are written to.
pub const DEFAULT_DESTINATION: &str = "gen_images";

/// Fetches result URLs and writes them to disk.
///
/// The body is downloaded completely before anything touches the filesystem,
/// and the final file appears through a rename, so a failed persist never
/// leaves a partial image behind.
#[derive(Debug, Clone)]
pub struct ResultPersister {
    client: reqwest::Client,
}

impl Default for ResultPersister {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl ResultPersister {
    /// Creates a persister with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a persister whose downloads time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Downloads `result` into `destination`, returning the written path.
    ///
    /// Creates `destination` if missing and overwrites an existing file with
    /// the same name.
    pub async fn persist(
        &self,
        result: &ImageResult,
        destination: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let destination = destination.as_ref();
        let bytes = self.fetch(&result.url).await?;

        tokio::fs::create_dir_all(destination).await?;
        let path = destination.join(result.file_name());
        let partial = destination.join(format!(".{}.part", result.file_name()));

        tokio::fs::write(&partial, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(
            path = %path.display(),
            size_bytes = bytes.len(),
            "persisted image"
        );
        Ok(path)
    }

    /// Persists every result of `batch`, in order.
    pub async fn persist_batch(
        &self,
        batch: &ImageBatch,
        destination: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let destination = destination.as_ref();
        let mut paths = Vec::with_capacity(batch.len());
        for result in &batch.results {
            paths.push(self.persist(result, destination).await?);
        }
        Ok(paths)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CanvasGenError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // signed blob URLs answer 403/404/410 once they have expired
            return Err(match status.as_u16() {
                403 | 404 | 410 => CanvasGenError::UrlExpired,
                code => CanvasGenError::Fetch(format!("download returned HTTP {code}")),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CanvasGenError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let persister = ResultPersister::with_timeout(Duration::from_secs(2)).unwrap();
        // port 9 (discard) on localhost is closed in test environments
        let result = ImageResult::new(1, "http://127.0.0.1:9/img.png", 0);

        let err = persister.persist(&result, dir.path()).await.unwrap_err();
        assert!(matches!(err, CanvasGenError::Fetch(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageResult::new(1, "not a url", 0);
        let err = ResultPersister::new()
            .persist(&result, dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, CanvasGenError::Fetch(_)));
        assert!(!dir.path().join("out").exists());
    }
}
