//! Image provider trait and utilities.

use crate::error::{CanvasGenError, Result};
use crate::image::types::{ImageBatch, ImageRequest, ImageResult, Operation};
use async_trait::async_trait;
use std::time::Duration;

const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Trait for remote image providers.
///
/// Every method is a single remote call. Implementations must reject invalid
/// requests and missing credentials before doing any network I/O.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Creates images from a text prompt.
    async fn generate(&self, request: &ImageRequest) -> Result<ImageBatch>;

    /// Repaints the transparent area of the mask over the source image.
    async fn edit(&self, request: &ImageRequest) -> Result<ImageBatch>;

    /// Creates variations of the source image.
    async fn create_variation(&self, request: &ImageRequest) -> Result<ImageBatch>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;

    /// Checks if the provider is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;

    /// Dispatches to the method for `operation`.
    async fn run(&self, operation: Operation, request: &ImageRequest) -> Result<ImageBatch> {
        match operation {
            Operation::Generate => self.generate(request).await,
            Operation::Edit => self.edit(request).await,
            Operation::Variation => self.create_variation(request).await,
        }
    }
}

/// Extension trait with retry logic and single-result helpers.
#[async_trait]
pub trait ImageProviderExt: ImageProvider {
    /// Runs `operation` with automatic retries on transient failures.
    ///
    /// Auth, validation, shape and decode errors are returned immediately.
    async fn run_with_retries(
        &self,
        operation: Operation,
        request: &ImageRequest,
        max_retries: u32,
    ) -> Result<ImageBatch> {
        let mut attempt = 0;

        loop {
            match self.run(operation, request).await {
                Ok(batch) => return Ok(batch),
                Err(e) if e.is_retryable() && attempt < max_retries => {
                    let delay = backoff_delay(attempt, &e);
                    tracing::warn!(
                        %operation,
                        attempt = attempt + 1,
                        max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Generates and returns only the first image.
    async fn generate_one(&self, request: &ImageRequest) -> Result<ImageResult> {
        self.generate(request).await?.into_first()
    }

    /// Edits and returns only the first image.
    async fn edit_one(&self, request: &ImageRequest) -> Result<ImageResult> {
        self.edit(request).await?.into_first()
    }

    /// Creates variations and returns only the first image.
    async fn create_variation_one(&self, request: &ImageRequest) -> Result<ImageResult> {
        self.create_variation(request).await?.into_first()
    }
}

impl<T: ImageProvider> ImageProviderExt for T {}

/// Delay before retry number `attempt + 1`: the provider's hint if it sent
/// one, otherwise exponential from one second, capped at thirty.
pub(crate) fn backoff_delay(attempt: u32, error: &CanvasGenError) -> Duration {
    error
        .retry_after()
        .unwrap_or_else(|| BASE_BACKOFF.saturating_mul(2u32.saturating_pow(attempt)))
        .min(MAX_BACKOFF)
}
