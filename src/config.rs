//! Provider configuration.
//!
//! Configuration is an explicit value handed to the provider constructor.
//! [`ProviderConfig::from_env`] reads the conventional environment variables
//! once; nothing in the crate consults the environment afterwards.

use crate::error::{CanvasGenError, Result};
use crate::image::OpenAiImageModel;
use std::time::Duration;

/// Default OpenAI API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Settings for [`crate::OpenAiImageProvider`].
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key. `None` makes every remote call fail with an auth error.
    pub api_key: Option<String>,
    /// API root, without trailing slash.
    pub base_url: String,
    /// Optional organization id sent as `OpenAI-Organization`.
    pub organization: Option<String>,
    /// Image model.
    pub model: OpenAiImageModel,
    /// HTTP timeout for a single request.
    pub timeout: Duration,
    /// Retry budget for transient provider failures.
    pub max_retries: u32,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            organization: None,
            model: OpenAiImageModel::default(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
        }
    }
}

impl ProviderConfig {
    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_ORG_ID`,
    /// `CANVASGEN_MODEL`, `CANVASGEN_TIMEOUT_SECS` and `CANVASGEN_MAX_RETRIES`.
    ///
    /// A missing key is not an error here; it surfaces on the first remote call.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        config.api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());

        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        config.organization = lookup("OPENAI_ORG_ID").filter(|o| !o.trim().is_empty());

        if let Some(model) = lookup("CANVASGEN_MODEL") {
            config.model = model.parse()?;
        }

        if let Some(secs) = lookup("CANVASGEN_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                CanvasGenError::InvalidRequest(format!(
                    "CANVASGEN_TIMEOUT_SECS must be a number of seconds, got {secs:?}"
                ))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Some(retries) = lookup("CANVASGEN_MAX_RETRIES") {
            config.max_retries = retries.trim().parse().map_err(|_| {
                CanvasGenError::InvalidRequest(format!(
                    "CANVASGEN_MAX_RETRIES must be a non-negative integer, got {retries:?}"
                ))
            })?;
        }

        Ok(config)
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the model.
    pub fn with_model(mut self, model: OpenAiImageModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}
