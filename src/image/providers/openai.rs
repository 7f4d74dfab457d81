//! OpenAI Images API provider (dall-e-2, dall-e-3).

use crate::canvas;
use crate::config::ProviderConfig;
use crate::error::{parse_retry_after, sanitize_error_message, CanvasGenError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{ImageBatch, ImageFormat, ImageRequest, ImageSize, Operation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::{Duration, Instant};

const RESPONSE_FORMAT: &str = "url";

/// OpenAI image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpenAiImageModel {
    /// DALL-E 2 - supports generate, edit and variation.
    #[default]
    DallE2,
    /// DALL-E 3 - higher quality, generation only, one image per call.
    DallE3,
}

impl OpenAiImageModel {
    /// Returns the API model identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DallE2 => "dall-e-2",
            Self::DallE3 => "dall-e-3",
        }
    }

    /// Sizes this model accepts.
    pub fn supported_sizes(&self) -> &'static [ImageSize] {
        match self {
            Self::DallE2 => &[
                ImageSize::Square256,
                ImageSize::Square512,
                ImageSize::Square1024,
            ],
            Self::DallE3 => &[
                ImageSize::Square1024,
                ImageSize::Wide1792,
                ImageSize::Tall1792,
            ],
        }
    }

    /// Largest `n` this model accepts.
    pub fn max_count(&self) -> u8 {
        match self {
            Self::DallE2 => crate::image::types::MAX_COUNT,
            Self::DallE3 => 1,
        }
    }

    /// Whether this model can perform `operation`.
    pub fn supports(&self, operation: Operation) -> bool {
        match self {
            Self::DallE2 => true,
            Self::DallE3 => operation == Operation::Generate,
        }
    }

    /// Checks size, count and operation against the model's limits.
    pub fn validate(&self, operation: Operation, request: &ImageRequest) -> Result<()> {
        if !self.supports(operation) {
            return Err(CanvasGenError::InvalidRequest(format!(
                "{} does not support {operation}",
                self.as_str()
            )));
        }
        if !self.supported_sizes().contains(&request.size) {
            let accepted: Vec<&str> = self.supported_sizes().iter().map(|s| s.as_str()).collect();
            return Err(CanvasGenError::InvalidRequest(format!(
                "{} does not support size {}, expected one of {}",
                self.as_str(),
                request.size,
                accepted.join(", ")
            )));
        }
        if request.count > self.max_count() {
            return Err(CanvasGenError::InvalidRequest(format!(
                "{} accepts at most {} image(s) per request, got {}",
                self.as_str(),
                self.max_count(),
                request.count
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for OpenAiImageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpenAiImageModel {
    type Err = CanvasGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dall-e-2" | "dalle2" => Ok(Self::DallE2),
            "dall-e-3" | "dalle3" => Ok(Self::DallE3),
            other => Err(CanvasGenError::InvalidRequest(format!(
                "unknown model {other:?}, expected dall-e-2 or dall-e-3"
            ))),
        }
    }
}

/// Builder for OpenAiImageProvider.
#[derive(Debug, Clone, Default)]
pub struct OpenAiImageProviderBuilder {
    config: ProviderConfig,
}

impl OpenAiImageProviderBuilder {
    /// Creates a new builder with default settings and no API key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration.
    pub fn config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Sets the API root (e.g. a proxy or a local mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.with_base_url(url);
        self
    }

    /// Sets the OpenAI image model variant.
    pub fn model(mut self, model: OpenAiImageModel) -> Self {
        self.config.model = model;
        self
    }

    /// Sets the per-request HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Builds the provider.
    ///
    /// A missing API key is accepted here and reported on the first call.
    pub fn build(self) -> Result<OpenAiImageProvider> {
        OpenAiImageProvider::new(self.config)
    }
}

/// OpenAI image generation provider.
pub struct OpenAiImageProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiImageProvider {
    /// Creates a provider from an explicit configuration.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Creates a new `OpenAiImageProviderBuilder`.
    pub fn builder() -> OpenAiImageProviderBuilder {
        OpenAiImageProviderBuilder::new()
    }

    /// The configuration this provider was built with.
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                CanvasGenError::Auth("OPENAI_API_KEY not set and no API key provided".into())
            })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Local checks shared by all operations. Runs before any network I/O.
    fn prepare(&self, operation: Operation, request: &ImageRequest) -> Result<&str> {
        request.validate_for(operation)?;
        self.config.model.validate(operation, request)?;
        if operation == Operation::Edit {
            if let (Some(source), Some(mask)) = (&request.source_image, &request.mask_image) {
                canvas::check_mask_shape(source, mask)?;
            }
        }
        self.api_key()
    }

    fn authorized(&self, builder: reqwest::RequestBuilder, api_key: &str) -> reqwest::RequestBuilder {
        let builder = builder.bearer_auth(api_key);
        match &self.config.organization {
            Some(org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }

    async fn send(
        &self,
        operation: Operation,
        builder: reqwest::RequestBuilder,
    ) -> Result<ImageBatch> {
        let start = Instant::now();

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let openai_response: OpenAiImageResponse = serde_json::from_str(&body).map_err(|e| {
            CanvasGenError::UnexpectedResponse(format!("malformed {operation} response: {e}"))
        })?;

        let urls = openai_response
            .data
            .into_iter()
            .map(|d| {
                d.url.ok_or_else(|| {
                    CanvasGenError::UnexpectedResponse(format!(
                        "OpenAI {operation} response entry has no url"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let batch = ImageBatch::from_urls(openai_response.created, urls)?;
        tracing::debug!(
            %operation,
            model = self.config.model.as_str(),
            created = batch.created_at,
            images = batch.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "OpenAI image request complete"
        );
        Ok(batch)
    }

    fn transport_error(&self, error: reqwest::Error) -> CanvasGenError {
        if error.is_timeout() {
            CanvasGenError::Timeout(self.config.timeout)
        } else {
            CanvasGenError::Network(error)
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> CanvasGenError {
        let message = OpenAiErrorBody::message(text);
        let message = sanitize_error_message(&message);
        if status == 401 || status == 403 {
            return CanvasGenError::Auth(message);
        }
        if status == 402 {
            return CanvasGenError::Billing(message);
        }
        if status == 429 {
            // insufficient_quota is not transient, unlike a plain rate limit
            if text.contains("insufficient_quota") || text.contains("exceeded your current quota") {
                return CanvasGenError::Billing(message);
            }
            let retry_after = parse_retry_after(headers).map(Duration::from_secs);
            return CanvasGenError::RateLimited { retry_after };
        }
        let lower = text.to_lowercase();
        if lower.contains("safety") || lower.contains("content_policy") {
            return CanvasGenError::ContentBlocked(message);
        }
        if matches!(status, 400 | 404 | 413 | 422) {
            return CanvasGenError::InvalidRequest(message);
        }
        CanvasGenError::Api { status, message }
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate(&self, request: &ImageRequest) -> Result<ImageBatch> {
        let api_key = self.prepare(Operation::Generate, request)?;
        let body = OpenAiImageRequest::from_image_request(request, &self.config.model);

        tracing::debug!(
            model = self.config.model.as_str(),
            size = %request.size,
            n = request.count,
            "submitting OpenAI generation request"
        );

        let builder = self
            .client
            .post(self.endpoint("images/generations"))
            .json(&body);
        self.send(Operation::Generate, self.authorized(builder, api_key))
            .await
    }

    async fn edit(&self, request: &ImageRequest) -> Result<ImageBatch> {
        let api_key = self.prepare(Operation::Edit, request)?;
        let form = multipart_form(Operation::Edit, request, &self.config.model)?;

        tracing::debug!(
            size = %request.size,
            n = request.count,
            "submitting OpenAI edit request"
        );

        let builder = self.client.post(self.endpoint("images/edits")).multipart(form);
        self.send(Operation::Edit, self.authorized(builder, api_key))
            .await
    }

    async fn create_variation(&self, request: &ImageRequest) -> Result<ImageBatch> {
        let api_key = self.prepare(Operation::Variation, request)?;
        let form = multipart_form(Operation::Variation, request, &self.config.model)?;

        tracing::debug!(
            size = %request.size,
            n = request.count,
            "submitting OpenAI variation request"
        );

        let builder = self
            .client
            .post(self.endpoint("images/variations"))
            .multipart(form);
        self.send(Operation::Variation, self.authorized(builder, api_key))
            .await
    }

    fn name(&self) -> &str {
        "OpenAI (DALL-E)"
    }

    async fn health_check(&self) -> Result<()> {
        let api_key = self.api_key()?;
        let response = self
            .authorized(self.client.get(self.endpoint("models")), api_key)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        match response.status().as_u16() {
            401 | 403 => Err(CanvasGenError::Auth("Invalid API key".into())),
            s if !(200..300).contains(&s) => Err(CanvasGenError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// Builds the multipart body for the edit and variation endpoints.
fn multipart_form(
    operation: Operation,
    request: &ImageRequest,
    model: &OpenAiImageModel,
) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new()
        .text("model", model.as_str())
        .text("n", request.count.to_string())
        .text("size", request.size.as_str())
        .text("response_format", RESPONSE_FORMAT);

    if let Some(source) = &request.source_image {
        form = form.part("image", image_part(source, "image")?);
    }
    if operation == Operation::Edit {
        if let Some(mask) = &request.mask_image {
            form = form.part("mask", image_part(mask, "mask")?);
        }
        if let Some(prompt) = &request.prompt {
            form = form.text("prompt", prompt.clone());
        }
    }
    Ok(form)
}

fn image_part(bytes: &[u8], stem: &str) -> Result<reqwest::multipart::Part> {
    let format = ImageFormat::from_magic_bytes(bytes).unwrap_or_default();
    reqwest::multipart::Part::bytes(bytes.to_vec())
        .file_name(format!("{stem}.{}", format.extension()))
        .mime_str(format.mime_type())
        .map_err(|e| CanvasGenError::InvalidRequest(e.to_string()))
}

#[derive(Debug, Serialize)]
struct OpenAiImageRequest {
    model: String,
    prompt: String,
    n: u8,
    size: String,
    response_format: &'static str,
}

impl OpenAiImageRequest {
    fn from_image_request(req: &ImageRequest, model: &OpenAiImageModel) -> Self {
        Self {
            model: model.as_str().to_string(),
            prompt: req.prompt.clone().unwrap_or_default(),
            n: req.count,
            size: req.size.as_str().to_string(),
            response_format: RESPONSE_FORMAT,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiImageResponse {
    created: i64,
    data: Vec<OpenAiImageData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    revised_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorDetail {
    message: String,
}

impl OpenAiErrorBody {
    /// Pulls `error.message` out of an OpenAI error body, falling back to the raw text.
    fn message(text: &str) -> String {
        serde_json::from_str::<OpenAiErrorBody>(text)
            .map(|body| body.error.message)
            .unwrap_or_else(|_| text.to_string())
    }
}
