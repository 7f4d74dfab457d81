//! Core types for image requests and results.

use crate::error::{CanvasGenError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Largest `n` the provider accepts in one call.
pub const MAX_COUNT: u8 = 10;

/// Supported image formats for uploaded inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format (modern, efficient).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Output sizes the provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 256x256.
    #[serde(rename = "256x256")]
    Square256,
    /// 512x512.
    #[serde(rename = "512x512")]
    Square512,
    /// 1024x1024.
    #[default]
    #[serde(rename = "1024x1024")]
    Square1024,
    /// 1792x1024 landscape.
    #[serde(rename = "1792x1024")]
    Wide1792,
    /// 1024x1792 portrait.
    #[serde(rename = "1024x1792")]
    Tall1792,
}

impl ImageSize {
    /// Every size, smallest first.
    pub const ALL: [ImageSize; 5] = [
        Self::Square256,
        Self::Square512,
        Self::Square1024,
        Self::Wide1792,
        Self::Tall1792,
    ];

    /// Returns the size as the provider expects it (e.g. "1024x1024").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square256 => "256x256",
            Self::Square512 => "512x512",
            Self::Square1024 => "1024x1024",
            Self::Wide1792 => "1792x1024",
            Self::Tall1792 => "1024x1792",
        }
    }

    /// Returns `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Square256 => (256, 256),
            Self::Square512 => (512, 512),
            Self::Square1024 => (1024, 1024),
            Self::Wide1792 => (1792, 1024),
            Self::Tall1792 => (1024, 1792),
        }
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = CanvasGenError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == normalized)
            .ok_or_else(|| {
                let accepted: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                CanvasGenError::InvalidRequest(format!(
                    "unsupported size {s:?}, expected one of {}",
                    accepted.join(", ")
                ))
            })
    }
}

/// Which remote operation a request is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create an image from a prompt.
    Generate,
    /// Repaint the transparent area of a mask.
    Edit,
    /// Create variations of an image.
    Variation,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::Edit => write!(f, "edit"),
            Self::Variation => write!(f, "variation"),
        }
    }
}

/// A request for one of the three provider operations.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Text prompt (generate and edit).
    pub prompt: Option<String>,
    /// Source image bytes (edit and variation).
    pub source_image: Option<Vec<u8>>,
    /// Mask image bytes (edit only). Transparent pixels mark the area to regenerate.
    pub mask_image: Option<Vec<u8>>,
    /// Number of images to request.
    pub count: u8,
    /// Output size.
    pub size: ImageSize,
}

impl ImageRequest {
    /// Creates a generation request.
    pub fn generate(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            source_image: None,
            mask_image: None,
            count: 1,
            size: ImageSize::default(),
        }
    }

    /// Creates an edit request from source and mask bytes.
    pub fn edit(source: Vec<u8>, mask: Vec<u8>, prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            source_image: Some(source),
            mask_image: Some(mask),
            count: 1,
            size: ImageSize::default(),
        }
    }

    /// Creates a variation request from source bytes.
    pub fn variation(source: Vec<u8>) -> Self {
        Self {
            prompt: None,
            source_image: Some(source),
            mask_image: None,
            count: 1,
            size: ImageSize::default(),
        }
    }

    /// Sets the number of images to request.
    pub fn with_count(mut self, count: u8) -> Self {
        self.count = count;
        self
    }

    /// Sets the output size.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Checks that the fields needed by `operation` are present and sane.
    ///
    /// Model-specific limits are checked by the provider.
    pub fn validate_for(&self, operation: Operation) -> Result<()> {
        if self.count == 0 || self.count > MAX_COUNT {
            return Err(CanvasGenError::InvalidRequest(format!(
                "count must be between 1 and {MAX_COUNT}, got {}",
                self.count
            )));
        }

        let needs_prompt = matches!(operation, Operation::Generate | Operation::Edit);
        if needs_prompt && self.prompt.as_deref().map_or(true, |p| p.trim().is_empty()) {
            return Err(CanvasGenError::InvalidRequest(format!(
                "{operation} requires a non-empty prompt"
            )));
        }

        let needs_source = matches!(operation, Operation::Edit | Operation::Variation);
        if needs_source && self.source_image.as_ref().map_or(true, |s| s.is_empty()) {
            return Err(CanvasGenError::InvalidRequest(format!(
                "{operation} requires a source image"
            )));
        }

        if operation == Operation::Edit && self.mask_image.as_ref().map_or(true, |m| m.is_empty())
        {
            return Err(CanvasGenError::InvalidRequest(
                "edit requires a mask image".into(),
            ));
        }

        Ok(())
    }
}

/// One generated image as described by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use = "a result URL expires; persist it or drop it deliberately"]
pub struct ImageResult {
    /// Provider-assigned creation time, seconds since the Unix epoch.
    pub created_at: i64,
    /// Time-limited download URL.
    pub url: String,
    /// Position of this image in the provider response.
    pub index: usize,
}

impl ImageResult {
    /// Creates a result descriptor.
    pub fn new(created_at: i64, url: impl Into<String>, index: usize) -> Self {
        Self {
            created_at,
            url: url.into(),
            index,
        }
    }

    /// File name this result is persisted under.
    ///
    /// The first image keeps the bare timestamp; later variants of the same
    /// call get an index suffix so they do not overwrite each other.
    pub fn file_name(&self) -> String {
        if self.index == 0 {
            format!("{}.png", self.created_at)
        } else {
            format!("{}_{}.png", self.created_at, self.index)
        }
    }
}

/// Every image returned by a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBatch {
    /// Provider-assigned creation time shared by all results.
    pub created_at: i64,
    /// Results in provider order.
    pub results: Vec<ImageResult>,
}

impl ImageBatch {
    /// Builds a batch from a timestamp and download URLs.
    pub fn from_urls(created_at: i64, urls: Vec<String>) -> Result<Self> {
        if urls.is_empty() {
            return Err(CanvasGenError::UnexpectedResponse(
                "provider returned no images".into(),
            ));
        }
        let results = urls
            .into_iter()
            .enumerate()
            .map(|(index, url)| ImageResult::new(created_at, url, index))
            .collect();
        Ok(Self {
            created_at,
            results,
        })
    }

    /// The first result, which is what single-image callers use.
    pub fn first(&self) -> Option<&ImageResult> {
        self.results.first()
    }

    /// Consumes the batch, keeping only the first result.
    pub fn into_first(self) -> Result<ImageResult> {
        self.results.into_iter().next().ok_or_else(|| {
            CanvasGenError::UnexpectedResponse("provider returned no images".into())
        })
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// True if the batch holds no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Reads an image file into memory.
pub fn read_image_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path)
        .map_err(|e| CanvasGenError::Decode(format!("cannot read {}: {e}", path.display())))
}
