//! Canvas normalization: shrink an image to fit a fixed box and center it on
//! an opaque white canvas of exactly that size.

use crate::error::{CanvasGenError, Result};
use crate::image::ImageSize;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Canvas fill color.
pub const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Target canvas dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl CanvasSize {
    /// Creates a canvas size. Both sides must be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CanvasGenError::InvalidRequest(format!(
                "canvas size must be non-zero, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }
}

impl From<ImageSize> for CanvasSize {
    fn from(size: ImageSize) -> Self {
        let (width, height) = size.dimensions();
        Self { width, height }
    }
}

impl std::fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for CanvasSize {
    type Err = CanvasGenError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CanvasGenError::InvalidRequest(format!("expected WIDTHxHEIGHT, got {s:?}"));
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width = w.trim().parse().map_err(|_| invalid())?;
        let height = h.trim().parse().map_err(|_| invalid())?;
        Self::new(width, height)
    }
}

/// Size an image of `source` dimensions takes after shrinking to fit `canvas`.
///
/// Images that already fit are left alone; nothing is ever enlarged.
pub fn fit_dimensions(source: (u32, u32), canvas: CanvasSize) -> (u32, u32) {
    let (w, h) = source;
    if w <= canvas.width && h <= canvas.height {
        return (w, h);
    }

    let scale = f64::min(
        f64::from(canvas.width) / f64::from(w),
        f64::from(canvas.height) / f64::from(h),
    );
    let fit_w = ((f64::from(w) * scale).round() as u32).clamp(1, canvas.width);
    let fit_h = ((f64::from(h) * scale).round() as u32).clamp(1, canvas.height);
    (fit_w, fit_h)
}

/// Shrinks `image` to fit `canvas` and pastes it centered on a white canvas.
///
/// The paste copies pixels as-is, alpha included, so the transparent area of
/// a mask stays transparent. An image that already has the canvas size comes
/// back unchanged.
pub fn normalize(image: &DynamicImage, canvas: CanvasSize) -> RgbaImage {
    let (w, h) = image.dimensions();
    let (fit_w, fit_h) = fit_dimensions((w, h), canvas);

    let rgba = image.to_rgba8();
    let content = if (fit_w, fit_h) == (w, h) {
        rgba
    } else {
        imageops::resize(&rgba, fit_w, fit_h, FilterType::Lanczos3)
    };

    let mut output = RgbaImage::from_pixel(canvas.width, canvas.height, BACKGROUND);
    let x = (canvas.width - fit_w) / 2;
    let y = (canvas.height - fit_h) / 2;
    imageops::replace(&mut output, &content, i64::from(x), i64::from(y));

    tracing::debug!(
        from = %format!("{w}x{h}"),
        content = %format!("{fit_w}x{fit_h}"),
        %canvas,
        "normalized image"
    );
    output
}

/// Decodes encoded image bytes.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| CanvasGenError::Decode(e.to_string()))
}

/// Encodes an RGBA image as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, image::ImageFormat::Png)
        .map_err(|e| CanvasGenError::Io(std::io::Error::other(e)))?;
    Ok(buf.into_inner())
}

/// Normalizes encoded image bytes and returns PNG bytes.
pub fn normalize_bytes(bytes: &[u8], canvas: CanvasSize) -> Result<Vec<u8>> {
    let image = decode(bytes)?;
    encode_png(&normalize(&image, canvas))
}

/// Normalizes the image at `input` and writes a PNG to `output`.
///
/// `output` may be the same path as `input`.
pub fn normalize_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    canvas: CanvasSize,
) -> Result<PathBuf> {
    let input = input.as_ref();
    let output = output.as_ref();

    let image = image::open(input)
        .map_err(|e| CanvasGenError::Decode(format!("{}: {e}", input.display())))?;
    let png = encode_png(&normalize(&image, canvas))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, png)?;

    tracing::debug!(input = %input.display(), output = %output.display(), "wrote normalized image");
    Ok(output.to_path_buf())
}

/// Fails with [`CanvasGenError::InputShape`] unless source and mask decode to
/// the same dimensions.
pub fn check_mask_shape(source: &[u8], mask: &[u8]) -> Result<()> {
    let image = decode(source)?.dimensions();
    let mask = decode(mask)?.dimensions();
    if image != mask {
        return Err(CanvasGenError::InputShape { image, mask });
    }
    Ok(())
}
