#![warn(missing_docs)]
//! canvasgen - generate, edit and vary images through the OpenAI Images API.
//!
//! The crate is a small pipeline: build an [`ImageRequest`], send it through
//! an [`ImageProvider`], and hand the returned [`ImageResult`] to a
//! [`ResultPersister`], which writes `<created>.png` into a folder. Local
//! inputs for edits and variations can first be fitted onto a fixed canvas
//! with [`canvas::normalize`].
//!
//! # Quick Start
//!
//! ```no_run
//! use canvasgen::{ImageProviderExt, ImageRequest, ImageSize, OpenAiImageProvider, ProviderConfig, ResultPersister};
//!
//! #[tokio::main]
//! async fn main() -> canvasgen::Result<()> {
//!     let provider = OpenAiImageProvider::new(ProviderConfig::from_env()?)?;
//!     let request = ImageRequest::generate("a red circle").with_size(ImageSize::Square1024);
//!     let result = provider.generate_one(&request).await?;
//!     let path = ResultPersister::new().persist(&result, "out").await?;
//!     println!("saved {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! # Editing with a mask
//!
//! ```no_run
//! use canvasgen::canvas::{self, CanvasSize};
//! use canvasgen::{ImageProviderExt, ImageRequest, ImageSize, OpenAiImageProvider, ProviderConfig};
//!
//! # async fn run() -> canvasgen::Result<()> {
//! let size = ImageSize::Square256;
//! let source = canvas::normalize_bytes(&std::fs::read("photo.png")?, CanvasSize::from(size))?;
//! let mask = canvas::normalize_bytes(&std::fs::read("mask.png")?, CanvasSize::from(size))?;
//!
//! let provider = OpenAiImageProvider::new(ProviderConfig::from_env()?)?;
//! let request = ImageRequest::edit(source, mask, "put a hat on it").with_size(size);
//! let edited = provider.edit_one(&request).await?;
//! println!("edited image at {}", edited.url);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `canvasgen` command-line binary.

pub mod canvas;
pub mod config;
mod error;
pub mod image;
pub mod persist;

// Re-export error types at crate root
pub use error::{CanvasGenError, ErrorKind, Result};

pub use config::ProviderConfig;
pub use image::{
    ImageBatch, ImageProvider, ImageProviderExt, ImageRequest, ImageResult, ImageSize,
    OpenAiImageModel, OpenAiImageProvider, OpenAiImageProviderBuilder, Operation,
};
pub use persist::ResultPersister;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::canvas::CanvasSize;
    pub use crate::config::ProviderConfig;
    pub use crate::error::{CanvasGenError, Result};
    pub use crate::image::{
        ImageBatch, ImageProvider, ImageProviderExt, ImageRequest, ImageResult, ImageSize,
        OpenAiImageProvider,
    };
    pub use crate::persist::ResultPersister;
}
