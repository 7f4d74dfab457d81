//! Image requests, results and the provider abstraction.

mod provider;
pub mod providers;
mod types;

pub use provider::{ImageProvider, ImageProviderExt};
pub use providers::{OpenAiImageModel, OpenAiImageProvider, OpenAiImageProviderBuilder};
pub use types::{
    read_image_file, ImageBatch, ImageFormat, ImageRequest, ImageResult, ImageSize, Operation,
    MAX_COUNT,
};
