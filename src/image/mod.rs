//! Image generation module.

mod provider;
pub mod providers;
mod types;

pub use provider::ImageProvider;
pub use types::{
    AspectRatio, GeneratedImage, GenerationOptions, ImagePayload, ImageSize, DEFAULT_MIME_TYPE,
};
