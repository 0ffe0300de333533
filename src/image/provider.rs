//! Image provider trait.

use crate::error::Result;
use crate::image::types::{GenerationOptions, ImagePayload};
use async_trait::async_trait;

/// Trait for image generation backends.
///
/// One call is one atomic request/response: no retries, no streaming.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image for the given options.
    async fn generate(&self, options: &GenerationOptions) -> Result<ImagePayload>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}
