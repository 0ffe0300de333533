//! Basic image generation example.
//!
//! Run with: `cargo run --example generate_image`
//!
//! Requires `GOOGLE_API_KEY` (or `GEMINI_API_KEY`) environment variable.

use genstudio::{AspectRatio, GenerationOptions, ImageProvider, ImageSize, StudioConfig};

#[tokio::main]
async fn main() -> genstudio::Result<()> {
    let config = StudioConfig::from_env();
    let provider = config.provider(config.credential_store());

    let options = GenerationOptions::new("A golden retriever puppy playing in snow")
        .with_size(ImageSize::Size2K)
        .with_aspect_ratio(AspectRatio::Landscape);
    let payload = provider.generate(&options).await?;

    let bytes = payload.decode()?;
    std::fs::write("output.png", &bytes)?;
    println!(
        "Generated image: {} bytes, format: {}",
        bytes.len(),
        payload.mime_type
    );

    Ok(())
}
