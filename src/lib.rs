#![warn(missing_docs)]
//! GenStudio - prompt-to-image studio for Gemini image models.
//!
//! The crate wraps a single Gemini `generateContent` call in the state a
//! small studio needs: a credential gate, a session with a current image and
//! a most-recent-first history, and a terminal front end.
//!
//! # Quick Start
//!
//! ```no_run
//! use genstudio::{GeminiProvider, GenerationOptions, ImageProvider, ImageSize, AspectRatio};
//!
//! #[tokio::main]
//! async fn main() -> genstudio::Result<()> {
//!     let provider = GeminiProvider::builder().api_key("my-key").build();
//!     let options = GenerationOptions::new("A golden retriever puppy")
//!         .with_size(ImageSize::Size2K)
//!         .with_aspect_ratio(AspectRatio::Landscape);
//!     let payload = provider.generate(&options).await?;
//!     std::fs::write("puppy.png", payload.decode()?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Sessions
//!
//! ```no_run
//! use std::sync::Arc;
//! use genstudio::{KeyGate, Session, StudioConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = StudioConfig::from_env();
//!     let store = config.credential_store();
//!     let provider = Arc::new(config.provider(store.clone()));
//!     let mut session = Session::new(provider, KeyGate::from_store(store), config.key_policy);
//!     session.initialize().await;
//!     session.set_prompt("a red fox in snow").unwrap();
//!     session.submit().await;
//!     println!("{:?}", session.status());
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `genstudio` binary (clap, anyhow, tracing-subscriber)

pub mod config;
pub mod download;
mod error;
pub mod image;
pub mod keygate;
pub mod session;
pub mod ui;

// Re-export error types at crate root
pub use error::{GenStudioError, Result, ENTITY_NOT_FOUND};

pub use config::{KeySelectionPolicy, StudioConfig, StudioConfigBuilder};
pub use image::providers::{GeminiModel, GeminiProvider, GeminiProviderBuilder};
pub use image::{
    AspectRatio, GeneratedImage, GenerationOptions, ImagePayload, ImageProvider, ImageSize,
};
pub use keygate::{CredentialCapability, CredentialStore, KeyGate, StaticCredential};
pub use session::{GenerationStatus, Session, SubmitOutcome, Submission};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{GenStudioError, Result};
    pub use crate::image::providers::GeminiProvider;
    pub use crate::image::{
        AspectRatio, GeneratedImage, GenerationOptions, ImagePayload, ImageProvider, ImageSize,
    };
    pub use crate::keygate::{CredentialStore, KeyGate};
    pub use crate::session::{GenerationStatus, Session, SubmitOutcome};
}
