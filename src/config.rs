//! Startup configuration.
//!
//! Everything the studio needs from its environment is resolved once here
//! and handed to the components that use it, so nothing below reads
//! environment variables on its own.

use crate::error::{GenStudioError, Result};
use crate::image::providers::{GeminiModel, GeminiProvider, DEFAULT_BASE_URL};
use crate::keygate::CredentialStore;
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variables consulted for the API key, in priority order.
pub const API_KEY_ENV_VARS: [&str; 3] = ["GOOGLE_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Environment variable overriding the model id.
pub const MODEL_ENV_VAR: &str = "GENSTUDIO_MODEL";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV_VAR: &str = "GENSTUDIO_BASE_URL";

/// What the session assumes after running the credential selection flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySelectionPolicy {
    /// Assume a key was selected; a bad guess shows up on the next call.
    #[default]
    Optimistic,
    /// Ask the gate again and trust its answer.
    Verify,
}

impl FromStr for KeySelectionPolicy {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(Self::Optimistic),
            "verify" => Ok(Self::Verify),
            other => Err(GenStudioError::InvalidRequest(format!(
                "unknown key selection policy '{other}' (expected optimistic or verify)"
            ))),
        }
    }
}

/// Resolved studio configuration.
#[derive(Clone)]
pub struct StudioConfig {
    /// Statically configured API key.
    pub api_key: Option<String>,
    /// Image model to call.
    pub model: GeminiModel,
    /// API base URL.
    pub base_url: String,
    /// Directory downloads are written to.
    pub download_dir: PathBuf,
    /// Readiness assumption after credential selection.
    pub key_policy: KeySelectionPolicy,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: GeminiModel::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            download_dir: PathBuf::from("."),
            key_policy: KeySelectionPolicy::default(),
        }
    }
}

impl std::fmt::Debug for StudioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("download_dir", &self.download_dir)
            .field("key_policy", &self.key_policy)
            .finish()
    }
}

impl StudioConfig {
    /// Creates a new `StudioConfigBuilder`.
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder::default()
    }

    /// Resolves configuration from the process environment alone.
    pub fn from_env() -> Self {
        Self::builder().build()
    }

    /// Creates a credential store seeded with the configured key.
    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.api_key.clone())
    }

    /// Creates a Gemini client reading its key from `store`.
    pub fn provider(&self, store: CredentialStore) -> GeminiProvider {
        GeminiProvider::builder()
            .credentials(store)
            .model(self.model.clone())
            .base_url(self.base_url.clone())
            .build()
    }
}

/// Builder for [`StudioConfig`]. Unset fields fall back to the environment,
/// then to defaults.
#[derive(Debug, Clone, Default)]
pub struct StudioConfigBuilder {
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    download_dir: Option<PathBuf>,
    key_policy: Option<KeySelectionPolicy>,
}

impl StudioConfigBuilder {
    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, `GEMINI_API_KEY`,
    /// then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model id. Falls back to `GENSTUDIO_MODEL`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API base URL. Falls back to `GENSTUDIO_BASE_URL`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the download directory.
    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Sets the key selection policy.
    pub fn key_policy(mut self, policy: KeySelectionPolicy) -> Self {
        self.key_policy = Some(policy);
        self
    }

    /// Builds the configuration using the process environment for fallbacks.
    pub fn build(self) -> StudioConfig {
        self.build_with(|name| std::env::var(name).ok())
    }

    /// Builds the configuration with a custom environment lookup.
    pub fn build_with(self, env: impl Fn(&str) -> Option<String>) -> StudioConfig {
        let non_empty = |v: String| Some(v).filter(|v| !v.trim().is_empty());
        let defaults = StudioConfig::default();

        let api_key = self.api_key.and_then(non_empty).or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .find_map(|&name| env(name).and_then(non_empty))
        });
        let model = self
            .model
            .or_else(|| env(MODEL_ENV_VAR))
            .and_then(non_empty)
            .map(|id| GeminiModel::from_id(id.trim()))
            .unwrap_or(defaults.model);
        let base_url = self
            .base_url
            .or_else(|| env(BASE_URL_ENV_VAR))
            .and_then(non_empty)
            .unwrap_or(defaults.base_url);

        StudioConfig {
            api_key,
            model,
            base_url,
            download_dir: self.download_dir.unwrap_or(defaults.download_dir),
            key_policy: self.key_policy.unwrap_or(defaults.key_policy),
        }
    }
}
