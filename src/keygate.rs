//! Credential readiness gate.
//!
//! The gate answers one question, "can a generation proceed without asking
//! for a key?", and exposes one action, "ask the user for a key". Where the
//! key comes from is up to the injected [`CredentialCapability`]: a host
//! picker, a terminal prompt, or just the statically configured key.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared slot holding the active API key.
///
/// The generation client reads it on every call, so a key written here by a
/// selection flow is used by the very next request.
#[derive(Clone, Default)]
pub struct CredentialStore {
    key: Arc<RwLock<Option<String>>>,
}

impl CredentialStore {
    /// Creates a store seeded with the given key. Blank keys count as absent.
    pub fn new(key: Option<String>) -> Self {
        Self {
            key: Arc::new(RwLock::new(normalize(key))),
        }
    }

    /// Returns the current key, if any.
    pub async fn get(&self) -> Option<String> {
        self.key.read().await.clone()
    }

    /// Replaces the current key. A blank key clears the store.
    pub async fn set(&self, key: impl Into<String>) {
        *self.key.write().await = normalize(Some(key.into()));
    }

    /// Removes the current key.
    pub async fn clear(&self) {
        *self.key.write().await = None;
    }

    /// Returns true if a key is present.
    pub async fn is_present(&self) -> bool {
        self.key.read().await.is_some()
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("key", &"<redacted>")
            .finish()
    }
}

fn normalize(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

/// A source of credentials the gate can query and ask for a new key.
#[async_trait]
pub trait CredentialCapability: Send + Sync {
    /// Returns true if a usable credential is currently selected.
    async fn check(&self) -> bool;

    /// Runs the credential selection flow.
    ///
    /// Completion says nothing about success; callers re-check or assume.
    async fn request_selection(&self);
}

/// Capability backed only by the statically configured key.
///
/// Used when the host offers no picker: readiness is key presence and
/// selection does nothing.
#[derive(Debug, Clone)]
pub struct StaticCredential {
    store: CredentialStore,
}

impl StaticCredential {
    /// Creates a capability reading from the given store.
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialCapability for StaticCredential {
    async fn check(&self) -> bool {
        self.store.is_present().await
    }

    async fn request_selection(&self) {
        tracing::debug!("no credential picker available; selection is a no-op");
    }
}

/// Gate deciding whether generation may proceed.
#[derive(Clone)]
pub struct KeyGate {
    capability: Arc<dyn CredentialCapability>,
}

impl KeyGate {
    /// Creates a gate over the given capability.
    pub fn new(capability: Arc<dyn CredentialCapability>) -> Self {
        Self { capability }
    }

    /// Creates a gate that only checks the configured key.
    pub fn from_store(store: CredentialStore) -> Self {
        Self::new(Arc::new(StaticCredential::new(store)))
    }

    /// Returns true if a usable credential is configured.
    pub async fn is_ready(&self) -> bool {
        let ready = self.capability.check().await;
        tracing::debug!(ready, "checked credential readiness");
        ready
    }

    /// Triggers the credential selection flow.
    pub async fn request_credential(&self) {
        tracing::info!("requesting credential selection");
        self.capability.request_selection().await;
    }
}

impl fmt::Debug for KeyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGate").finish_non_exhaustive()
    }
}
