//! Session state: options, current result, status and history.
//!
//! The session is the only place state changes. It is driven one intent at a
//! time; a generation is split into [`Session::prepare_submit`] and
//! [`Session::complete`] so a front end can keep rendering while the request
//! is in flight, and [`Session::submit`] runs both for callers that do not
//! care.

use crate::config::KeySelectionPolicy;
use crate::error::{GenStudioError, Result};
use crate::image::{
    AspectRatio, GeneratedImage, GenerationOptions, ImagePayload, ImageProvider, ImageSize,
};
use crate::keygate::KeyGate;
use std::sync::Arc;

/// Shown when the service rejects the key.
pub const INVALID_KEY_MESSAGE: &str =
    "API Key session expired or invalid. Please select a key again.";

/// Shown when a failure carries no message of its own.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong.";

/// Where the current request lifecycle stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GenerationStatus {
    /// Nothing has happened yet, or the last error was dismissed.
    #[default]
    Idle,
    /// A request is in flight.
    Generating,
    /// The last request produced an image.
    Succeeded,
    /// The last request failed with the given message.
    Failed(String),
}

impl GenerationStatus {
    /// Returns true while a request is in flight.
    pub fn is_generating(&self) -> bool {
        matches!(self, Self::Generating)
    }

    /// Returns the error from the last request, if it failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// Result of the first half of a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The prompt was empty; nothing happened.
    Ignored,
    /// A generation is already in flight.
    Busy,
    /// No key was ready, so the selection flow ran instead. Submit again.
    CredentialRequested,
    /// The session is now generating with these options.
    Ready(GenerationOptions),
}

/// Final result of a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The prompt was empty; nothing happened.
    Ignored,
    /// A generation is already in flight.
    Busy,
    /// No key was ready, so the selection flow ran instead.
    CredentialRequested,
    /// A new image is current and at the head of the history.
    Generated,
    /// The request failed; the message is in the status.
    Failed,
}

/// One user's studio session.
pub struct Session {
    provider: Arc<dyn ImageProvider>,
    gate: KeyGate,
    key_policy: KeySelectionPolicy,
    options: GenerationOptions,
    status: GenerationStatus,
    current: Option<GeneratedImage>,
    history: Vec<GeneratedImage>,
    key_ready: bool,
    checking_auth: bool,
}

impl Session {
    /// Creates a session. Call [`Session::initialize`] before first use.
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        gate: KeyGate,
        key_policy: KeySelectionPolicy,
    ) -> Self {
        Self {
            provider,
            gate,
            key_policy,
            options: GenerationOptions::default(),
            status: GenerationStatus::Idle,
            current: None,
            history: Vec::new(),
            key_ready: false,
            checking_auth: true,
        }
    }

    /// Runs the startup readiness check.
    pub async fn initialize(&mut self) -> bool {
        self.checking_auth = true;
        self.key_ready = self.gate.is_ready().await;
        self.checking_auth = false;
        tracing::debug!(key_ready = self.key_ready, "session initialized");
        self.key_ready
    }

    /// Current prompt and options.
    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Current request status.
    pub fn status(&self) -> &GenerationStatus {
        &self.status
    }

    /// Image currently on display.
    pub fn current_image(&self) -> Option<&GeneratedImage> {
        self.current.as_ref()
    }

    /// Past results, most recent first.
    pub fn history(&self) -> &[GeneratedImage] {
        &self.history
    }

    /// Whether a key is believed to be usable.
    pub fn is_key_ready(&self) -> bool {
        self.key_ready
    }

    /// Whether the startup readiness check is still running.
    pub fn is_checking_auth(&self) -> bool {
        self.checking_auth
    }

    /// Provider used for generation.
    pub fn provider(&self) -> Arc<dyn ImageProvider> {
        Arc::clone(&self.provider)
    }

    /// Whether the primary action is available.
    pub fn can_submit(&self) -> bool {
        self.options.has_prompt() && !self.status.is_generating()
    }

    /// Replaces the prompt.
    pub fn set_prompt(&mut self, prompt: impl Into<String>) -> Result<()> {
        self.ensure_idle()?;
        self.options.prompt = prompt.into();
        Ok(())
    }

    /// Selects the resolution tier.
    pub fn set_size(&mut self, size: ImageSize) -> Result<()> {
        self.ensure_idle()?;
        self.options.size = size;
        Ok(())
    }

    /// Selects the aspect ratio.
    pub fn set_aspect_ratio(&mut self, ratio: AspectRatio) -> Result<()> {
        self.ensure_idle()?;
        self.options.aspect_ratio = ratio;
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.status.is_generating() {
            return Err(GenStudioError::InvalidRequest(
                "controls are disabled while generating".into(),
            ));
        }
        Ok(())
    }

    /// Validates the prompt, consults the key gate and, when everything is in
    /// place, moves to [`GenerationStatus::Generating`].
    pub async fn prepare_submit(&mut self) -> Submission {
        if self.status.is_generating() {
            return Submission::Busy;
        }
        if !self.options.has_prompt() {
            return Submission::Ignored;
        }

        if !self.key_ready {
            if self.gate.is_ready().await {
                self.key_ready = true;
            } else {
                self.gate.request_credential().await;
                self.apply_key_policy().await;
                return Submission::CredentialRequested;
            }
        }

        self.status = GenerationStatus::Generating;
        Submission::Ready(self.options.clone())
    }

    /// Records the result of a generation started by
    /// [`Session::prepare_submit`].
    pub fn complete(
        &mut self,
        options: &GenerationOptions,
        result: Result<ImagePayload>,
    ) -> SubmitOutcome {
        match result {
            Ok(payload) => {
                let image = GeneratedImage::new(options, &payload);
                tracing::info!(id = %image.id, size = %image.size, aspect_ratio = %image.aspect_ratio, "image generated");
                self.history.insert(0, image.clone());
                self.current = Some(image);
                self.status = GenerationStatus::Succeeded;
                SubmitOutcome::Generated
            }
            Err(err) => {
                tracing::warn!("image generation failed: {err}");
                let message = if err.is_credential_error() {
                    self.key_ready = false;
                    INVALID_KEY_MESSAGE.to_string()
                } else {
                    let message = err.to_string();
                    if message.trim().is_empty() {
                        FALLBACK_ERROR_MESSAGE.to_string()
                    } else {
                        message
                    }
                };
                self.status = GenerationStatus::Failed(message);
                SubmitOutcome::Failed
            }
        }
    }

    /// Runs a whole submit: gate, request, and result bookkeeping.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let options = match self.prepare_submit().await {
            Submission::Ignored => return SubmitOutcome::Ignored,
            Submission::Busy => return SubmitOutcome::Busy,
            Submission::CredentialRequested => return SubmitOutcome::CredentialRequested,
            Submission::Ready(options) => options,
        };
        let result = self.provider.generate(&options).await;
        self.complete(&options, result)
    }

    /// Shows a past result. History and status are left untouched.
    pub fn select_history(&mut self, id: &str) -> Option<&GeneratedImage> {
        let image = self.history.iter().find(|image| image.id == id)?.clone();
        self.current = Some(image);
        self.current.as_ref()
    }

    /// Shows the past result at `index` (0 is the most recent).
    pub fn select_history_index(&mut self, index: usize) -> Option<&GeneratedImage> {
        let image = self.history.get(index)?.clone();
        self.current = Some(image);
        self.current.as_ref()
    }

    /// Runs the credential selection flow and dismisses any error.
    pub async fn select_credential(&mut self) {
        self.gate.request_credential().await;
        self.apply_key_policy().await;
        if !self.status.is_generating() {
            self.status = GenerationStatus::Idle;
        }
    }

    async fn apply_key_policy(&mut self) {
        self.key_ready = match self.key_policy {
            KeySelectionPolicy::Optimistic => true,
            KeySelectionPolicy::Verify => self.gate.is_ready().await,
        };
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("provider", &self.provider.name())
            .field("options", &self.options)
            .field("status", &self.status)
            .field("history_len", &self.history.len())
            .field("key_ready", &self.key_ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygate::{CredentialCapability, CredentialStore};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider answering from a script of canned results.
    #[derive(Default)]
    struct ScriptedProvider {
        results: Mutex<VecDeque<Result<ImagePayload>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn with(results: Vec<Result<ImagePayload>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        async fn generate(&self, _options: &GenerationOptions) -> Result<ImagePayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(png()))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Picker that records how often it was opened and optionally sets a key.
    struct Picker {
        store: CredentialStore,
        key_on_open: Option<&'static str>,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl CredentialCapability for Picker {
        async fn check(&self) -> bool {
            self.store.is_present().await
        }

        async fn request_selection(&self) {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if let Some(key) = self.key_on_open {
                self.store.set(key).await;
            }
        }
    }

    fn png() -> ImagePayload {
        ImagePayload::new(Some("image/png".into()), "iVBORw0KGgo=")
    }

    async fn ready_session(provider: Arc<ScriptedProvider>) -> Session {
        let gate = KeyGate::from_store(CredentialStore::new(Some("key".into())));
        let mut session = Session::new(provider, gate, KeySelectionPolicy::Optimistic);
        session.initialize().await;
        session
    }

    fn picker_session(
        provider: Arc<ScriptedProvider>,
        key_on_open: Option<&'static str>,
        policy: KeySelectionPolicy,
    ) -> (Session, Arc<Picker>) {
        let picker = Arc::new(Picker {
            store: CredentialStore::default(),
            key_on_open,
            opened: AtomicUsize::new(0),
        });
        let session = Session::new(provider, KeyGate::new(picker.clone()), policy);
        (session, picker)
    }

    #[tokio::test]
    async fn test_initialize_records_readiness() {
        let provider = ScriptedProvider::with(vec![]);
        let (mut session, _) = picker_session(provider, None, KeySelectionPolicy::Optimistic);
        assert!(session.is_checking_auth());

        assert!(!session.initialize().await);
        assert!(!session.is_checking_auth());
        assert!(!session.is_key_ready());
    }

    #[tokio::test]
    async fn test_successful_generation_carries_options() {
        let provider = ScriptedProvider::with(vec![Ok(png())]);
        let mut session = ready_session(provider).await;
        session.set_prompt("a red fox in snow").unwrap();
        session.set_size(ImageSize::Size2K).unwrap();
        session.set_aspect_ratio(AspectRatio::Landscape).unwrap();

        assert_eq!(session.submit().await, SubmitOutcome::Generated);

        let image = session.current_image().unwrap();
        assert_eq!(image.size, ImageSize::Size2K);
        assert_eq!(image.aspect_ratio, AspectRatio::Landscape);
        assert!(image.url.starts_with("data:image/png;base64,"));
        assert_eq!(session.status(), &GenerationStatus::Succeeded);
        assert!(session.status().error().is_none());
    }

    #[tokio::test]
    async fn test_history_is_most_recent_first() {
        let provider = ScriptedProvider::with(vec![]);
        let mut session = ready_session(provider).await;

        for i in 0..4 {
            session.set_prompt(format!("prompt {i}")).unwrap();
            assert_eq!(session.submit().await, SubmitOutcome::Generated);
        }

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].prompt, "prompt 3");
        assert_eq!(history[3].prompt, "prompt 0");
        assert_eq!(session.current_image(), Some(&history[0]));
    }

    #[tokio::test]
    async fn test_blank_prompt_never_generates() {
        let provider = ScriptedProvider::with(vec![]);
        let mut session = ready_session(provider.clone()).await;

        for prompt in ["", "   ", "\n\t "] {
            session.set_prompt(prompt).unwrap();
            assert!(!session.can_submit());
            assert_eq!(session.prepare_submit().await, Submission::Ignored);
            assert_eq!(session.status(), &GenerationStatus::Idle);
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_entity_resets_readiness() {
        let provider = ScriptedProvider::with(vec![Err(GenStudioError::from_upstream_message(
            "Requested entity was not found.",
        ))]);
        let mut session = ready_session(provider).await;
        session.set_prompt("a cat").unwrap();

        assert_eq!(session.submit().await, SubmitOutcome::Failed);
        assert!(!session.is_key_ready());
        assert_eq!(session.status().error(), Some(INVALID_KEY_MESSAGE));
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_other_failures_keep_readiness() {
        let provider = ScriptedProvider::with(vec![
            Err(GenStudioError::EmptyResult),
            Err(GenStudioError::Upstream("quota exhausted".into())),
            Err(GenStudioError::Upstream("  ".into())),
        ]);
        let mut session = ready_session(provider).await;
        session.set_prompt("a cat").unwrap();

        session.submit().await;
        assert_eq!(
            session.status().error(),
            Some("No image data found in response")
        );
        session.submit().await;
        assert_eq!(session.status().error(), Some("quota exhausted"));
        session.submit().await;
        assert_eq!(session.status().error(), Some(FALLBACK_ERROR_MESSAGE));
        assert!(session.is_key_ready());
    }

    #[tokio::test]
    async fn test_submit_clears_previous_error() {
        let provider = ScriptedProvider::with(vec![Err(GenStudioError::EmptyResult), Ok(png())]);
        let mut session = ready_session(provider).await;
        session.set_prompt("a cat").unwrap();

        session.submit().await;
        assert!(session.status().error().is_some());

        let options = match session.prepare_submit().await {
            Submission::Ready(options) => options,
            other => panic!("expected Ready, got {other:?}"),
        };
        assert_eq!(session.status(), &GenerationStatus::Generating);
        assert!(session.status().error().is_none());

        session.complete(&options, Ok(png()));
        assert_eq!(session.status(), &GenerationStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_controls_locked_while_generating() {
        let provider = ScriptedProvider::with(vec![]);
        let mut session = ready_session(provider).await;
        session.set_prompt("a cat").unwrap();

        let options = match session.prepare_submit().await {
            Submission::Ready(options) => options,
            other => panic!("expected Ready, got {other:?}"),
        };
        assert!(!session.can_submit());
        assert!(session.set_prompt("a dog").is_err());
        assert!(session.set_size(ImageSize::Size4K).is_err());
        assert!(session.set_aspect_ratio(AspectRatio::Portrait).is_err());
        assert_eq!(session.prepare_submit().await, Submission::Busy);

        session.complete(&options, Ok(png()));
        assert_eq!(session.current_image().unwrap().prompt, "a cat");
        assert!(session.set_prompt("a dog").is_ok());
    }

    #[tokio::test]
    async fn test_not_ready_requests_credential_and_aborts() {
        let provider = ScriptedProvider::with(vec![]);
        let (mut session, picker) =
            picker_session(provider.clone(), None, KeySelectionPolicy::Optimistic);
        session.initialize().await;
        session.set_prompt("a cat").unwrap();

        assert_eq!(session.submit().await, SubmitOutcome::CredentialRequested);
        assert_eq!(picker.opened.load(Ordering::SeqCst), 1);
        assert_eq!(provider.calls(), 0);
        assert_eq!(session.status(), &GenerationStatus::Idle);
        // Optimistic: assumed ready even though nothing was picked.
        assert!(session.is_key_ready());
    }

    #[tokio::test]
    async fn test_verify_policy_rechecks_gate() {
        let provider = ScriptedProvider::with(vec![]);
        let (mut session, _) = picker_session(provider, None, KeySelectionPolicy::Verify);
        session.initialize().await;
        session.set_prompt("a cat").unwrap();

        assert_eq!(session.submit().await, SubmitOutcome::CredentialRequested);
        assert!(!session.is_key_ready());

        let provider = ScriptedProvider::with(vec![]);
        let (mut session, _) =
            picker_session(provider, Some("picked"), KeySelectionPolicy::Verify);
        session.initialize().await;
        session.set_prompt("a cat").unwrap();

        assert_eq!(session.submit().await, SubmitOutcome::CredentialRequested);
        assert!(session.is_key_ready());
        assert_eq!(session.submit().await, SubmitOutcome::Generated);
    }

    #[tokio::test]
    async fn test_gate_ready_on_recheck_proceeds() {
        let provider = ScriptedProvider::with(vec![]);
        let (mut session, picker) =
            picker_session(provider, None, KeySelectionPolicy::Optimistic);
        session.initialize().await;
        picker.store.set("late-key").await;
        session.set_prompt("a cat").unwrap();

        assert_eq!(session.submit().await, SubmitOutcome::Generated);
        assert_eq!(picker.opened.load(Ordering::SeqCst), 0);
        assert!(session.is_key_ready());
    }

    #[tokio::test]
    async fn test_select_history_keeps_order_and_status() {
        let provider = ScriptedProvider::with(vec![]);
        let mut session = ready_session(provider).await;
        for prompt in ["first", "second", "third"] {
            session.set_prompt(prompt).unwrap();
            session.submit().await;
        }
        let before: Vec<String> = session.history().iter().map(|i| i.id.clone()).collect();
        let oldest = before[2].clone();

        let selected = session.select_history(&oldest).unwrap();
        assert_eq!(selected.prompt, "first");
        assert_eq!(session.current_image().unwrap().id, oldest);

        let after: Vec<String> = session.history().iter().map(|i| i.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(session.status(), &GenerationStatus::Succeeded);

        assert_eq!(session.select_history_index(1).unwrap().prompt, "second");
        assert!(session.select_history_index(3).is_none());
        assert!(session.select_history("missing").is_none());
        assert_eq!(session.current_image().unwrap().prompt, "second");
    }

    #[tokio::test]
    async fn test_select_credential_clears_error() {
        let provider = ScriptedProvider::with(vec![Err(GenStudioError::InvalidCredential)]);
        let (mut session, picker) =
            picker_session(provider, Some("fresh"), KeySelectionPolicy::Optimistic);
        picker.store.set("stale").await;
        session.initialize().await;
        session.set_prompt("a cat").unwrap();

        session.submit().await;
        assert!(!session.is_key_ready());
        assert_eq!(session.status().error(), Some(INVALID_KEY_MESSAGE));

        session.select_credential().await;
        assert!(session.is_key_ready());
        assert_eq!(session.status(), &GenerationStatus::Idle);
        assert_eq!(picker.store.get().await.as_deref(), Some("fresh"));
    }
}
