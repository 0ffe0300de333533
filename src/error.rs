//! Error types for image generation and the studio session.

/// Substring the Gemini API uses when the selected key (or the project
/// behind it) is not recognized.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Longest upstream error body carried into an error message.
const MAX_ERROR_LEN: usize = 500;

/// Errors that can occur while generating an image.
#[derive(Debug, thiserror::Error)]
pub enum GenStudioError {
    /// No credential is configured.
    #[error("no API key configured")]
    CredentialUnavailable,

    /// The service did not recognize the credential.
    #[error("API key invalid or not recognized")]
    InvalidCredential,

    /// The service answered but returned no image part.
    #[error("No image data found in response")]
    EmptyResult,

    /// Any other failure reported by the service, message passed through.
    #[error("{0}")]
    Upstream(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenStudioError {
    /// Classifies an upstream error message.
    ///
    /// Messages naming an unknown entity mean the key was rejected; anything
    /// else is carried verbatim.
    pub fn from_upstream_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(ENTITY_NOT_FOUND) {
            Self::InvalidCredential
        } else {
            Self::Upstream(message)
        }
    }

    /// Returns true if the error means the key must be selected again.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::InvalidCredential | Self::CredentialUnavailable)
    }
}

/// Trims an upstream error body to something fit for display.
///
/// Collapses whitespace and caps the length so a stray HTML error page does
/// not flood the terminal.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= MAX_ERROR_LEN {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(MAX_ERROR_LEN).collect();
    truncated.push('…');
    truncated
}

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, GenStudioError>;
