//! Gemini (Google) image generation provider.

use crate::error::{sanitize_error_message, GenStudioError, Result, ENTITY_NOT_FOUND};
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationOptions, ImagePayload};
use crate::keygate::CredentialStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini image model variants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical, 1K only).
    NanoBanana,
    /// Nano Banana Pro - Gemini 3 Pro Image (1K/2K/4K).
    #[default]
    NanoBananaPro,
    /// Any other model identifier.
    Custom(String),
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBananaPro => "gemini-3-pro-image-preview",
            Self::Custom(id) => id,
        }
    }

    /// Maps a model identifier onto a known variant where possible.
    pub fn from_id(id: &str) -> Self {
        match id {
            "gemini-2.5-flash-image" => Self::NanoBanana,
            "gemini-3-pro-image-preview" => Self::NanoBananaPro,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Debug, Clone, Default)]
pub struct GeminiProviderBuilder {
    credentials: Option<CredentialStore>,
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the API key from a shared store on every call.
    pub fn credentials(mut self, store: CredentialStore) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Sets a fixed API key. Ignored when a credential store is supplied.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider.
    ///
    /// A missing key is not an error here; it surfaces as
    /// [`GenStudioError::CredentialUnavailable`] when generating.
    pub fn build(self) -> GeminiProvider {
        let credentials = self
            .credentials
            .unwrap_or_else(|| CredentialStore::new(self.api_key));
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        GeminiProvider {
            credentials,
            model: self.model,
            base_url,
        }
    }
}

/// Gemini image generation provider.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    credentials: CredentialStore,
    model: GeminiModel,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> &GeminiModel {
        &self.model
    }

    async fn generate_impl(&self, options: &GenerationOptions) -> Result<ImagePayload> {
        let api_key = self
            .credentials
            .get()
            .await
            .ok_or(GenStudioError::CredentialUnavailable)?;

        // Fresh client per call: nothing carries over between requests.
        let client = reqwest::Client::new();
        let start = Instant::now();

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url,
            self.model.as_str(),
        );
        let body = GeminiRequest::from_options(options);

        tracing::debug!(
            model = self.model.as_str(),
            size = %options.size,
            aspect_ratio = %options.aspect_ratio,
            "sending Gemini image request"
        );

        let response = client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text));
        }

        let text = response.text().await?;
        let gemini_response: GeminiResponse = serde_json::from_str(&text)?;
        let payload = extract_payload(gemini_response)?;

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            mime_type = %payload.mime_type,
            duration_ms,
            "Gemini image generation complete"
        );

        Ok(payload)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn generate(&self, options: &GenerationOptions) -> Result<ImagePayload> {
        self.generate_impl(options).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }
}

/// Converts a non-success response into an error.
///
/// The Google error envelope message is classified and kept as is. Bodies
/// that are not an envelope are only trimmed for display.
fn parse_error(status: u16, text: &str) -> GenStudioError {
    let envelope_message = serde_json::from_str::<GeminiErrorEnvelope>(text)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|m| !m.trim().is_empty());

    let error = match envelope_message {
        Some(message) => GenStudioError::from_upstream_message(message),
        None if text.contains(ENTITY_NOT_FOUND) => GenStudioError::InvalidCredential,
        None => {
            let body = sanitize_error_message(text);
            if body.is_empty() {
                GenStudioError::Upstream(format!("Gemini request failed with status {status}"))
            } else {
                GenStudioError::Upstream(body)
            }
        }
    };
    tracing::warn!(
        status,
        "Gemini image generation error: {}",
        sanitize_error_message(&error.to_string())
    );
    error
}

/// Picks the image out of a successful response.
///
/// Only the first candidate is inspected; its first part carrying inline
/// data wins.
fn extract_payload(response: GeminiResponse) -> Result<ImagePayload> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_ref())
    {
        let message = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason_message.clone())
            .unwrap_or_else(|| format!("Prompt blocked: {reason}"));
        return Err(GenStudioError::Upstream(message));
    }

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.inline_data)
                .find(|inline| !inline.data.is_empty())
        })
        .map(|inline| ImagePayload::new(inline.mime_type, inline.data))
        .ok_or(GenStudioError::EmptyResult)
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

#[derive(Debug, Serialize)]
struct GeminiRequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
    image_config: GeminiImageConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageConfig {
    aspect_ratio: &'static str,
    image_size: &'static str,
}

impl GeminiRequest {
    fn from_options(options: &GenerationOptions) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiRequestPart {
                    text: options.prompt.clone(),
                }],
            }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string()],
                image_config: GeminiImageConfig {
                    aspect_ratio: options.aspect_ratio.as_str(),
                    image_size: options.size.as_str(),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::{AspectRatio, ImageSize};
    use mockito::{Matcher, Server, ServerGuard};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-3-pro-image-preview:generateContent";

    fn provider_for(server: &ServerGuard) -> GeminiProvider {
        GeminiProvider::builder()
            .api_key("test-key")
            .base_url(server.url())
            .build()
    }

    fn parse(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_gemini_model_ids() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::default().as_str(),
            "gemini-3-pro-image-preview"
        );
        assert_eq!(
            GeminiModel::from_id("gemini-3-pro-image-preview"),
            GeminiModel::NanoBananaPro
        );
        assert_eq!(GeminiModel::from_id("my-model").as_str(), "my-model");
    }

    #[test]
    fn test_builder_trims_base_url() {
        let provider = GeminiProvider::builder()
            .base_url("http://localhost:1234/")
            .build();
        assert_eq!(provider.base_url, "http://localhost:1234");
    }

    #[test]
    fn test_request_carries_image_config() {
        let options = GenerationOptions::new("A puppy")
            .with_size(ImageSize::Size2K)
            .with_aspect_ratio(AspectRatio::Landscape);
        let json = serde_json::to_value(GeminiRequest::from_options(&options)).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "A puppy");
        let config = &json["generationConfig"];
        assert_eq!(config["responseModalities"][0], "IMAGE");
        assert_eq!(config["imageConfig"]["aspectRatio"], "16:9");
        assert_eq!(config["imageConfig"]["imageSize"], "2K");
        assert!(json.get("generation_config").is_none());
    }

    #[test]
    fn test_extract_first_inline_part() {
        let resp = parse(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "Here you go"},
                            {"inlineData": {"mimeType": "image/jpeg", "data": "/9j/4AAQ"}},
                            {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }"#,
        );
        let payload = extract_payload(resp).unwrap();
        assert_eq!(payload.to_data_url(), "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[test]
    fn test_extract_defaults_mime_type() {
        let resp = parse(
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"data": "iVBORw0KGgo="}}]}}]}"#,
        );
        let payload = extract_payload(resp).unwrap();
        assert_eq!(payload.mime_type, "image/png");
    }

    #[test]
    fn test_extract_without_image_is_empty_result() {
        for json in [
            r#"{"candidates": [{"content": {"parts": [{"text": "sorry"}]}}]}"#,
            r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#,
            r#"{"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": ""}}]}}]}"#,
            r#"{"candidates": []}"#,
            r#"{}"#,
        ] {
            let err = extract_payload(parse(json)).unwrap_err();
            assert!(matches!(err, GenStudioError::EmptyResult), "{json}");
        }
    }

    #[test]
    fn test_extract_only_looks_at_first_candidate() {
        let resp = parse(
            r#"{
                "candidates": [
                    {"content": {"parts": [{"text": "no image"}]}},
                    {"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "AAAA"}}]}}
                ]
            }"#,
        );
        assert!(matches!(
            extract_payload(resp),
            Err(GenStudioError::EmptyResult)
        ));
    }

    #[test]
    fn test_extract_blocked_prompt() {
        let resp = parse(
            r#"{
                "candidates": [],
                "promptFeedback": {
                    "blockReason": "SAFETY",
                    "blockReasonMessage": "Prompt was blocked due to safety"
                }
            }"#,
        );
        let err = extract_payload(resp).unwrap_err();
        assert_eq!(err.to_string(), "Prompt was blocked due to safety");
    }

    #[test]
    fn test_parse_error_detects_unknown_entity() {
        let body = r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#;
        assert!(matches!(
            parse_error(404, body),
            GenStudioError::InvalidCredential
        ));
    }

    #[test]
    fn test_parse_error_passes_message_through() {
        let body = r#"{"error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = parse_error(429, body);
        assert_eq!(
            err.to_string(),
            "Resource has been exhausted (e.g. check quota)."
        );
    }

    #[test]
    fn test_parse_error_non_json_body() {
        assert_eq!(parse_error(502, "Bad Gateway").to_string(), "Bad Gateway");
        assert_eq!(
            parse_error(500, "").to_string(),
            "Gemini request failed with status 500"
        );
    }

    #[test]
    fn test_parse_error_keeps_envelope_message_intact() {
        let body = r#"{"error": {"code": 400, "message": "Invalid value at 'generation_config'\n  field: imageSize"}}"#;
        assert_eq!(
            parse_error(400, body).to_string(),
            "Invalid value at 'generation_config'\n  field: imageSize"
        );

        let long = format!("{} trailing", "detail ".repeat(120));
        let body = serde_json::json!({"error": {"message": long}}).to_string();
        assert_eq!(parse_error(400, &body).to_string(), long);
    }

    #[test]
    fn test_parse_error_finds_unknown_entity_past_display_limit() {
        let message = format!("{} Requested entity was not found.", "x".repeat(640));
        let body = serde_json::json!({"error": {"message": message}}).to_string();
        assert!(matches!(
            parse_error(404, &body),
            GenStudioError::InvalidCredential
        ));

        let raw = format!("{} Requested entity was not found.", "y".repeat(640));
        assert!(matches!(
            parse_error(404, &raw),
            GenStudioError::InvalidCredential
        ));
    }

    #[tokio::test]
    async fn test_generate_non_json_success_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = provider_for(&server)
            .generate(&GenerationOptions::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenStudioError::Json(_)));
        assert!(err.to_string().starts_with("JSON error:"));
    }

    #[tokio::test]
    async fn test_generate_round_trip() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [{"parts": [{"text": "a red fox in snow"}]}],
                "generationConfig": {"imageConfig": {"aspectRatio": "16:9", "imageSize": "2K"}}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}]}}]}"#,
            )
            .create_async()
            .await;

        let options = GenerationOptions::new("a red fox in snow")
            .with_size(ImageSize::Size2K)
            .with_aspect_ratio(AspectRatio::Landscape);
        let payload = provider_for(&server).generate(&options).await.unwrap();

        mock.assert_async().await;
        assert_eq!(payload.to_data_url(), "data:image/png;base64,iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn test_generate_unknown_entity() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .with_status(404)
            .with_body(r#"{"error": {"code": 404, "message": "Requested entity was not found.", "status": "NOT_FOUND"}}"#)
            .create_async()
            .await;

        let err = provider_for(&server)
            .generate(&GenerationOptions::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenStudioError::InvalidCredential));
    }

    #[tokio::test]
    async fn test_generate_without_key_makes_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .expect(0)
            .create_async()
            .await;

        let provider = GeminiProvider::builder().base_url(server.url()).build();
        let err = provider
            .generate(&GenerationOptions::new("x"))
            .await
            .unwrap_err();

        assert!(matches!(err, GenStudioError::CredentialUnavailable));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_picks_up_key_changes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_header("x-goog-api-key", "second-key")
            .with_status(200)
            .with_body(r#"{"candidates": [{"content": {"parts": [{"inlineData": {"data": "AAAA"}}]}}]}"#)
            .create_async()
            .await;

        let store = CredentialStore::new(Some("first-key".into()));
        let provider = GeminiProvider::builder()
            .credentials(store.clone())
            .base_url(server.url())
            .build();
        store.set("second-key").await;

        provider
            .generate(&GenerationOptions::new("x"))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
