//! Core types for image generation.

use crate::error::{GenStudioError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MIME type assumed when the service omits one.
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Output resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    /// Roughly 1024px on the long edge.
    #[default]
    #[serde(rename = "1K")]
    Size1K,
    /// Roughly 2048px on the long edge.
    #[serde(rename = "2K")]
    Size2K,
    /// Roughly 4096px on the long edge.
    #[serde(rename = "4K")]
    Size4K,
}

impl ImageSize {
    /// All sizes, in picker order.
    pub const ALL: [ImageSize; 3] = [Self::Size1K, Self::Size2K, Self::Size4K];

    /// Returns the size as the API spells it (e.g., "2K").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Size1K => "1K",
            Self::Size2K => "2K",
            Self::Size4K => "4K",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                GenStudioError::InvalidRequest(format!("unknown size '{s}' (expected 1K, 2K or 4K)"))
            })
    }
}

/// Supported aspect ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 1:1 square aspect ratio.
    #[default]
    #[serde(rename = "1:1")]
    Square,
    /// 16:9 landscape (widescreen) aspect ratio.
    #[serde(rename = "16:9")]
    Landscape,
    /// 9:16 portrait (tall) aspect ratio.
    #[serde(rename = "9:16")]
    Portrait,
    /// 4:3 standard landscape aspect ratio.
    #[serde(rename = "4:3")]
    Standard,
    /// 3:4 standard portrait aspect ratio.
    #[serde(rename = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    /// All ratios, in picker order.
    pub const ALL: [AspectRatio; 5] = [
        Self::Square,
        Self::Portrait,
        Self::Landscape,
        Self::StandardPortrait,
        Self::Standard,
    ];

    /// Returns the aspect ratio as a string (e.g., "16:9").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1:1",
            Self::Landscape => "16:9",
            Self::Portrait => "9:16",
            Self::Standard => "4:3",
            Self::StandardPortrait => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = GenStudioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| {
                GenStudioError::InvalidRequest(format!(
                    "unknown aspect ratio '{s}' (expected 1:1, 16:9, 9:16, 4:3 or 3:4)"
                ))
            })
    }
}

/// What to generate: the prompt plus output shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    /// The text prompt describing the desired image.
    pub prompt: String,
    /// Output resolution tier.
    pub size: ImageSize,
    /// Output aspect ratio.
    pub aspect_ratio: AspectRatio,
}

impl GenerationOptions {
    /// Creates options with the given prompt and default size and ratio.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Sets the resolution tier.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Sets the aspect ratio.
    pub fn with_aspect_ratio(mut self, ratio: AspectRatio) -> Self {
        self.aspect_ratio = ratio;
        self
    }

    /// Returns true if the prompt has any non-whitespace content.
    pub fn has_prompt(&self) -> bool {
        !self.prompt.trim().is_empty()
    }
}

/// Inline image data as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type of the image (e.g., "image/png").
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl ImagePayload {
    /// Creates a payload, defaulting the MIME type when absent or blank.
    pub fn new(mime_type: Option<String>, data: impl Into<String>) -> Self {
        let mime_type = mime_type
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        Self {
            mime_type,
            data: data.into(),
        }
    }

    /// Returns the payload as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decodes the base64 data into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        decode_base64(&self.data)
    }

    /// Parses a `data:<mime>;base64,<data>` URL back into a payload.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| GenStudioError::Decode("not a data URL".into()))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| GenStudioError::Decode("data URL is not base64".into()))?;
        Ok(Self::new(Some(mime_type.to_string()), data))
    }
}

/// Decodes base64, tolerating embedded whitespace and missing padding.
fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .map_err(|e| GenStudioError::Decode(e.to_string()))
}

/// A generated image together with the options that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// Unique identifier.
    pub id: String,
    /// The image as a data URL.
    pub url: String,
    /// Prompt that produced the image.
    pub prompt: String,
    /// Requested resolution tier.
    pub size: ImageSize,
    /// Requested aspect ratio.
    pub aspect_ratio: AspectRatio,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl GeneratedImage {
    /// Records a successful generation, stamping it with a fresh id and the
    /// current time.
    pub fn new(options: &GenerationOptions, payload: &ImagePayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: payload.to_data_url(),
            prompt: options.prompt.clone(),
            size: options.size,
            aspect_ratio: options.aspect_ratio,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Returns the image data embedded in the URL.
    pub fn payload(&self) -> Result<ImagePayload> {
        ImagePayload::from_data_url(&self.url)
    }

    /// Returns the MIME type embedded in the URL, if it parses.
    pub fn mime_type(&self) -> Option<&str> {
        self.url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .map(|(mime, _)| mime)
    }
}
