//! Image generation client abstraction.
//!
//! The manager only sees [`ImageGenerator`]; the HTTP relay implementation
//! lives in the plugins crate.

mod response;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::task::Dimensions;

pub use response::{extract_error_message, extract_image_url, reports_success, DEFAULT_ERROR_MESSAGE};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "jimeng";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            width: dimensions.width,
            height: dimensions.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerateErrorKind {
    /// Missing endpoint or model, or the relay rejected our credentials.
    Config,
    /// Empty prompt or a request the relay refused as invalid.
    InvalidRequest,
    /// Timeout, connection failure, 5xx or 429.
    Transient,
    /// Body that is not JSON, or a success without an image URL.
    Malformed,
    /// The provider reported a failure.
    Provider,
}

impl GenerateErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::InvalidRequest => "invalid_request",
            Self::Transient => "transient",
            Self::Malformed => "malformed",
            Self::Provider => "provider",
        }
    }

    pub fn is_retryable(self) -> bool {
        match self {
            Self::Config | Self::InvalidRequest => false,
            Self::Transient | Self::Malformed | Self::Provider => true,
        }
    }
}

impl fmt::Display for GenerateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<GenerateErrorKind>,
}

impl GenerateResponse {
    pub fn ok(image_url: impl Into<String>) -> Self {
        Self {
            success: true,
            image_url: Some(image_url.into()),
            error: None,
            error_kind: None,
        }
    }

    pub fn failed(kind: GenerateErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            image_url: None,
            error: Some(error.into()),
            error_kind: Some(kind),
        }
    }

    /// The URL of a successful response.
    pub fn url(&self) -> Option<&str> {
        if self.success {
            self.image_url.as_deref()
        } else {
            None
        }
    }

    pub fn is_retryable(&self) -> bool {
        !self.success && self.error_kind.is_some_and(GenerateErrorKind::is_retryable)
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or(DEFAULT_ERROR_MESSAGE)
    }
}

/// Issues one image generation call. Failures are reported in the response,
/// never as an error.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, request: &GenerateRequest) -> GenerateResponse;
}
