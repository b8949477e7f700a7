use async_trait::async_trait;
use imagegen_core::api::{
    extract_error_message, extract_image_url, reports_success, GenerateErrorKind,
    GenerateRequest, GenerateResponse, ImageGenerator,
};
use serde_json::Value;
use thiserror::Error;

const BODY_PREVIEW_LIMIT: usize = 512;
const GENERATE_PATH: &str = "/api/image/generate";

/// Why a relay call produced no usable body.
#[derive(Debug, Error)]
enum RelayError {
    #[error("relay request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("relay answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("failed to decode response body: {source} | body={preview}")]
    Decode {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RelayError {
    /// How the manager should treat this failure.
    fn generate_kind(&self) -> GenerateErrorKind {
        match self {
            Self::Transport { source, .. } if source.is_builder() => GenerateErrorKind::Config,
            Self::Transport { .. } => GenerateErrorKind::Transient,
            Self::Status { status: 400, .. } => GenerateErrorKind::InvalidRequest,
            Self::Status {
                status: 401 | 403,
                ..
            } => GenerateErrorKind::Config,
            Self::Status { status, .. } if *status == 429 || *status >= 500 => {
                GenerateErrorKind::Transient
            }
            Self::Status { .. } => GenerateErrorKind::Provider,
            Self::Decode { .. } => GenerateErrorKind::Malformed,
        }
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(BODY_PREVIEW_LIMIT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

async fn read_json_body(resp: reqwest::Response) -> Result<Value, RelayError> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|source| RelayError::Transport { url, source })?;

    if !status.is_success() {
        // The relay's own message wins when the error body is JSON.
        let message = serde_json::from_str::<Value>(&body)
            .map(|v| extract_error_message(&v))
            .unwrap_or_else(|_| preview_body(&body));
        return Err(RelayError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str::<Value>(&body).map_err(|source| RelayError::Decode {
        preview: preview_body(&body),
        source,
    })
}

/// [`ImageGenerator`] backed by the relay's `POST /api/image/generate`.
#[derive(Clone)]
pub struct HttpImageGenerator {
    http: reqwest::Client,
    url_generate: Option<String>,
}

impl HttpImageGenerator {
    /// An empty `base_url` is accepted; every call then fails as a config error.
    pub fn new(base_url: &str, timeout_ms: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        let normalized = base_url.trim().trim_end_matches('/');
        Ok(Self {
            http,
            url_generate: (!normalized.is_empty()).then(|| format!("{}{}", normalized, GENERATE_PATH)),
        })
    }

    async fn call(&self, url: &str, request: &GenerateRequest) -> Result<Value, RelayError> {
        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|source| RelayError::Transport {
                url: url.to_string(),
                source,
            })?;
        read_json_body(resp).await
    }
}

#[async_trait]
impl ImageGenerator for HttpImageGenerator {
    fn name(&self) -> &str {
        "http-relay"
    }

    async fn generate(&self, request: &GenerateRequest) -> GenerateResponse {
        if request.prompt.trim().is_empty() {
            return GenerateResponse::failed(GenerateErrorKind::InvalidRequest, "prompt is empty");
        }
        let Some(url) = self.url_generate.as_deref() else {
            return GenerateResponse::failed(GenerateErrorKind::Config, "relay base url is not configured");
        };
        if request.model.trim().is_empty() {
            return GenerateResponse::failed(GenerateErrorKind::Config, "model is not configured");
        }

        tracing::debug!(
            target: "imagegen.client",
            stage = "client.generate.in",
            url = %url,
            model = %request.model,
            prompt_len = request.prompt.len(),
            width = request.width,
            height = request.height
        );

        let body = match self.call(url, request).await {
            Ok(body) => body,
            Err(err) => {
                let kind = err.generate_kind();
                tracing::warn!(
                    target: "imagegen.client",
                    stage = "client.generate.error",
                    kind = %kind,
                    error = %err
                );
                return GenerateResponse::failed(kind, err.to_string());
            }
        };

        let response = match extract_image_url(&body, &request.model) {
            Some(image_url) => GenerateResponse::ok(image_url),
            None if reports_success(&body, &request.model) => GenerateResponse::failed(
                GenerateErrorKind::Malformed,
                "response reported success without an image url",
            ),
            None => GenerateResponse::failed(GenerateErrorKind::Provider, extract_error_message(&body)),
        };
        tracing::debug!(
            target: "imagegen.client",
            stage = "client.generate.out",
            success = response.success,
            kind = ?response.error_kind
        );
        response
    }
}
