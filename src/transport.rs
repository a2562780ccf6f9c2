use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::CompletionConfig;
use crate::error::{MosesError, Result};
use crate::models::{ChatRequest, ChatResponse};

/// Longest slice of an upstream error body carried into error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;
}

/// Chat-completions transport over HTTPS. One attempt per call; retrying is
/// left to whoever triggered the request.
pub struct HttpTransport {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(cfg: &CompletionConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = cfg.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| MosesError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(model = %req.model, endpoint = %self.endpoint, "Sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            .map_err(|e| MosesError::Network(format!("Failed to reach completion API: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return response.json::<ChatResponse>().await.map_err(|e| {
                if e.is_decode() {
                    MosesError::Upstream {
                        status: status.as_u16(),
                        message: format!("Failed to parse completion response: {e}"),
                    }
                } else {
                    MosesError::Network(format!("Failed to read completion response: {e}"))
                }
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "(unreadable body)".to_string());
        Err(map_http_error(status, &body))
    }
}

fn map_http_error(status: StatusCode, body: &str) -> MosesError {
    let safe_body = if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{truncated}…[truncated]")
    } else {
        body.to_string()
    };

    let message = match status.as_u16() {
        401 | 403 => "Unauthorized: check MOSES_API_KEY".to_string(),
        429 => "Rate limited by completion API".to_string(),
        s if s >= 500 => format!("Completion API server error: {safe_body}"),
        _ => safe_body,
    };

    MosesError::Upstream {
        status: status.as_u16(),
        message,
    }
}
