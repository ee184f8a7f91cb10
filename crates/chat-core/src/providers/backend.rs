//! Authoring backend provider.
//!
//! Talks to the backend's `/ai/chat` endpoint, which proxies to the local model
//! host and answers with a `{success, response, error}` envelope.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{CompletionError, Result};
use crate::provider::{ChatTurn, CompletionClient, CompletionRequest, CompletionResponse};

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Completion client for the authoring backend's REST API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendClient {
    /// Create a client for the default local backend.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client for a backend at a custom base URL.
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/ai/chat", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    messages: &'a [ChatTurn],
    model: &'a str,
    temperature: f32,
}

#[async_trait]
impl CompletionClient for BackendClient {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let payload = ChatPayload {
            messages: &request.messages,
            model: &request.model,
            temperature: request.temperature,
        };

        tracing::debug!(
            url = %self.chat_url(),
            model = %request.model,
            turns = request.messages.len(),
            "sending chat request to backend"
        );

        let response = self
            .http
            .post(self.chat_url())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: CompletionResponse = response.json().await?;
        envelope.into_result()
    }
}
