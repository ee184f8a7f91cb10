//! Completion provider abstraction.
//!
//! The session controller and the summarizer both talk to the model through
//! [`CompletionClient`]; concrete backends live in [`crate::providers`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CompletionError, Result};
use crate::message::{Message, Role};

/// One `{role, content}` pair sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self::new(message.role(), message.content())
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Ordered conversation turns.
    pub messages: Vec<ChatTurn>,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
}

/// Response envelope used by the authoring backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionResponse {
    /// Convert the envelope into the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Rejected`] when `success` is false.
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.response.unwrap_or_default())
        } else {
            Err(CompletionError::Rejected(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Trait for completion backends.
///
/// Implement this trait to add support for a new model host.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Run a non-streaming completion and return the reply text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }
}

#[async_trait]
impl<T: CompletionClient + ?Sized> CompletionClient for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_yields_text() {
        let json = r#"{"success": true, "response": "Hello", "error": null}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_result().unwrap(), "Hello");
    }

    #[test]
    fn failure_envelope_yields_error() {
        let json = r#"{"success": false, "response": "", "error": "HTTP 500"}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        let err = response.into_result().unwrap_err();
        assert!(matches!(err, CompletionError::Rejected(ref m) if m == "HTTP 500"));
    }

    #[test]
    fn turn_serializes_lowercase_role() {
        let turn = ChatTurn::from(&Message::summary("digest", 4));
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"digest"}"#);
    }
}
