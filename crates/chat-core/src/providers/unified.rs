//! Unified LLM provider using the `llm` crate.
//!
//! Wraps multiple model hosts (Ollama, Anthropic, `OpenAI`, Google, Groq,
//! Mistral) behind [`CompletionClient`]. A backend handle is built per request
//! because model and temperature travel with the request.

use async_trait::async_trait;
use llm::LLMProvider;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::{ChatMessage, ChatResponse};

use crate::error::{CompletionError, Result};
use crate::message::Role;
use crate::provider::{ChatTurn, CompletionClient, CompletionRequest};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Model host served through the `llm` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Ollama,
    OpenAi,
    Anthropic,
    Google,
    Groq,
    Mistral,
}

impl Backend {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Groq => "groq",
            Self::Mistral => "mistral",
        }
    }

    const fn to_llm(self) -> LLMBackend {
        match self {
            Self::Ollama => LLMBackend::Ollama,
            Self::OpenAi => LLMBackend::OpenAI,
            Self::Anthropic => LLMBackend::Anthropic,
            Self::Google => LLMBackend::Google,
            Self::Groq => LLMBackend::Groq,
            Self::Mistral => LLMBackend::Mistral,
        }
    }

    const fn requires_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// Unified completion client supporting multiple backends.
#[derive(Clone)]
pub struct UnifiedClient {
    backend: Backend,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl std::fmt::Debug for UnifiedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedClient")
            .field("backend", &self.backend)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UnifiedClient {
    /// Create a client for the given backend.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::ApiKeyMissing`] if a hosted backend has no key.
    pub fn new(backend: Backend, api_key: Option<String>, base_url: Option<String>) -> Result<Self> {
        let api_key = api_key.filter(|k| !k.is_empty());
        if backend.requires_key() && api_key.is_none() {
            return Err(CompletionError::ApiKeyMissing);
        }

        Ok(Self {
            backend,
            api_key,
            base_url,
        })
    }

    /// Create a client for a local Ollama instance.
    #[must_use]
    pub fn ollama(base_url: Option<String>) -> Self {
        Self {
            backend: Backend::Ollama,
            api_key: None,
            base_url: Some(base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())),
        }
    }

    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    fn build(&self, request: &CompletionRequest, system: Option<String>) -> Result<Box<dyn LLMProvider>> {
        let mut builder = LLMBuilder::new()
            .backend(self.backend.to_llm())
            .model(request.model.clone())
            .temperature(request.temperature);

        if let Some(key) = &self.api_key {
            builder = builder.api_key(key.clone());
        }

        if let Some(url) = &self.base_url {
            builder = builder.base_url(url.clone());
        }

        if let Some(system) = system {
            builder = builder.system(system);
        }

        builder
            .build()
            .map_err(|e| CompletionError::Provider(e.to_string()))
    }
}

/// Split turns into a system prompt and the user/assistant exchange.
///
/// System turns (request preamble, rolling summary) are joined in order.
fn split_turns(turns: &[ChatTurn]) -> (Option<String>, Vec<ChatMessage>) {
    let mut system = Vec::new();
    let mut messages = Vec::new();

    for turn in turns {
        match turn.role {
            Role::System => system.push(turn.content.as_str()),
            Role::User => messages.push(ChatMessage::user().content(turn.content.clone()).build()),
            Role::Assistant => {
                messages.push(ChatMessage::assistant().content(turn.content.clone()).build());
            }
        }
    }

    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, messages)
}

#[async_trait]
impl CompletionClient for UnifiedClient {
    fn name(&self) -> &'static str {
        self.backend.name()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let (system, messages) = split_turns(&request.messages);
        let provider = self.build(&request, system)?;

        let response: Box<dyn ChatResponse> = provider
            .chat(&messages)
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        response
            .text()
            .filter(|text| !text.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}
