//! Configuration management for Loresmith.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chat_core::providers::{Backend, BackendClient, UnifiedClient};
use chat_core::{CompletionClient, SessionSettings, WindowPolicy};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chat session settings.
    pub chat: ChatConfig,

    /// Completion provider.
    pub provider: ProviderConfig,

    /// API configuration.
    pub api: ApiConfig,

    /// Storage location.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// Loads global config first, then merges project-local config if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read, parsed or
    /// fails validation.
    pub fn load() -> anyhow::Result<Self> {
        let project_path = Self::project_config_path().ok();
        Self::load_from(&Self::config_path()?, project_path.as_deref())
    }

    /// Load configuration from explicit paths. Missing files are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, parsed or fails validation.
    pub fn load_from(global_path: &Path, project_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = if global_path.exists() {
            let contents = std::fs::read_to_string(global_path)?;
            toml::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Some(project_path) = project_path.filter(|p| p.exists()) {
            let contents = std::fs::read_to_string(project_path)?;
            let project_config: Self = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the project-local configuration file path.
    ///
    /// Looks for `.loresmith/config.toml` in the current directory.
    pub fn project_config_path() -> anyhow::Result<PathBuf> {
        let cwd = std::env::current_dir()?;
        Ok(cwd.join(".loresmith").join("config.toml"))
    }

    /// Merge another config into this one (project overrides global).
    fn merge(&mut self, other: Self) {
        let chat = ChatConfig::default();
        if other.chat.model != chat.model {
            self.chat.model = other.chat.model;
        }
        if other.chat.temperature.to_bits() != chat.temperature.to_bits() {
            self.chat.temperature = other.chat.temperature;
        }
        if other.chat.summary_temperature.to_bits() != chat.summary_temperature.to_bits() {
            self.chat.summary_temperature = other.chat.summary_temperature;
        }
        if other.chat.artifact_temperature.to_bits() != chat.artifact_temperature.to_bits() {
            self.chat.artifact_temperature = other.chat.artifact_temperature;
        }
        if other.chat.window_limit != chat.window_limit {
            self.chat.window_limit = other.chat.window_limit;
        }
        if other.chat.compression != chat.compression {
            self.chat.compression = other.chat.compression;
        }

        if other.provider != ProviderConfig::default() {
            self.provider = other.provider;
        }

        // API config overrides
        if other.api.port != ApiConfig::default().port {
            self.api.port = other.api.port;
        }
        if other.api.host != ApiConfig::default().host {
            self.api.host = other.api.host;
        }

        if other.storage.dir.is_some() {
            self.storage.dir = other.storage.dir;
        }
    }

    /// Check values the rest of the program relies on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.chat.window_limit < chat_core::window::MIN_WINDOW_LIMIT {
            return Err(Error::Config(format!(
                "chat.window_limit must be at least {}, got {}",
                chat_core::window::MIN_WINDOW_LIMIT,
                self.chat.window_limit
            )));
        }

        for (name, value) in [
            ("chat.temperature", self.chat.temperature),
            ("chat.summary_temperature", self.chat.summary_temperature),
            ("chat.artifact_temperature", self.chat.artifact_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be between 0.0 and 2.0, got {value}"
                )));
            }
        }

        if self.chat.model.trim().is_empty() {
            return Err(Error::Config("chat.model must not be empty".to_string()));
        }

        Ok(())
    }

    /// Get the configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the config directory path (`~/.config/loresmith/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg_config_home).join("loresmith"));
        }

        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

        Ok(base.config_dir().join("loresmith"))
    }

    /// Get the data directory path (`~/.local/share/loresmith/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined.
    pub fn data_dir() -> anyhow::Result<PathBuf> {
        let base = directories::BaseDirs::new()
            .ok_or_else(|| anyhow::anyhow!("could not determine data directory"))?;

        Ok(base.data_dir().join("loresmith"))
    }

    /// Directory holding saved chat histories.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the data directory cannot
    /// be determined.
    pub fn storage_dir(&self) -> anyhow::Result<PathBuf> {
        match &self.storage.dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("storage")),
        }
    }
}

/// Chat session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model identifier sent with every request.
    pub model: String,

    /// Temperature for conversation turns.
    pub temperature: f32,

    /// Temperature for rolling summaries.
    pub summary_temperature: f32,

    /// Temperature for artifacts.
    pub artifact_temperature: f32,

    /// Context entries kept before the oldest are summarized.
    pub window_limit: usize,

    /// Summarize old turns at all.
    pub compression: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        let settings = SessionSettings::default();
        Self {
            model: settings.model,
            temperature: settings.temperature,
            summary_temperature: settings.summary_temperature,
            artifact_temperature: settings.artifact_temperature,
            window_limit: 10,
            compression: true,
        }
    }
}

impl ChatConfig {
    /// Settings for a new session.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            model: self.model.clone(),
            temperature: self.temperature,
            summary_temperature: self.summary_temperature,
            artifact_temperature: self.artifact_temperature,
            window: if self.compression {
                WindowPolicy::new(self.window_limit)
            } else {
                WindowPolicy::disabled()
            },
        }
    }
}

/// Which completion service to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Authoring backend `/ai/chat` endpoint.
    Backend,
    /// Local Ollama server.
    #[default]
    Ollama,
    /// `OpenAI` Chat Completions API (also used by compatible providers)
    OpenAi,
    /// Anthropic Messages API
    Anthropic,
    /// Google Gemini API
    Google,
    /// Groq API
    Groq,
    /// Mistral API
    Mistral,
}

impl ProviderKind {
    const fn backend(self) -> Option<Backend> {
        match self {
            Self::Backend => None,
            Self::Ollama => Some(Backend::Ollama),
            Self::OpenAi => Some(Backend::OpenAi),
            Self::Anthropic => Some(Backend::Anthropic),
            Self::Google => Some(Backend::Google),
            Self::Groq => Some(Backend::Groq),
            Self::Mistral => Some(Backend::Mistral),
        }
    }

    /// Environment variable read for the API key when none is configured.
    #[must_use]
    pub const fn default_key_env(self) -> Option<&'static str> {
        match self {
            Self::Backend | Self::Ollama => None,
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Google => Some("GEMINI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Mistral => Some("MISTRAL_API_KEY"),
        }
    }
}

/// Completion provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from the configured or default environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_key_env())
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }

    /// Create the configured completion client.
    ///
    /// # Errors
    ///
    /// Returns error if a hosted provider has no API key.
    pub fn create_client(&self) -> anyhow::Result<Arc<dyn CompletionClient>> {
        let Some(backend) = self.kind.backend() else {
            let client = self
                .base_url
                .as_ref()
                .map_or_else(BackendClient::new, BackendClient::with_base_url);
            return Ok(Arc::new(client));
        };

        if backend == Backend::Ollama {
            return Ok(Arc::new(UnifiedClient::ollama(self.base_url.clone())));
        }

        let client = UnifiedClient::new(backend, self.api_key(), self.base_url.clone())
            .map_err(|e| {
                let env = self
                    .api_key_env
                    .as_deref()
                    .or_else(|| self.kind.default_key_env())
                    .unwrap_or("the provider's API key variable");
                anyhow::anyhow!(
                    "{e} for provider '{}'.\n\nSet {env} or configure [provider] api_key_env.",
                    backend.name()
                )
            })?;

        Ok(Arc::new(client))
    }
}

/// API server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to bind to.
    pub port: u16,

    /// API token for authentication (optional, but required for remote access).
    /// Can also be set via `LORESMITH_API_TOKEN` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7890,
            token: None,
        }
    }
}

impl ApiConfig {
    /// Get the API token, preferring env var over config file.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var("LORESMITH_API_TOKEN")
            .ok()
            .or_else(|| self.token.clone())
    }

    /// Generate a new random API token.
    #[must_use]
    pub fn generate_token() -> String {
        use rand::Rng;
        let mut rng = rand::rng();
        let bytes: [u8; 32] = rng.random();
        format!("lore_{}", hex::encode(bytes))
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Override for the history directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}
