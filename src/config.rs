use crate::llm::CompletionSettings;
use crate::prompts::{DEFAULT_ASSISTANT_NAME, DEFAULT_SYSTEM_PROMPT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the completion API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main application configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the completion service (the environment takes precedence)
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API, without `/chat/completions`
    pub base_url: String,

    /// Model to request completions from
    pub model: String,

    /// Upper bound on generated tokens per reply
    pub max_tokens: u32,

    /// Instruction sent before the conversation; blank sends none
    pub system_prompt: Option<String>,

    /// Label for assistant turns
    pub assistant_name: String,

    /// UI preferences
    pub ui: UiConfig,
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub tick_rate_ms: u64,
    pub scroll_step: u16,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_rate_ms: 300,
            scroll_step: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
            ui: UiConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt)
            .field("assistant_name", &self.assistant_name)
            .field("ui", &self.ui)
            .finish()
    }
}

impl Config {
    /// `~/.chaat`
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".chaat"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("chaat.log"))
    }

    /// Load configuration from `path`, or the default location.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Get API key from environment or config
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_with_env(std::env::var(API_KEY_ENV).ok())
    }

    fn api_key_with_env(&self, env_value: Option<String>) -> Option<String> {
        let usable = |key: String| {
            let key = key.trim().to_string();
            (!key.is_empty()).then_some(key)
        };
        env_value
            .and_then(usable)
            .or_else(|| self.api_key.clone().and_then(usable))
    }

    pub fn completion_settings(&self) -> CompletionSettings {
        CompletionSettings {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system_prompt: self.system_prompt.clone(),
        }
    }
}
