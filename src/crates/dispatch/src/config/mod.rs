//! Process configuration
//!
//! Loaded in three layers: built-in defaults, an optional YAML file named by
//! `DISPATCH_CONFIG`, then `DISPATCH_*` environment variables. The result is
//! validated before anything is built from it.
//!
//! ```yaml
//! model:
//!   provider: deepseek
//!   model: deepseek-chat
//! pipeline:
//!   model_timeout_ms: 30000
//!   render: true
//! domains:
//!   calendar: false
//! ```

pub mod env;

use crate::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use self::env::{get_env, get_env_bool, get_env_parse};

/// Environment variable naming the YAML config file
pub const CONFIG_PATH_ENV: &str = "DISPATCH_CONFIG";

/// Which chat-model client to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// DeepSeek's OpenAI-compatible chat API
    Deepseek,
    /// A local Ollama server
    Ollama,
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelProvider::Deepseek => f.write_str("deepseek"),
            ModelProvider::Ollama => f.write_str("ollama"),
        }
    }
}

impl FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(ModelProvider::Deepseek),
            "ollama" => Ok(ModelProvider::Ollama),
            other => Err(format!("unknown model provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key (remote providers only)
    pub api_key_env: String,
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON object reply
    pub json_mode: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Deepseek,
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            temperature: None,
            json_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_timeout_ms: u64,
    pub action_timeout_ms: u64,
    pub render_timeout_ms: u64,
    /// Run the natural-language summary pass
    pub render: bool,
    /// Total model attempts per request; only transient failures use the extra ones
    pub model_attempts: u32,
    /// Retries for idempotent reads that time out (0 or 1)
    pub read_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_timeout_ms: 30_000,
            action_timeout_ms: 15_000,
            render_timeout_ms: 30_000,
            render: true,
            model_attempts: 1,
            read_retries: 1,
            retry_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub max_turns: usize,
    pub eviction_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 1_800,
            max_turns: 40,
            eviction_interval_secs: 60,
        }
    }
}

/// Which domains are registered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainToggles {
    pub orders: bool,
    pub calendar: bool,
}

impl Default for DomainToggles {
    fn default() -> Self {
        Self {
            orders: true,
            calendar: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// MCP endpoint accepting JSON-RPC `tools/call`
    pub provider_url: String,
    pub default_calendar_id: Option<String>,
    pub timeout_ms: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            provider_url: "http://localhost:3001/mcp".to_string(),
            default_calendar_id: Some("primary".to_string()),
            timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed by CORS; `None` allows any origin
    pub allowed_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origin: Some("http://localhost:5173".to_string()),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub sessions: SessionConfig,
    pub domains: DomainToggles,
    pub calendar: CalendarConfig,
    pub server: ServerConfig,
}

impl DispatchConfig {
    /// Defaults, then the file named by `DISPATCH_CONFIG`, then `DISPATCH_*` overrides.
    pub fn load() -> Result<Self> {
        let mut config = match get_env(CONFIG_PATH_ENV)? {
            Some(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file. Missing sections and keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| DispatchError::Config(format!("Failed to parse YAML: {}", e)))
    }

    /// Apply `DISPATCH_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(provider) = get_env_parse::<ModelProvider>("DISPATCH_MODEL_PROVIDER")? {
            self.model.provider = provider;
        }
        if let Some(url) = get_env("DISPATCH_MODEL_BASE_URL")? {
            self.model.base_url = url;
        }
        if let Some(model) = get_env("DISPATCH_MODEL_NAME")? {
            self.model.model = model;
        }
        if let Some(key_env) = get_env("DISPATCH_MODEL_API_KEY_ENV")? {
            self.model.api_key_env = key_env;
        }
        if let Some(temperature) = get_env_parse("DISPATCH_MODEL_TEMPERATURE")? {
            self.model.temperature = Some(temperature);
        }
        if let Some(json_mode) = get_env_bool("DISPATCH_MODEL_JSON_MODE")? {
            self.model.json_mode = json_mode;
        }

        if let Some(ms) = get_env_parse("DISPATCH_MODEL_TIMEOUT_MS")? {
            self.pipeline.model_timeout_ms = ms;
        }
        if let Some(ms) = get_env_parse("DISPATCH_ACTION_TIMEOUT_MS")? {
            self.pipeline.action_timeout_ms = ms;
        }
        if let Some(ms) = get_env_parse("DISPATCH_RENDER_TIMEOUT_MS")? {
            self.pipeline.render_timeout_ms = ms;
        }
        if let Some(render) = get_env_bool("DISPATCH_RENDER")? {
            self.pipeline.render = render;
        }
        if let Some(attempts) = get_env_parse("DISPATCH_MODEL_ATTEMPTS")? {
            self.pipeline.model_attempts = attempts;
        }
        if let Some(retries) = get_env_parse("DISPATCH_READ_RETRIES")? {
            self.pipeline.read_retries = retries;
        }

        if let Some(secs) = get_env_parse("DISPATCH_SESSION_IDLE_SECS")? {
            self.sessions.idle_timeout_secs = secs;
        }
        if let Some(turns) = get_env_parse("DISPATCH_SESSION_MAX_TURNS")? {
            self.sessions.max_turns = turns;
        }

        if let Some(enabled) = get_env_bool("DISPATCH_ORDERS_ENABLED")? {
            self.domains.orders = enabled;
        }
        if let Some(enabled) = get_env_bool("DISPATCH_CALENDAR_ENABLED")? {
            self.domains.calendar = enabled;
        }
        if let Some(url) = get_env("DISPATCH_CALENDAR_URL")? {
            self.calendar.provider_url = url;
        }
        if let Some(id) = get_env("DISPATCH_DEFAULT_CALENDAR_ID")? {
            self.calendar.default_calendar_id = Some(id).filter(|id| !id.trim().is_empty());
        }

        if let Some(host) = get_env("DISPATCH_SERVER_HOST")? {
            self.server.host = host;
        }
        if let Some(port) = get_env_parse("DISPATCH_SERVER_PORT")? {
            self.server.port = port;
        }
        if let Some(origin) = get_env("DISPATCH_ALLOWED_ORIGIN")? {
            self.server.allowed_origin = Some(origin).filter(|o| !o.trim().is_empty());
        }

        Ok(())
    }

    /// Reject values nothing downstream could work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> Result<()> { Err(DispatchError::Config(message)) };

        if self.model.base_url.trim().is_empty() {
            return invalid("model.base_url must not be empty".into());
        }
        if self.model.model.trim().is_empty() {
            return invalid("model.model must not be empty".into());
        }
        if let Some(t) = self.model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return invalid(format!("model.temperature must be within 0..=2, got {}", t));
            }
        }

        for (name, value) in [
            ("pipeline.model_timeout_ms", self.pipeline.model_timeout_ms),
            ("pipeline.action_timeout_ms", self.pipeline.action_timeout_ms),
            ("pipeline.render_timeout_ms", self.pipeline.render_timeout_ms),
            ("calendar.timeout_ms", self.calendar.timeout_ms),
            ("sessions.idle_timeout_secs", self.sessions.idle_timeout_secs),
            ("sessions.eviction_interval_secs", self.sessions.eviction_interval_secs),
        ] {
            if value == 0 {
                return invalid(format!("{} must be greater than zero", name));
            }
        }

        if self.pipeline.model_attempts == 0 {
            return invalid("pipeline.model_attempts must be at least 1".into());
        }
        if self.pipeline.read_retries > 1 {
            return invalid(format!(
                "pipeline.read_retries allows at most one retry, got {}",
                self.pipeline.read_retries
            ));
        }
        if self.sessions.max_turns < 2 {
            return invalid("sessions.max_turns must be at least 2".into());
        }
        if self.domains.calendar && self.calendar.provider_url.trim().is_empty() {
            return invalid("calendar.provider_url is required when the calendar domain is enabled".into());
        }
        if !self.domains.orders && !self.domains.calendar {
            tracing::warn!("No domains enabled; every prompt will get a clarification reply");
        }

        Ok(())
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.model_timeout_ms)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.action_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline.render_timeout_ms)
    }

    pub fn calendar_timeout(&self) -> Duration {
        Duration::from_millis(self.calendar.timeout_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.sessions.idle_timeout_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.sessions.eviction_interval_secs)
    }

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
