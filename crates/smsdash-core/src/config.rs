//! SmsDash configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SmsDashError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsDashConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub phone: PhoneConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl SmsDashConfig {
    /// Resolve the config file: `explicit`, else `SMSDASH_CONFIG`, else
    /// the default path (~/.smsdash/config.toml).
    pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
        explicit
            .map(str::to_string)
            .or_else(|| env_non_empty("SMSDASH_CONFIG"))
            .map(|p| PathBuf::from(expand_path(&p)))
            .unwrap_or_else(Self::default_path)
    }

    /// Load the resolved config file (defaults if it does not exist),
    /// then apply environment overrides.
    pub fn load(explicit: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(explicit);
        let mut config = if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            Self::load_from(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load config from a specific path. Environment overrides are not applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SmsDashError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SmsDashError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to a path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SmsDashError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the SmsDash home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".smsdash")
    }

    /// Environment variables win over file values.
    pub fn apply_env(&mut self) {
        if let Some(v) = env_non_empty("SMSDASH_API_URL") {
            self.api.base_url = v;
        }
        if let Some(v) = env_non_empty("SMSDASH_API_TOKEN") {
            self.api.token = v;
        }
        if let Some(v) = env_non_empty("SMSDASH_API_TOKEN_FILE") {
            self.api.token_file = v;
        }
        if let Some(v) = env_non_empty("GEMINI_API_KEY") {
            self.generation.api_key = v;
        }
    }

    /// Resolved data directory for the durable state slots.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.scheduler.data_dir))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Expand `~` and environment variables in a path string.
pub fn expand_path(p: &str) -> String {
    shellexpand::full(p)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| shellexpand::tilde(p).to_string())
}

/// Outbound message-send endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_send_path")]
    pub send_path: String,
    /// Static bearer token. Ignored when `token_file` or `token_env` is set.
    #[serde(default)]
    pub token: String,
    /// File holding the bearer token, re-read on every send.
    #[serde(default)]
    pub token_file: String,
    /// Environment variable holding the bearer token, read on every send.
    /// Used when `token_file` is unset.
    #[serde(default)]
    pub token_env: String,
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String { "http://127.0.0.1:8000".into() }
fn default_send_path() -> String { "/api/v1/sms/send".into() }
fn default_api_timeout() -> u64 { 15 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            send_path: default_send_path(),
            token: String::new(),
            token_file: String::new(),
            token_env: String::new(),
            timeout_secs: default_api_timeout(),
        }
    }
}

/// Generative-completion endpoint used to draft messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gen_base_url")]
    pub base_url: String,
    #[serde(default = "default_gen_model")]
    pub model: String,
    #[serde(default = "default_gen_timeout")]
    pub timeout_secs: u64,
    /// Used when generation fails. Empty means no fallback.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_gen_base_url() -> String { "https://generativelanguage.googleapis.com".into() }
fn default_gen_model() -> String { "gemini-1.5-flash".into() }
fn default_gen_timeout() -> u64 { 30 }
fn default_fallback_message() -> String {
    "Hello! This is a friendly reminder from our team. Reply STOP to opt out.".into()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gen_base_url(),
            model: default_gen_model(),
            timeout_secs: default_gen_timeout(),
            fallback_message: default_fallback_message(),
        }
    }
}

impl GenerationConfig {
    pub fn fallback(&self) -> Option<&str> {
        let f = self.fallback_message.trim();
        (!f.is_empty()).then_some(f)
    }
}

/// Dispatch loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_check_interval() -> u64 { 30 }
fn default_data_dir() -> String { "~/.smsdash/data".into() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            data_dir: default_data_dir(),
        }
    }
}

/// Numbering plan for phone normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneConfig {
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_subscriber_digits")]
    pub subscriber_digits: usize,
}

fn default_country_code() -> String { "256".into() }
fn default_subscriber_digits() -> usize { 9 }

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            country_code: default_country_code(),
            subscriber_digits: default_subscriber_digits(),
        }
    }
}

/// HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 { 3000 }
fn default_host() -> String { "127.0.0.1".into() }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}
