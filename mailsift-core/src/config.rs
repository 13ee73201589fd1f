//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/mailsift/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/mailsift/` (~/.config/mailsift/)
//! - Data: `$XDG_DATA_HOME/mailsift/` (~/.local/share/mailsift/)
//! - State/Logs: `$XDG_STATE_HOME/mailsift/` (~/.local/state/mailsift/)
//!
//! Credentials live exclusively here; nothing in the library embeds a key.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Classification gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Batch analysis configuration
    #[serde(default)]
    pub batch: BatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Supported classification providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Gemini,
}

impl Provider {
    /// Returns the identifier used in config and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-5-sonnet-20241022",
            Provider::Gemini => "gemini-1.5-flash",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            _ => Err(format!("unknown provider: {}", s)),
        }
    }
}

/// Per-provider credentials and model selection
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProviderSettings {
    /// API key; absent or placeholder values make the provider non-viable
    pub api_key: Option<String>,
    /// Model identifier (falls back to the provider default)
    pub model: Option<String>,
    /// Endpoint override (falls back to the provider default)
    pub endpoint: Option<String>,
}

/// Placeholder values that must not be treated as real credentials
const PLACEHOLDER_KEYS: &[&str] = &[
    "YOUR_API_KEY",
    "YOUR_API_KEY_HERE",
    "changeme",
    "sk-xxxx",
    "xxx",
];

impl ProviderSettings {
    /// Returns the usable API key, or None when absent or a placeholder.
    pub fn usable_api_key(&self) -> Option<&str> {
        let key = self.api_key.as_deref()?.trim();
        if key.is_empty() {
            return None;
        }
        if PLACEHOLDER_KEYS.iter().any(|p| key.eq_ignore_ascii_case(p)) {
            return None;
        }
        Some(key)
    }
}

/// A provider with resolved credential, model, and endpoint
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
}

/// Classification gateway configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Fallback order; providers without a usable key are skipped
    #[serde(default = "default_provider_order")]
    pub providers: Vec<Provider>,

    #[serde(default)]
    pub openai: ProviderSettings,

    #[serde(default)]
    pub anthropic: ProviderSettings,

    #[serde(default)]
    pub gemini: ProviderSettings,

    /// HTTP request timeout in seconds
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,

    /// Backoff schedule between retries of one provider, in seconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: Vec<u64>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            providers: default_provider_order(),
            openai: ProviderSettings::default(),
            anthropic: ProviderSettings::default(),
            gemini: ProviderSettings::default(),
            timeout_secs: default_gateway_timeout(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

impl GatewayConfig {
    /// Settings block for one provider
    pub fn settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::OpenAI => &self.openai,
            Provider::Anthropic => &self.anthropic,
            Provider::Gemini => &self.gemini,
        }
    }

    /// Providers in fallback order with a usable credential.
    pub fn viable_providers(&self) -> Vec<ResolvedProvider> {
        self.providers
            .iter()
            .filter_map(|&provider| {
                let settings = self.settings(provider);
                let api_key = settings.usable_api_key()?;
                Some(ResolvedProvider {
                    provider,
                    api_key: api_key.to_string(),
                    model: settings
                        .model
                        .clone()
                        .unwrap_or_else(|| provider.default_model().to_string()),
                    endpoint: settings
                        .endpoint
                        .clone()
                        .unwrap_or_else(|| provider.default_endpoint().to_string())
                        .trim_end_matches('/')
                        .to_string(),
                })
            })
            .collect()
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::Config(
                "gateway.providers must list at least one provider".to_string(),
            ));
        }
        if self.retry_backoff_secs.len() > 10 {
            return Err(Error::Config(
                "gateway.retry_backoff_secs is unreasonably long".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_provider_order() -> Vec<Provider> {
    vec![Provider::OpenAI, Provider::Anthropic, Provider::Gemini]
}

fn default_gateway_timeout() -> u64 {
    30
}

fn default_retry_backoff() -> Vec<u64> {
    vec![2, 5, 10]
}

/// Batch analysis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatchConfig {
    /// Emails classified concurrently per group
    #[serde(default = "default_batch_size")]
    pub size: usize,

    /// Pause between groups, in seconds, to respect provider rate limits
    #[serde(default = "default_batch_delay")]
    pub delay_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            delay_secs: default_batch_delay(),
        }
    }
}

fn default_batch_size() -> usize {
    5
}

fn default_batch_delay() -> u64 {
    3
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.gateway.validate()?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/mailsift/config.toml` (~/.config/mailsift/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("mailsift").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/mailsift/` (~/.local/share/mailsift/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("mailsift")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/mailsift/` (~/.local/state/mailsift/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("mailsift")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/mailsift/mailsift.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("mailsift.db")
    }

    /// Returns the legacy flat-list export path, imported once when the
    /// structured collections are still empty
    ///
    /// `$XDG_DATA_HOME/mailsift/analyses.json`
    pub fn legacy_analyses_path() -> PathBuf {
        Self::data_dir().join("analyses.json")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/mailsift/mailsift.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("mailsift.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path
    /// behavior before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.batch.size, 5);
        assert_eq!(config.batch.delay_secs, 3);
        assert_eq!(config.gateway.timeout_secs, 30);
        assert_eq!(config.gateway.retry_backoff_secs, vec![2, 5, 10]);
        assert!(config.gateway.viable_providers().is_empty());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[gateway]
providers = ["anthropic", "openai"]

[gateway.anthropic]
api_key = "sk-ant-test"
model = "claude-3-haiku-20240307"

[batch]
size = 10
delay_secs = 1

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        let viable = config.gateway.viable_providers();
        assert_eq!(viable.len(), 1);
        assert_eq!(viable[0].provider, Provider::Anthropic);
        assert_eq!(viable[0].model, "claude-3-haiku-20240307");
        assert_eq!(viable[0].endpoint, "https://api.anthropic.com");
        assert_eq!(config.batch.size, 10);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_placeholder_keys_are_skipped() {
        let toml = r#"
[gateway.openai]
api_key = "YOUR_API_KEY_HERE"

[gateway.gemini]
api_key = "   "
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.gateway.viable_providers().is_empty());
    }

    #[test]
    fn test_fallback_order_preserved() {
        let toml = r#"
[gateway]
providers = ["gemini", "openai"]

[gateway.openai]
api_key = "sk-real"

[gateway.gemini]
api_key = "AIza-real"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let viable = config.gateway.viable_providers();
        assert_eq!(viable.len(), 2);
        assert_eq!(viable[0].provider, Provider::Gemini);
        assert_eq!(viable[1].provider, Provider::OpenAI);
    }

    #[test]
    fn test_provider_endpoints() {
        assert_eq!(
            Provider::OpenAI.default_endpoint(),
            "https://api.openai.com"
        );
        assert_eq!(
            Provider::Anthropic.default_endpoint(),
            "https://api.anthropic.com"
        );
        assert_eq!(
            Provider::Gemini.default_endpoint(),
            "https://generativelanguage.googleapis.com"
        );
    }
}
