//! Configuration management for ContentForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Text generation service configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// REST article store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Search index notification configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Public site configuration
    #[serde(default)]
    pub site: SiteConfig,

    /// Automation scheduler configuration
    #[serde(default)]
    pub automation: AutomationSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation provider: openai, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key for the generation service
    pub api_key: Option<String>,

    /// API base URL (OpenAI-compatible endpoint)
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Writing tone
    #[serde(default = "default_tone")]
    pub tone: String,

    /// Target minimum word count per article
    #[serde(default = "default_min_words")]
    pub min_words: u32,

    /// Append a FAQ section to every article
    #[serde(default = "default_true")]
    pub include_faq: bool,

    /// System prompt for the writer
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Request timeout in seconds (article bodies take a while)
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Base URL of the REST CRUD API
    #[serde(default = "default_store_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures
    #[serde(default = "default_store_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexingConfig {
    /// IndexNow key; notifications are skipped when absent
    pub api_key: Option<String>,

    /// Public location of the key file (defaults to https://{host}/{key}.txt)
    pub key_location: Option<String>,

    /// Endpoints tried in order until one accepts the submission
    #[serde(default = "default_index_endpoints")]
    pub endpoints: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    /// Canonical base URL used to build article links
    #[serde(default = "default_canonical_base_url")]
    pub canonical_base_url: String,

    /// Author label stamped on generated articles
    #[serde(default = "default_author")]
    pub author: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutomationSettings {
    /// JSON file holding the batch queue (in-memory when unset)
    pub queue_path: Option<PathBuf>,

    /// Delay between keywords in unbounded mode, in milliseconds
    #[serde(default = "default_keyword_delay")]
    pub keyword_delay_ms: u64,

    /// Delay between keywords in rate-limited mode, in milliseconds
    #[serde(default = "default_slice_delay")]
    pub slice_delay_ms: u64,

    /// Period of the rate-limited tick in seconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Stop the whole run when the generation key is rejected
    #[serde(default = "default_true")]
    pub halt_on_invalid_credential: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_true")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second against the control API
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_generation_provider() -> String { "openai".to_string() }
fn default_generation_base_url() -> String { "https://api.openai.com/v1".to_string() }
fn default_generation_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_tone() -> String { "Professional".to_string() }
fn default_min_words() -> u32 { 800 }
fn default_system_prompt() -> String {
    "You are a senior SEO finance writer. Create comprehensive, accurate, and engaging financial content that helps readers make informed decisions.".to_string()
}
fn default_generation_timeout() -> u64 { 120 }
fn default_store_base_url() -> String { "http://localhost/api".to_string() }
fn default_store_timeout() -> u64 { 15 }
fn default_store_retries() -> u32 { 3 }
fn default_index_endpoints() -> Vec<String> {
    vec![
        "https://api.indexnow.org/indexnow".to_string(),
        "https://www.bing.com/indexnow".to_string(),
        "https://yandex.com/indexnow".to_string(),
    ]
}
fn default_index_timeout() -> u64 { 10 }
fn default_canonical_base_url() -> String { "https://financeadd.com".to_string() }
fn default_author() -> String { crate::DEFAULT_AUTHOR.to_string() }
fn default_keyword_delay() -> u64 { 1000 }
fn default_slice_delay() -> u64 { 2000 }
fn default_tick_interval() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_service_name() -> String { "contentforge".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_true() -> bool { true }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__GENERATION__API_KEY=sk-...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// The generation key, ignoring blank values
    pub fn generation_api_key(&self) -> Option<&str> {
        non_blank(self.generation.api_key.as_deref())
    }

    /// The IndexNow key, ignoring blank values
    pub fn indexing_api_key(&self) -> Option<&str> {
        non_blank(self.indexing.api_key.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl AutomationSettings {
    pub fn keyword_delay(&self) -> Duration {
        Duration::from_millis(self.keyword_delay_ms)
    }

    pub fn slice_delay(&self) -> Duration {
        Duration::from_millis(self.slice_delay_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            base_url: default_generation_base_url(),
            model: default_generation_model(),
            tone: default_tone(),
            min_words: default_min_words(),
            include_faq: true,
            system_prompt: default_system_prompt(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            timeout_secs: default_store_timeout(),
            max_retries: default_store_retries(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            key_location: None,
            endpoints: default_index_endpoints(),
            timeout_secs: default_index_timeout(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            canonical_base_url: default_canonical_base_url(),
            author: default_author(),
        }
    }
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            queue_path: None,
            keyword_delay_ms: default_keyword_delay(),
            slice_delay_ms: default_slice_delay(),
            tick_interval_secs: default_tick_interval(),
            halt_on_invalid_credential: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: true,
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            generation: GenerationConfig::default(),
            store: StoreConfig::default(),
            indexing: IndexingConfig::default(),
            site: SiteConfig::default(),
            automation: AutomationSettings::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.generation.model, "gpt-3.5-turbo");
        assert_eq!(config.indexing.endpoints.len(), 3);
        assert_eq!(config.automation.tick_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_blank_keys_are_treated_as_missing() {
        let mut config = AppConfig::default();
        assert!(config.generation_api_key().is_none());

        config.generation.api_key = Some("   ".to_string());
        assert!(config.generation_api_key().is_none());

        config.generation.api_key = Some(" sk-live ".to_string());
        assert_eq!(config.generation_api_key(), Some("sk-live"));
    }

    #[test]
    fn test_from_file_fills_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contentforge.toml");
        std::fs::write(
            &path,
            "[generation]\nprovider = \"mock\"\n\n[automation]\nkeyword_delay_ms = 5\n",
        )
        .unwrap();

        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.generation.provider, "mock");
        assert_eq!(config.automation.keyword_delay_ms, 5);
        assert_eq!(config.automation.slice_delay_ms, 2000);
        assert_eq!(config.site.author, "AI Content Generator");
    }
}
