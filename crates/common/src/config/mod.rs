//! Configuration management for citemap
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with CITEMAP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AppConfig {
    /// External bibliographic database (OpenAlex)
    #[serde(default)]
    #[validate(nested)]
    pub openalex: OpenAlexConfig,

    /// Matching protocol thresholds and weights
    #[serde(default)]
    #[validate(nested)]
    pub resolver: ResolverConfig,

    /// Fan-out and rate limits for external calls
    #[serde(default)]
    #[validate(nested)]
    pub concurrency: ConcurrencyConfig,

    /// Run-level limits
    #[serde(default)]
    #[validate(nested)]
    pub run: RunConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct OpenAlexConfig {
    /// API base URL
    #[serde(default = "default_openalex_base")]
    #[validate(length(min = 1))]
    pub base_url: String,

    /// Contact address for the polite pool
    pub mailto: Option<String>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Maximum attempts per request (including the first)
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,

    /// Candidates requested per search
    #[serde(default = "default_per_page")]
    #[validate(range(min = 1, max = 50))]
    pub per_page: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ResolverConfig {
    /// Minimum score for accepting the top candidate
    #[serde(default = "default_confidence_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,

    /// Weight of normalized title similarity
    #[serde(default = "default_title_weight")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub title_weight: f64,

    /// Weight of author-surname overlap
    #[serde(default = "default_author_weight")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub author_weight: f64,

    /// Weight of year closeness
    #[serde(default = "default_year_weight")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub year_weight: f64,

    /// Multiplier applied when years differ by more than one
    #[serde(default = "default_year_mismatch_penalty")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub year_mismatch_penalty: f64,

    /// Consecutive failed lookups before the database is declared unavailable
    #[serde(default = "default_max_consecutive_failures")]
    #[validate(range(min = 1))]
    pub max_consecutive_failures: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ConcurrencyConfig {
    /// Maximum simultaneous in-flight external requests
    #[serde(default = "default_max_in_flight")]
    #[validate(range(min = 1, max = 64))]
    pub max_in_flight: usize,

    /// Sustained request rate against the external database
    #[serde(default = "default_requests_per_second")]
    #[validate(range(min = 1))]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    #[validate(range(min = 1))]
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RunConfig {
    /// Abort outstanding external calls after this many seconds
    #[serde(default = "default_run_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_openalex_base() -> String { "https://api.openalex.org".to_string() }
fn default_user_agent() -> String { format!("citemap/{}", crate::VERSION) }
fn default_request_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 4 }
fn default_per_page() -> usize { 5 }
fn default_confidence_threshold() -> f64 { 0.75 }
fn default_title_weight() -> f64 { 0.6 }
fn default_author_weight() -> f64 { 0.25 }
fn default_year_weight() -> f64 { 0.15 }
fn default_year_mismatch_penalty() -> f64 { 0.3 }
fn default_max_consecutive_failures() -> usize { 5 }
fn default_max_in_flight() -> usize { 8 }
fn default_requests_per_second() -> u32 { 10 }
fn default_burst() -> u32 { 10 }
fn default_run_timeout() -> u64 { 600 }
fn default_log_level() -> String { "info".to_string() }

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            base_url: default_openalex_base(),
            mailto: None,
            user_agent: default_user_agent(),
            timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            per_page: default_per_page(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            title_weight: default_title_weight(),
            author_weight: default_author_weight(),
            year_weight: default_year_weight(),
            year_mismatch_penalty: default_year_mismatch_penalty(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_run_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openalex: OpenAlexConfig::default(),
            resolver: ResolverConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            run: RunConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., CITEMAP__RESOLVER__CONFIDENCE_THRESHOLD=0.8
            .add_source(
                Environment::with_prefix("CITEMAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file, still honouring environment overrides
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("CITEMAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.openalex.timeout_secs)
    }

    /// Whole-run timeout as Duration
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run.timeout_secs)
    }
}
