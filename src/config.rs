//! Configuration management for MedAgent
//!
//! TOML configuration with defaults, validation and environment overrides.
//! Location: ~/.medagent/config.toml

use crate::access::RetryExecutor;
use crate::errors::{Result, ToolError};
use crate::tools::adapter::AdapterSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "MEDAGENT_";

/// Complete configuration for MedAgent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, SourceConfig>,
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-attempt timeout
    pub timeout_secs: u64,
}

/// Retry policy shared by every source unless overridden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub backoff_base: f64,
    pub backoff_max_secs: u64,
}

/// Result cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
}

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// How often a waiting caller re-checks its bucket
    pub poll_interval_ms: u64,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// trace, debug, info, warn or error
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// One external API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub display_name: String,
    pub base_url: String,
    /// Requests per second
    pub rate_limit: f64,
    /// Burst capacity (defaults to `rate_limit`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl SourceConfig {
    pub fn new(display_name: &str, base_url: &str, rate_limit: f64) -> Self {
        Self {
            display_name: display_name.to_string(),
            base_url: base_url.to_string(),
            rate_limit,
            burst: None,
            max_retries: None,
            timeout_secs: None,
        }
    }
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    let mut sources = BTreeMap::new();
    sources.insert(
        "pubmed".to_string(),
        SourceConfig::new("PubMed", "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/", 3.0),
    );
    sources.insert(
        "clinical_trials".to_string(),
        SourceConfig::new("ClinicalTrials.gov", "https://clinicaltrials.gov/api/v2/", 10.0),
    );
    sources.insert(
        "chembl".to_string(),
        SourceConfig::new("ChEMBL", "https://www.ebi.ac.uk/chembl/api/data/", 10.0),
    );
    sources
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
            sources: default_sources(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: 2.0,
            backoff_max_secs: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 3600,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply environment overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::load_from_file(&config_path)?,
            None => Self::load_default()?,
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ToolError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ToolError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, or built-in defaults if absent
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// ~/.medagent/config.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".medagent").join("config.toml"))
    }

    /// Apply `MEDAGENT_*` overrides. `lookup` returns the raw variable value.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(v) = var("API_TIMEOUT") {
            self.http.timeout_secs = parse_override("API_TIMEOUT", &v)?;
        }
        if let Some(v) = var("MAX_RETRIES") {
            self.retry.max_retries = parse_override("MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("RETRY_BACKOFF_BASE") {
            self.retry.backoff_base = parse_override("RETRY_BACKOFF_BASE", &v)?;
        }
        if let Some(v) = var("RETRY_BACKOFF_MAX") {
            self.retry.backoff_max_secs = parse_override("RETRY_BACKOFF_MAX", &v)?;
        }
        if let Some(v) = var("CACHE_TTL") {
            self.cache.ttl_secs = parse_override("CACHE_TTL", &v)?;
        }
        if let Some(v) = var("ENABLE_CACHE") {
            self.cache.enabled = parse_bool("ENABLE_CACHE", &v)?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            self.logging.level = v.trim().to_lowercase();
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_secs == 0 {
            return Err(ToolError::Config(
                "http.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !self.retry.backoff_base.is_finite() || self.retry.backoff_base < 1.0 {
            return Err(ToolError::Config(
                "retry.backoff_base must be at least 1.0".to_string(),
            ));
        }

        if self.rate_limit.poll_interval_ms == 0 {
            return Err(ToolError::Config(
                "rate_limit.poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ToolError::Config(format!("Invalid log level: {}", other)));
            }
        }

        if self.sources.is_empty() {
            return Err(ToolError::Config("at least one source must be configured".to_string()));
        }

        for (name, source) in &self.sources {
            if !source.base_url.starts_with("http://") && !source.base_url.starts_with("https://") {
                return Err(ToolError::Config(format!(
                    "sources.{}.base_url must be an http(s) URL",
                    name
                )));
            }
            if !source.rate_limit.is_finite() || source.rate_limit <= 0.0 {
                return Err(ToolError::Config(format!(
                    "sources.{}.rate_limit must be greater than 0",
                    name
                )));
            }
            match source.burst {
                Some(burst) if !burst.is_finite() || burst < 1.0 => {
                    return Err(ToolError::Config(format!(
                        "sources.{}.burst must be at least 1",
                        name
                    )));
                }
                // capacity defaults to the rate, which must hold one whole request
                None if source.rate_limit < 1.0 => {
                    return Err(ToolError::Config(format!(
                        "sources.{}.rate_limit is below 1 request/s; set sources.{}.burst to at least 1",
                        name, name
                    )));
                }
                _ => {}
            }
            if source.timeout_secs == Some(0) {
                return Err(ToolError::Config(format!(
                    "sources.{}.timeout_secs must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ToolError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ToolError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| ToolError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.sources
            .get(name)
            .ok_or_else(|| ToolError::Config(format!("Unknown source: {}", name)))
    }

    /// Per-attempt timeout for a source
    pub fn timeout_for(&self, name: &str) -> Result<Duration> {
        let source = self.source(name)?;
        Ok(Duration::from_secs(
            source.timeout_secs.unwrap_or(self.http.timeout_secs),
        ))
    }

    /// Retry policy for a source
    pub fn retry_for(&self, name: &str) -> Result<RetryExecutor> {
        let source = self.source(name)?;
        Ok(RetryExecutor::with_config(
            source.max_retries.unwrap_or(self.retry.max_retries),
            self.retry.backoff_base,
            Duration::from_secs(self.retry.backoff_max_secs),
        ))
    }

    /// Rate and retry settings the envelope applies to a source
    pub fn adapter_settings(&self, name: &str) -> Result<AdapterSettings> {
        let source = self.source(name)?;
        let mut settings =
            AdapterSettings::new(name, source.rate_limit).with_retry(self.retry_for(name)?);
        if let Some(burst) = source.burst {
            settings = settings.with_burst(burst);
        }
        Ok(settings)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit.poll_interval_ms)
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ToolError::Config(format!("{}{} has an invalid value: {}", ENV_PREFIX, name, value))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ToolError::Config(format!(
            "{}{} has an invalid value: {}",
            ENV_PREFIX, name, value
        ))),
    }
}
