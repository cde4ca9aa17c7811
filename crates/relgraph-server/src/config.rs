//! Configuration management for the relgraph service.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! # Configuration Hierarchy
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example
//!
//! ```ignore
//! use relgraph_server::config::ServerConfig;
//!
//! // Load from file with env overrides
//! let config = ServerConfig::load("config.yaml")?;
//!
//! // Or load from environment only
//! let config = ServerConfig::from_env()?;
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use relgraph_domain::cache::CheckCacheConfig;
use relgraph_domain::resolver::{
    ListObjectsConfig, ListObjectsStrategy, ResolverConfig, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_DEPTH,
};
use serde::{Deserialize, Serialize};

/// Environment variable prefix, e.g. `RELGRAPH_RESOLVER__MAX_DEPTH`.
pub const ENV_PREFIX: &str = "RELGRAPH";

/// Service configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Rewrite evaluation limits
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// ListObjects strategy and bounds
    #[serde(default)]
    pub list_objects: ListObjectsSettings,

    /// Check cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Limits applied to every Check, Expand and ListObjects request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverSettings {
    /// Maximum number of nested relation evaluations on one path
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Request deadline in milliseconds when the caller sets none
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Concurrently evaluated branches per fan-out
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            timeout_ms: default_timeout_ms(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

/// ListObjects settings.
///
/// ```yaml
/// list_objects:
///   strategy: auto   # auto | forward | reverse
///   forward_threshold: 1000
///   max_candidates: 10000
///   max_results: 1000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ListObjectsSettings {
    #[serde(default)]
    pub strategy: ListObjectsStrategy,

    /// `auto` uses forward enumeration up to this many objects of the type
    #[serde(default = "default_forward_threshold")]
    pub forward_threshold: usize,

    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for ListObjectsSettings {
    fn default() -> Self {
        Self {
            strategy: ListObjectsStrategy::default(),
            forward_threshold: default_forward_threshold(),
            max_candidates: default_max_candidates(),
            max_results: default_max_results(),
        }
    }
}

fn default_forward_threshold() -> usize {
    1000
}

fn default_max_candidates() -> usize {
    10_000
}

fn default_max_results() -> usize {
    1000
}

/// Check cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    /// Enable caching of Check results (off by default)
    #[serde(default)]
    pub enabled: bool,

    /// Maximum number of cached decisions
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,

    /// Time-to-live of a cached decision in seconds
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            max_capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_cache_capacity() -> u64 {
    100_000
}

fn default_cache_ttl() -> u64 {
    10
}

/// Storage backend settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StorageSettings {
    /// Storage backend type. Only "memory" is available.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `RELGRAPH_` and use `__` as separator.
    /// For example:
    /// - `RELGRAPH_RESOLVER__MAX_DEPTH=40` overrides `resolver.max_depth`
    /// - `RELGRAPH_CACHE__ENABLED=true` overrides `cache.enabled`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        Self::build(Some(path))
    }

    /// Load configuration from environment variables only.
    ///
    /// Uses default values and allows overrides via RELGRAPH_ prefixed env vars.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::build(None)
    }

    fn build(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder().add_source(Config::try_from(&ServerConfig::default())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }
        let config = builder
            // RELGRAPH_RESOLVER__MAX_DEPTH -> resolver.max_depth
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;

        Ok(server_config)
    }

    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let invalid = |message: String| Err(ConfigLoadError::Invalid { message });

        if self.resolver.max_depth == 0 {
            return invalid("resolver.max_depth must be greater than 0".to_string());
        }
        if self.resolver.timeout_ms == 0 {
            return invalid("resolver.timeout_ms must be greater than 0".to_string());
        }
        if self.resolver.max_concurrency == 0 {
            return invalid("resolver.max_concurrency must be greater than 0".to_string());
        }

        if self.list_objects.max_results == 0 {
            return invalid("list_objects.max_results must be greater than 0".to_string());
        }
        if self.list_objects.max_candidates < self.list_objects.max_results {
            return invalid(format!(
                "list_objects.max_candidates ({}) must be at least list_objects.max_results ({})",
                self.list_objects.max_candidates, self.list_objects.max_results
            ));
        }

        if self.cache.enabled && (self.cache.max_capacity == 0 || self.cache.ttl_secs == 0) {
            return invalid(
                "cache.max_capacity and cache.ttl_secs must be greater than 0 when cache.enabled"
                    .to_string(),
            );
        }

        let valid_backends = ["memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return invalid(format!(
                "storage.backend must be one of: {:?}, got: {}",
                valid_backends, self.storage.backend
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return invalid(format!(
                "logging.level must be one of: {:?}, got: {}",
                valid_levels, self.logging.level
            ));
        }

        Ok(())
    }

    /// Resolver limits for `GraphResolver::with_config`.
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_max_depth(self.resolver.max_depth)
            .with_timeout(Duration::from_millis(self.resolver.timeout_ms))
            .with_max_concurrency(self.resolver.max_concurrency)
            .with_list_objects(ListObjectsConfig {
                strategy: self.list_objects.strategy,
                forward_threshold: self.list_objects.forward_threshold,
                max_candidates: self.list_objects.max_candidates,
                max_results: self.list_objects.max_results,
            })
    }

    /// Settings for the check cache.
    pub fn cache_config(&self) -> CheckCacheConfig {
        CheckCacheConfig::default()
            .with_enabled(self.cache.enabled)
            .with_max_capacity(self.cache.max_capacity)
            .with_ttl(Duration::from_secs(self.cache.ttl_secs))
    }
}
