//! Configuration for the graph resolver.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default maximum traversal depth.
pub const DEFAULT_MAX_DEPTH: u32 = 25;

/// Default bound on concurrently evaluated branches per fan-out.
pub const DEFAULT_MAX_CONCURRENCY: usize = 50;

/// How ListObjects produces its candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListObjectsStrategy {
    /// Probe the number of objects of the requested type and pick one.
    #[default]
    Auto,
    /// Enumerate objects of the type, then Check each.
    Forward,
    /// Walk the reverse rewrite graph from the subject, then Check each hit.
    Reverse,
}

/// Limits and strategy selection for ListObjects.
#[derive(Debug, Clone)]
pub struct ListObjectsConfig {
    /// Candidate strategy.
    pub strategy: ListObjectsStrategy,
    /// `Auto` uses Forward when the type has at most this many objects.
    pub forward_threshold: usize,
    /// Maximum candidates gathered before confirmation.
    pub max_candidates: usize,
    /// Maximum objects returned; reaching it sets `truncated`.
    pub max_results: usize,
}

impl Default for ListObjectsConfig {
    fn default() -> Self {
        Self {
            strategy: ListObjectsStrategy::Auto,
            forward_threshold: 1_000,
            max_candidates: 10_000,
            max_results: 1_000,
        }
    }
}

/// Configuration for the graph resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum depth for graph traversal.
    pub max_depth: u32,
    /// Timeout applied when a request carries no deadline of its own.
    pub timeout: Duration,
    /// Maximum in-flight tuple store reads per request. Also bounds the
    /// width of each individual fan-out.
    pub max_concurrency: usize,
    /// ListObjects settings.
    pub list_objects: ListObjectsConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: Duration::from_secs(30),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            list_objects: ListObjectsConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Creates a new configuration with the specified max depth.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Creates a new configuration with the specified timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates a new configuration with the specified per-request concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Creates a new configuration with the specified ListObjects settings.
    pub fn with_list_objects(mut self, list_objects: ListObjectsConfig) -> Self {
        self.list_objects = list_objects;
        self
    }
}
