//! relgraph-domain: Core relationship-based authorization logic
//!
//! This crate contains the evaluation engine:
//! - Authorization model types and the validated `Model` snapshot
//! - Graph resolver for Check, Expand and ListObjects
//! - Check result caching as a resolver decorator
//! - Model validation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               relgraph-domain               │
//! ├─────────────────────────────────────────────┤
//! │  model/      - Types & validated snapshot   │
//! │  resolver/   - Rewrite evaluation engine    │
//! │  cache/      - Check result caching         │
//! │  validation/ - Model validation             │
//! └─────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod error;
pub mod model;
pub mod resolver;
pub mod validation;

// Re-export commonly used types at the crate root
pub use cache::{CacheKey, CachedChecker, CheckCache, CheckCacheConfig};
pub use error::{DomainError, DomainResult};
pub use model::Model;
pub use resolver::{GraphResolver, ModelReader, ResolverConfig, TupleReader};
