//! relgraph-server: service layer over the resolver
//!
//! This crate wires storage to the domain engine:
//! - Configuration loading (YAML + environment)
//! - Logging bootstrap and metric descriptions
//! - Storage-to-domain adapters
//! - `AuthzService` facade
//! - Batch check handler with deduplication
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               relgraph-server               │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  logging.rs  - tracing-subscriber setup     │
//! │  observability.rs - metric descriptions     │
//! │  adapters.rs - DataStore -> Tuple/Model     │
//! │  service.rs  - AuthzService facade          │
//! │  handlers/                                  │
//! │    batch/    - Batch checks                 │
//! └─────────────────────────────────────────────┘
//! ```

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod observability;
pub mod service;

// Re-exports for convenience
pub use adapters::{DataStoreModelReader, DataStoreTupleReader};
pub use config::{ConfigLoadError, ServerConfig};
pub use service::{AuthzService, ServiceError, ServiceResult, TupleKey};
