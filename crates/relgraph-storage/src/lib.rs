//! relgraph-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for relgraph, including:
//! - DataStore trait for tuple and authorization model storage
//! - Tuple validation shared by every backend
//! - In-memory implementation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              relgraph-storage               │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - DataStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! └─────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDataStore;
pub use traits::{DataStore, StoredAuthorizationModel, StoredTuple, TupleFilter};
