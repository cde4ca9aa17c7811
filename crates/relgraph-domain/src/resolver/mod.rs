//! Graph resolver for permission checks.
//!
//! The resolver evaluates relation rewrites against a tuple store to answer
//! Check, Expand and ListObjects queries.
//!
//! # Module Organization
//!
//! - `config`: resolver limits and ListObjects strategy
//! - `context`: per-request traversal context (model snapshot, visited set, depth)
//! - `fanout`: bounded concurrent union/intersection with short-circuiting
//! - `graph_resolver`: rewrite evaluator and Check
//! - `expand`: userset tree expansion
//! - `list_objects`: forward and reverse ListObjects
//! - `traits`: `TupleReader` and `ModelReader`
//! - `types`: request/response types

mod config;
mod context;
mod expand;
mod fanout;
mod graph_resolver;
mod list_objects;
mod traits;
mod types;

#[cfg(test)]
mod tests;

pub use config::{
    ListObjectsConfig, ListObjectsStrategy, ResolverConfig, DEFAULT_MAX_CONCURRENCY,
    DEFAULT_MAX_DEPTH,
};
pub use graph_resolver::GraphResolver;
pub use traits::{ModelReader, TupleReader};
pub use types::{
    CheckRequest, CheckResult, ContextualTuple, ExpandLeaf, ExpandLeafValue, ExpandNode,
    ExpandRequest, ExpandResult, ListObjectsRequest, ListObjectsResult, ObjectRef,
    StoredTupleRef, UsersetTree,
};
