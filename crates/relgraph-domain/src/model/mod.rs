//! Authorization model types and the validated model snapshot.
//!
//! This module contains:
//! - Core type definitions (Object, Subject, Userset, TypeDefinition)
//! - `Model`, the immutable validated snapshot the resolver evaluates against

mod type_system;
mod types;
#[cfg(test)]
mod types_proptest;

pub use type_system::{Model, TtuDependent};
pub use types::*;
