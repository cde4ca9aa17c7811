//! Request handlers layered over the resolver.

pub mod batch;
