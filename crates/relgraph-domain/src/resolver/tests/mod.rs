//! Tests for the graph resolver module.
//!
//! Organized by functionality:
//! - Check: direct tuples, rewrites, set operators, safety features
//! - Expand: userset trees, cycle markers
//! - ListObjects: candidate strategies, confirmation, limits
//! - Property tests over generated tuple sets


mod proptests;
