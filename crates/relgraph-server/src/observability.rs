//! Metric descriptions.
//!
//! Recording happens where the work is done (`relgraph_check_total` in the
//! resolver, cache counters in the check cache, tuple writes in the service).
//! This module only describes those series for whatever recorder the host
//! process installs.

/// Describes every metric the service and the resolver emit.
///
/// Called from `AuthzService::from_config`. Describing a metric twice is
/// harmless, and without an installed recorder this is a no-op.
pub fn register_metrics() {
    // Authorization
    metrics::describe_counter!(
        "relgraph_check_total",
        "Check evaluations by outcome (allowed, denied, error)"
    );
    metrics::describe_counter!(
        "relgraph_list_objects_total",
        "ListObjects requests by candidate strategy"
    );

    // Writes
    metrics::describe_counter!(
        "relgraph_tuple_writes_total",
        "Tuples written or deleted through the service"
    );

    relgraph_domain::cache::register_check_cache_metrics();
}
