//! Splits incoming queries into those the batch endpoint can serve and those it can't.

use crate::query::Query;

/// Returns true when the query's namespace can be served by `metrics:getBatch`.
///
/// Custom metrics and guest-OS metrics live in namespaces the batch endpoint does not
/// support; they contain "custom" or "guest" (any case).
pub fn is_batchable(query: &Query) -> bool {
    let namespace = query.metric_namespace.to_lowercase();
    !(namespace.contains("custom") || namespace.contains("guest"))
}

/// Partition queries into `(batchable, non_batchable)`, preserving input order.
///
/// Non-batchable queries must go through the single-resource metrics path.
pub fn partition(queries: Vec<Query>) -> (Vec<Query>, Vec<Query>) {
    let (batchable, non_batchable): (Vec<_>, Vec<_>) =
        queries.into_iter().partition(is_batchable);

    if !non_batchable.is_empty() {
        tracing::debug!(
            batchable = batchable.len(),
            non_batchable = non_batchable.len(),
            "Partitioned queries"
        );
    }

    (batchable, non_batchable)
}
