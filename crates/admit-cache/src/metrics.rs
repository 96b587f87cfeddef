//! Prometheus metrics for the tiered cache.

use metrics::{counter, describe_counter};

/// Metric names for the cache.
pub mod names {
    /// Reads answered from a tier.
    pub const CACHE_HITS_TOTAL: &str = "admit_cache_hits_total";
    /// Reads that found nothing in either tier.
    pub const CACHE_MISSES_TOTAL: &str = "admit_cache_misses_total";
    /// Remote-tier failures absorbed by the cache.
    pub const CACHE_REMOTE_ERRORS_TOTAL: &str = "admit_cache_remote_errors_total";
}

/// Register metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Cache reads answered by a tier");
    describe_counter!(names::CACHE_MISSES_TOTAL, "Cache reads that missed both tiers");
    describe_counter!(
        names::CACHE_REMOTE_ERRORS_TOTAL,
        "Remote cache failures that fell back to the local tier"
    );
}

pub(crate) fn hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

pub(crate) fn miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub(crate) fn remote_error(operation: &'static str, kind: &'static str) {
    counter!(
        names::CACHE_REMOTE_ERRORS_TOTAL,
        "operation" => operation,
        "kind" => kind
    )
    .increment(1);
}
