//! Metrics and observability utilities
//!
//! Counters and histograms for one mapping run, named with a common
//! prefix. Nothing is exported unless the host installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all citemap metrics
pub const METRICS_PREFIX: &str = "citemap";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_upstream_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total requests sent to the bibliographic database"
    );

    describe_histogram!(
        format!("{}_upstream_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Bibliographic database request latency in seconds"
    );

    describe_counter!(
        format!("{}_references_resolved_total", METRICS_PREFIX),
        Unit::Count,
        "References mapped to an external work"
    );

    describe_counter!(
        format!("{}_references_unresolved_total", METRICS_PREFIX),
        Unit::Count,
        "References left unresolved"
    );

    describe_counter!(
        format!("{}_resolution_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Resolutions downgraded because of a failed lookup"
    );

    describe_counter!(
        format!("{}_citation_fetches_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound citation list fetches"
    );

    describe_counter!(
        format!("{}_citation_fetch_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound citation fetches that failed"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to time one external request
pub struct UpstreamTimer {
    start: Instant,
    operation: &'static str,
}

impl UpstreamTimer {
    /// Start tracking a request
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Record request completion
    pub fn finish(self, success: bool) {
        let duration = self.start.elapsed().as_secs_f64();
        let status = if success { "success" } else { "error" };

        counter!(
            format!("{}_upstream_requests_total", METRICS_PREFIX),
            "operation" => self.operation,
            "status" => status
        )
        .increment(1);

        histogram!(
            format!("{}_upstream_duration_seconds", METRICS_PREFIX),
            "operation" => self.operation
        )
        .record(duration);
    }
}

/// Helper to record a resolution outcome
pub fn record_resolution(resolved: bool, failed: bool) {
    if resolved {
        counter!(format!("{}_references_resolved_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_references_unresolved_total", METRICS_PREFIX)).increment(1);
    }

    if failed {
        counter!(format!("{}_resolution_failures_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record a citation fetch
pub fn record_citation_fetch(success: bool) {
    counter!(format!("{}_citation_fetches_total", METRICS_PREFIX)).increment(1);

    if !success {
        counter!(format!("{}_citation_fetch_failures_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        register_metrics();
        let timer = UpstreamTimer::start("search");
        timer.finish(true);
        record_resolution(false, true);
        record_citation_fetch(false);
        record_cache(true, "resolution");
        // Just verify it runs without panic
    }
}
