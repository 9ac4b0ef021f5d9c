//! Metric definitions.
//!
//! The crate emits counters through the `metrics` facade; installing a
//! recorder is the host application's job.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

pub(crate) const METRIC_HIT_TOTAL: &str = "impronta_cache_hit_total";
pub(crate) const METRIC_MISS_TOTAL: &str = "impronta_cache_miss_total";
pub(crate) const METRIC_WRITE_TOTAL: &str = "impronta_cache_write_total";
pub(crate) const METRIC_WRITE_ERROR_TOTAL: &str = "impronta_cache_write_error_total";
pub(crate) const METRIC_CLEAR_TOTAL: &str = "impronta_cache_clear_total";
pub(crate) const METRIC_RENDER_MS: &str = "impronta_render_ms";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Register units and help texts for the metrics this crate emits.
///
/// Call once after the host has installed its metrics recorder.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_HIT_TOTAL,
            Unit::Count,
            "Requests answered from the page cache."
        );
        describe_counter!(
            METRIC_MISS_TOTAL,
            Unit::Count,
            "GET requests that fell through to the handler."
        );
        describe_counter!(
            METRIC_WRITE_TOTAL,
            Unit::Count,
            "Rendered pages persisted to the cache directory."
        );
        describe_counter!(
            METRIC_WRITE_ERROR_TOTAL,
            Unit::Count,
            "Detached cache writes that failed."
        );
        describe_counter!(
            METRIC_CLEAR_TOTAL,
            Unit::Count,
            "Full cache clears, startup clears included."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Time spent rendering a page template."
        );
    });
}
