//! In-process viewer metrics.
//!
//! Counters and one latency histogram, rendered in the Prometheus text format.
//! The viewer has no HTTP surface, so the rendered text is logged on shutdown.

pub mod metrics;

pub use metrics::ViewerMetrics;
