// Prometheus metrics for the dispatch subsystem.
//
// USAGE:
//   dispatch_metrics::DISPATCH_METRICS.offers_created.inc();
//   dispatch_metrics::DISPATCH_METRICS.sweep_duration.with_label_values(&["expire_stale_offers"]).observe(elapsed_ms);

pub mod dispatch;
pub mod exporter;

pub use dispatch::DISPATCH_METRICS;
