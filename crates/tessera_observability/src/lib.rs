//! Observability setup: structured logging and metric recording.
//!
//! The library crates only record through the `metrics` facade; installing
//! an exporter is left to the host process.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tessera=debug";

/// Initialize the global tracing subscriber with structured logging.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}

/// Record one routed statement.
pub fn record_route(engine: &str, units: usize, duration_us: u64) {
    metrics::counter!("tessera_route_total", "engine" => engine.to_string()).increment(1);
    metrics::histogram!("tessera_route_units").record(units as f64);
    metrics::histogram!("tessera_route_duration_us", "engine" => engine.to_string())
        .record(duration_us as f64);
}

/// Record a statement rejected by the router.
pub fn record_route_rejected(reason: &str) {
    metrics::counter!("tessera_route_rejected_total", "reason" => reason.to_string()).increment(1);
}

/// Record cartesian combinations dropped because their data sources differ.
pub fn record_cartesian_discarded(count: usize) {
    metrics::counter!("tessera_cartesian_discarded_total").increment(count as u64);
}

/// `outcome` is one of: "routed", "generic", "failed".
pub fn record_rewrite(outcome: &str, units: usize) {
    metrics::counter!("tessera_rewrite_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("tessera_rewrite_units").record(units as f64);
}

/// `outcome` is one of: "applied", "rejected".
pub fn record_rule_reload(outcome: &str, version: u64) {
    metrics::counter!("tessera_rule_reload_total", "outcome" => outcome.to_string()).increment(1);
    metrics::gauge!("tessera_rule_version").set(version as f64);
}

/// `outcome` is one of: "ok", "failed", "cancelled".
pub fn record_metadata_load(outcome: &str, tables: usize, duration_us: u64) {
    metrics::counter!("tessera_metadata_load_total", "outcome" => outcome.to_string()).increment(1);
    metrics::histogram!("tessera_metadata_load_duration_us").record(duration_us as f64);
    metrics::gauge!("tessera_metadata_tables").set(tables as f64);
}
