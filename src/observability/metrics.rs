//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lbaas_apply_total` (counter): apply attempts by outcome
//! - `lbaas_apply_duration_seconds` (histogram): snapshot to reload latency
//! - `lbaas_store_revision` (gauge): latest committed revision
//! - `lbaas_applied_revision` (gauge): revision live in HAProxy
//! - `lbaas_mutations_total` (counter): committed mutations by entity and op
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exposed over HTTP for Prometheus scrape when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_apply(outcome: &'static str, started: Instant) {
    ::metrics::counter!("lbaas_apply_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("lbaas_apply_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

pub fn record_revisions(store_revision: u64, applied_revision: Option<u64>) {
    ::metrics::gauge!("lbaas_store_revision").set(store_revision as f64);
    if let Some(applied) = applied_revision {
        ::metrics::gauge!("lbaas_applied_revision").set(applied as f64);
    }
}

pub fn record_mutation(entity: &'static str, op: &'static str) {
    ::metrics::counter!("lbaas_mutations_total", "entity" => entity, "op" => op).increment(1);
}
