//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tpc_transfers_total` (counter): finished COPY requests by direction, local status
//! - `tpc_transfer_bytes_total` (counter): bytes moved through local storage by direction
//! - `tpc_transfer_duration_seconds` (histogram): wall time of the remote exchange
//! - `tpc_open_stalls_total` (counter): stall/started answers waited out on open
//!
//! # Design Decisions
//! - Facade macros everywhere; the Prometheus recorder is optional
//! - Without an installed recorder every update is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::tpc::Direction;

/// Install the Prometheus recorder and its scrape listener. Needs a running tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_transfer(direction: Direction, status: u16, bytes: u64, start: Instant) {
    metrics::counter!(
        "tpc_transfers_total",
        "direction" => direction.as_str(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::counter!("tpc_transfer_bytes_total", "direction" => direction.as_str()).increment(bytes);
    metrics::histogram!("tpc_transfer_duration_seconds", "direction" => direction.as_str())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_stalls(count: u32) {
    if count > 0 {
        metrics::counter!("tpc_open_stalls_total").increment(u64::from(count));
    }
}
