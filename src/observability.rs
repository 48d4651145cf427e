use std::net::SocketAddr;

// ── Ledger activity ─────────────────────────────────────────────

/// Counter: vehicles added to the registered set (registration and seeding).
pub const VEHICLES_REGISTERED_TOTAL: &str = "parkledger_vehicles_registered_total";

/// Counter: parking sessions opened.
pub const SESSIONS_OPENED_TOTAL: &str = "parkledger_sessions_opened_total";

/// Counter: parking sessions closed with a fee.
pub const SESSIONS_CLOSED_TOTAL: &str = "parkledger_sessions_closed_total";

/// Counter: currency units billed on closed sessions.
pub const REVENUE_TOTAL: &str = "parkledger_revenue_total";

/// Counter: unparks that freed a slot with no open session to bill.
pub const UNRECORDED_UNPARKS_TOTAL: &str = "parkledger_unrecorded_unparks_total";

/// Counter: rejected ledger operations. Labels: operation, kind.
pub const OPERATION_ERRORS_TOTAL: &str = "parkledger_operation_errors_total";

/// Gauge: slots currently occupied.
pub const SLOTS_OCCUPIED: &str = "parkledger_slots_occupied";

// ── Directory side channel ──────────────────────────────────────

/// Gauge: 1 when the last health probe succeeded.
pub const DIRECTORY_REACHABLE: &str = "parkledger_directory_reachable";

/// Counter: directory sync attempts. Labels: outcome.
pub const SYNC_ATTEMPTS_TOTAL: &str = "parkledger_sync_attempts_total";

/// Counter: sync intents dropped before reaching the directory. Labels: reason.
pub const SYNC_DROPPED_TOTAL: &str = "parkledger_sync_dropped_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
