use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "reservd_bookings_created_total";

/// Counter: bookings confirmed by their subject.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "reservd_bookings_confirmed_total";

/// Counter: bookings canceled (user, admin, or sweep).
pub const BOOKINGS_CANCELED_TOTAL: &str = "reservd_bookings_canceled_total";

/// Counter: bookings auto-completed by the sweep.
pub const BOOKINGS_COMPLETED_TOTAL: &str = "reservd_bookings_completed_total";

/// Counter: reminder intents handed to the notifier.
pub const REMINDERS_SCHEDULED_TOTAL: &str = "reservd_reminders_scheduled_total";

// ── USE metrics (background work) ───────────────────────────────

/// Counter: sweep passes executed.
pub const SWEEP_RUNS_TOTAL: &str = "reservd_sweep_runs_total";

/// Counter: per-record failures skipped during a sweep.
pub const SWEEP_ERRORS_TOTAL: &str = "reservd_sweep_errors_total";

/// Histogram: sweep pass duration in seconds.
pub const SWEEP_DURATION_SECONDS: &str = "reservd_sweep_duration_seconds";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "reservd_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "reservd_journal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
