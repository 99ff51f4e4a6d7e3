use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use reservd::config::{BusinessHours, PolicyConfig};
use reservd::ledger::Ledger;
use reservd::notify::TracingNotifier;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("RESERVD_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    reservd::observability::init(metrics_port);

    let data_dir = std::env::var("RESERVD_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let sweep_interval_secs: u64 = std::env::var("RESERVD_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);
    let compact_threshold: u64 = std::env::var("RESERVD_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    let policy = match std::env::var("RESERVD_CONFIG") {
        Ok(path) => PolicyConfig::from_json_file(Path::new(&path))?,
        Err(_) => PolicyConfig::default(),
    };
    let hours = BusinessHours::from_env();

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;
    let journal_path = PathBuf::from(&data_dir).join("ledger.journal");

    let ledger = Arc::new(Ledger::open(
        journal_path,
        hours,
        policy,
        Arc::new(TracingNotifier),
    )?);

    info!("reservd started");
    info!("  data_dir: {data_dir}");
    info!("  hours: {}–{}", hours.open, hours.close);
    info!(
        "  policy: {}min slots, {}min buffer, {}min daily quota",
        policy.slot_minutes, policy.buffer_minutes, policy.daily_quota_minutes
    );
    info!("  metrics: {}", metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics")));

    let sweeper = reservd::sweep::spawn_sweeper(
        ledger.clone(),
        Duration::from_secs(sweep_interval_secs),
        compact_threshold,
    );
    // Catch up immediately on anything that came due while we were down.
    sweeper.kick();

    // Operators can force a sweep with SIGHUP.
    #[cfg(unix)]
    {
        let sweeper = sweeper.clone();
        let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            .expect("failed to register SIGHUP handler");
        tokio::spawn(async move {
            while sighup.recv().await.is_some() {
                info!("SIGHUP received, kicking sweeper");
                sweeper.kick();
            }
        });
    }

    // Run until SIGTERM/ctrl-c. Every mutation is fsynced before it is
    // acknowledged, so there is nothing to drain at shutdown.
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!("reservd stopped");
    Ok(())
}
