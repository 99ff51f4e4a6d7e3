//! Periodic reconciliation: auto-cancel, auto-complete, journal compaction.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::ledger::Ledger;
use crate::timeutil;

/// Handle for poking the sweeper outside its regular cadence, e.g. right
/// after startup or on an operator signal.
#[derive(Clone)]
pub struct SweepHandle {
    kick: Arc<Notify>,
}

impl SweepHandle {
    pub fn kick(&self) {
        self.kick.notify_one();
    }
}

/// Spawn the sweep loop. Runs every `interval` or whenever kicked, and
/// compacts the journal once it accumulates `compact_threshold` appends.
pub fn spawn_sweeper(
    ledger: Arc<Ledger>,
    interval: Duration,
    compact_threshold: u64,
) -> SweepHandle {
    let kick = Arc::new(Notify::new());
    let handle = SweepHandle { kick: kick.clone() };
    tokio::spawn(run_sweeper(ledger, interval, compact_threshold, kick));
    handle
}

async fn run_sweeper(
    ledger: Arc<Ledger>,
    interval: Duration,
    compact_threshold: u64,
    kick: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!("sweeper started (interval {interval:?})");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = kick.notified() => debug!("sweeper kicked"),
        }

        let sweep_start = std::time::Instant::now();
        let report = ledger.sweep(timeutil::now_local()).await;
        metrics::counter!(crate::observability::SWEEP_RUNS_TOTAL).increment(1);
        metrics::histogram!(crate::observability::SWEEP_DURATION_SECONDS)
            .record(sweep_start.elapsed().as_secs_f64());

        if !report.errors.is_empty() {
            metrics::counter!(crate::observability::SWEEP_ERRORS_TOTAL)
                .increment(report.errors.len() as u64);
        }
        if report.transitions() > 0 {
            info!(
                "sweep: {} auto-canceled, {} auto-completed, {} errors",
                report.auto_canceled,
                report.auto_completed,
                report.errors.len()
            );
        }

        let appends = ledger.journal_appends_since_compact().await;
        if appends >= compact_threshold {
            info!("compacting journal ({appends} appends since last compaction)");
            if let Err(e) = ledger.compact_journal().await {
                warn!("journal compaction failed: {e}");
            }
        }
    }
}
