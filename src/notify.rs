use async_trait::async_trait;
use chrono::NaiveDateTime;
use ulid::Ulid;

use crate::config::PolicyConfig;
use crate::model::ReminderKind;

/// When a reminder of the given kind should fire for a booking starting at
/// `start_at`.
pub fn reminder_fire_at(
    kind: ReminderKind,
    start_at: NaiveDateTime,
    policy: &PolicyConfig,
) -> NaiveDateTime {
    match kind {
        ReminderKind::ConfirmWindowOpen => start_at - policy.confirm_window(),
        ReminderKind::FinalWarning => start_at - policy.confirm_deadline(),
    }
}

/// Notification collaborator. Delivery transport is somebody else's problem;
/// the ledger only emits scheduling intents. Implementations must be
/// best-effort and must not fail the calling operation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn schedule_reminder(&self, booking_id: Ulid, fire_at: NaiveDateTime, kind: ReminderKind);

    /// Retract one reminder kind (e.g. the final warning after confirmation).
    async fn cancel_reminder(&self, booking_id: Ulid, kind: ReminderKind);

    /// Retract every reminder for a booking (cancellation).
    async fn cancel_reminders(&self, booking_id: Ulid);
}

/// Default notifier: logs the intents and counts them. A real deployment
/// plugs in a push-gateway implementation here.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn schedule_reminder(&self, booking_id: Ulid, fire_at: NaiveDateTime, kind: ReminderKind) {
        metrics::counter!(crate::observability::REMINDERS_SCHEDULED_TOTAL).increment(1);
        tracing::info!("reminder {kind:?} for booking {booking_id} at {fire_at}");
    }

    async fn cancel_reminder(&self, booking_id: Ulid, kind: ReminderKind) {
        tracing::info!("retract reminder {kind:?} for booking {booking_id}");
    }

    async fn cancel_reminders(&self, booking_id: Ulid) {
        tracing::info!("retract all reminders for booking {booking_id}");
    }
}
