use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::reminder_fire_at;
use crate::timeutil;

use super::error::Obstacle;
use super::{lifecycle, quota, slots, Ledger, LedgerError};

/// Reason the sweep writes when it cancels an unconfirmed booking.
pub const SWEEP_CANCEL_REASON: &str = "confirmation deadline passed";

impl Ledger {
    /// Reserve a slot. Member callers may only book for themselves; admins
    /// may book for any subject and bypass the quota.
    pub async fn create_booking(
        &self,
        caller: Caller,
        subject_id: Ulid,
        org_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        devices: Vec<String>,
    ) -> Result<Booking, LedgerError> {
        self.create_booking_at(caller, subject_id, org_id, date, start, devices, timeutil::now_local())
            .await
    }

    /// Same as [`create_booking`](Self::create_booking) with an explicit
    /// clock, for callers that already hold a consistent `now`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_booking_at(
        &self,
        caller: Caller,
        subject_id: Ulid,
        org_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        devices: Vec<String>,
        now: NaiveDateTime,
    ) -> Result<Booking, LedgerError> {
        if let Caller::Member(member) = caller
            && member != subject_id
        {
            return Err(LedgerError::Forbidden);
        }
        if devices.len() > MAX_DEVICES_PER_BOOKING {
            return Err(LedgerError::LimitExceeded("too many devices"));
        }
        if devices.iter().any(|d| d.len() > MAX_DEVICE_NAME_LEN) {
            return Err(LedgerError::LimitExceeded("device name too long"));
        }

        let policy = self.policy;
        let end = timeutil::add_minutes(start, policy.slot_minutes)
            .ok_or(LedgerError::Validation("slot would cross midnight"))?;
        let buffer_until = timeutil::add_minutes(end, policy.buffer_minutes)
            .ok_or(LedgerError::Validation("buffer would cross midnight"))?;

        let hours = self.business_hours().await;
        if start < hours.open || end > hours.close {
            return Err(LedgerError::Validation("start outside business hours"));
        }
        if timeutil::minutes_from(hours.open, start) % policy.slot_minutes as i64 != 0 {
            return Err(LedgerError::Validation("start not aligned to slot granularity"));
        }
        let start_at = timeutil::at(date, start);
        if start_at < now {
            return Err(LedgerError::Validation("start is in the past"));
        }

        // Everything below must see a stable view of the day: hold the
        // per-day lock across the block/conflict/quota checks and the insert.
        let day_lock = self.day_lock(date);
        let _day_guard = day_lock.lock().await;

        if let Some(block) = self
            .block_snapshot(date)
            .iter()
            .find(|b| b.covers(start))
        {
            return Err(LedgerError::SlotUnavailable(Obstacle::Block(block.id)));
        }

        let day_bookings = self.bookings_for_date(date).await;
        if let Some(other) = day_bookings
            .iter()
            .find(|b| slots::conflicts(start_at, policy.slot(), b))
        {
            return Err(LedgerError::SlotUnavailable(Obstacle::Booking(other.id)));
        }

        let reserved = quota::reserved_minutes(&day_bookings, org_id, date);
        quota::check_quota(&caller, reserved, policy.slot_minutes, policy.daily_quota_minutes)?;

        let _commit = self.commit_guard().await;
        let id = Ulid::new();
        let event = Event::BookingCreated {
            id,
            org_id,
            subject_id,
            date,
            start,
            end,
            buffer_until,
            created_at: now,
            devices,
        };
        self.journal_append(&event).await?;
        self.insert_booking(&event);

        for kind in [ReminderKind::ConfirmWindowOpen, ReminderKind::FinalWarning] {
            let fire_at = reminder_fire_at(kind, start_at, &policy);
            self.notifier.schedule_reminder(id, fire_at, kind).await;
        }
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        debug!("booking {id} created for {date} {start} (org {org_id})");

        let shared = self.get_shared(&id).ok_or(LedgerError::NotFound(id))?;
        let booking = shared.read().await.clone();
        Ok(booking)
    }

    /// Subject confirms an upcoming booking inside the confirmation window.
    pub async fn confirm_booking(&self, caller: Caller, id: Ulid) -> Result<(), LedgerError> {
        self.confirm_booking_at(caller, id, timeutil::now_local()).await
    }

    pub async fn confirm_booking_at(
        &self,
        caller: Caller,
        id: Ulid,
        now: NaiveDateTime,
    ) -> Result<(), LedgerError> {
        let _commit = self.commit_guard().await;
        let shared = self.get_shared(&id).ok_or(LedgerError::NotFound(id))?;
        let mut b = shared.write().await;

        if let Caller::Member(member) = caller
            && member != b.subject_id
        {
            return Err(LedgerError::Forbidden);
        }
        lifecycle::check_transition(id, b.status, BookingStatus::Confirmed)?;
        lifecycle::check_confirm_window(b.start_at(), now, &self.policy)?;

        let event = Event::BookingConfirmed { id, at: now };
        self.journal_append(&event).await?;
        b.status = BookingStatus::Confirmed;

        // The window-open reminder has served its purpose; only the final
        // warning needs retracting.
        self.notifier
            .cancel_reminder(id, ReminderKind::FinalWarning)
            .await;
        metrics::counter!(crate::observability::BOOKINGS_CONFIRMED_TOTAL).increment(1);
        Ok(())
    }

    /// Cancel a booking. Members are bound by the lead-time policy and may
    /// only touch their own bookings; admins may cancel anything non-terminal.
    pub async fn cancel_booking(
        &self,
        caller: Caller,
        id: Ulid,
        reason: Option<String>,
    ) -> Result<(), LedgerError> {
        self.cancel_booking_at(caller, id, reason, timeutil::now_local())
            .await
    }

    pub async fn cancel_booking_at(
        &self,
        caller: Caller,
        id: Ulid,
        reason: Option<String>,
        now: NaiveDateTime,
    ) -> Result<(), LedgerError> {
        if let Some(r) = &reason
            && r.len() > MAX_REASON_LEN
        {
            return Err(LedgerError::LimitExceeded("cancellation reason too long"));
        }

        let _commit = self.commit_guard().await;
        let shared = self.get_shared(&id).ok_or(LedgerError::NotFound(id))?;
        let mut b = shared.write().await;

        lifecycle::check_transition(id, b.status, BookingStatus::Canceled)?;
        lifecycle::check_cancellation(&caller, b.subject_id, b.start_at(), now, &self.policy)?;

        let event = Event::BookingCanceled {
            id,
            reason: reason.clone(),
            at: now,
        };
        self.journal_append(&event).await?;
        b.status = BookingStatus::Canceled;
        b.canceled_reason = reason;
        b.canceled_at = Some(now);

        self.notifier.cancel_reminders(id).await;
        metrics::counter!(crate::observability::BOOKINGS_CANCELED_TOTAL).increment(1);
        Ok(())
    }

    // ── Sweep transitions ────────────────────────────────────

    /// One reconciliation pass: auto-cancel unconfirmed bookings past the
    /// confirmation deadline, then auto-complete bookings whose buffer has
    /// elapsed. Each candidate re-checks its status under the booking's
    /// write lock, so a concurrent confirm or cancel is never clobbered, and
    /// an immediate re-run performs no transitions.
    pub async fn sweep(&self, now: NaiveDateTime) -> SweepReport {
        let mut report = SweepReport::default();

        // Creation serializers for days gone by will never be taken again.
        self.day_locks.retain(|date, _| *date >= now.date());

        for id in self.collect_sweep_candidates(now, |b| {
            lifecycle::past_confirm_deadline(b.status, b.start_at(), now, &self.policy)
        }) {
            match self.auto_cancel(id, now).await {
                Ok(true) => report.auto_canceled += 1,
                Ok(false) => {} // status changed under us — nothing to do
                Err(e) => {
                    warn!("sweep: auto-cancel of {id} failed: {e}");
                    report.errors.push((id, e.to_string()));
                }
            }
        }

        for id in self.collect_sweep_candidates(now, |b| {
            lifecycle::ready_to_complete(b.status, b.buffer_until_at(), now)
        }) {
            match self.auto_complete(id, now).await {
                Ok(true) => report.auto_completed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("sweep: auto-complete of {id} failed: {e}");
                    report.errors.push((id, e.to_string()));
                }
            }
        }

        report
    }

    /// Snapshot scan for sweep candidates. Bookings locked for writing right
    /// now are skipped; the next pass picks them up.
    fn collect_sweep_candidates(
        &self,
        _now: NaiveDateTime,
        predicate: impl Fn(&Booking) -> bool,
    ) -> Vec<Ulid> {
        let mut candidates = Vec::new();
        for entry in self.bookings.iter() {
            let shared = entry.value().clone();
            if let Ok(b) = shared.try_read()
                && predicate(&b)
            {
                candidates.push(b.id);
            }
        }
        candidates
    }

    async fn auto_cancel(&self, id: Ulid, now: NaiveDateTime) -> Result<bool, LedgerError> {
        let _commit = self.commit_guard().await;
        let shared = self.get_shared(&id).ok_or(LedgerError::NotFound(id))?;
        let mut b = shared.write().await;
        // Conditional update: only an Active booking still past its deadline.
        if !lifecycle::past_confirm_deadline(b.status, b.start_at(), now, &self.policy) {
            return Ok(false);
        }

        let event = Event::BookingCanceled {
            id,
            reason: Some(SWEEP_CANCEL_REASON.into()),
            at: now,
        };
        self.journal_append(&event).await?;
        b.status = BookingStatus::Canceled;
        b.canceled_reason = Some(SWEEP_CANCEL_REASON.into());
        b.canceled_at = Some(now);

        self.notifier.cancel_reminders(id).await;
        metrics::counter!(crate::observability::BOOKINGS_CANCELED_TOTAL).increment(1);
        debug!("sweep: booking {id} auto-canceled");
        Ok(true)
    }

    async fn auto_complete(&self, id: Ulid, now: NaiveDateTime) -> Result<bool, LedgerError> {
        let _commit = self.commit_guard().await;
        let shared = self.get_shared(&id).ok_or(LedgerError::NotFound(id))?;
        let mut b = shared.write().await;
        if !lifecycle::ready_to_complete(b.status, b.buffer_until_at(), now) {
            return Ok(false);
        }

        let event = Event::BookingCompleted { id, at: now };
        self.journal_append(&event).await?;
        b.status = BookingStatus::Completed;

        metrics::counter!(crate::observability::BOOKINGS_COMPLETED_TOTAL).increment(1);
        debug!("sweep: booking {id} auto-completed");
        Ok(true)
    }

    // ── Administration ───────────────────────────────────────

    /// Block the studio on `date`, wholly or for a `[start, end)` window.
    pub async fn add_block(
        &self,
        caller: Caller,
        date: NaiveDate,
        window: Option<(NaiveTime, NaiveTime)>,
        reason: String,
    ) -> Result<BlockPeriod, LedgerError> {
        if !caller.is_admin() {
            return Err(LedgerError::Forbidden);
        }
        if reason.len() > MAX_REASON_LEN {
            return Err(LedgerError::LimitExceeded("block reason too long"));
        }
        if self.block_count() >= MAX_BLOCKS {
            return Err(LedgerError::LimitExceeded("too many blocks"));
        }
        if let Some((start, end)) = window
            && start >= end
        {
            return Err(LedgerError::Validation("block window is empty"));
        }

        let _commit = self.commit_guard().await;
        let id = Ulid::new();
        let event = Event::BlockAdded {
            id,
            date,
            window,
            reason,
        };
        self.journal_append(&event).await?;
        self.apply_block_added(&event)
    }

    fn apply_block_added(&self, event: &Event) -> Result<BlockPeriod, LedgerError> {
        let Event::BlockAdded {
            id,
            date,
            window,
            reason,
        } = event
        else {
            unreachable!()
        };
        let block = BlockPeriod {
            id: *id,
            date: *date,
            window: *window,
            reason: reason.clone(),
        };
        self.insert_block(block.clone());
        Ok(block)
    }

    pub async fn remove_block(&self, caller: Caller, id: Ulid) -> Result<(), LedgerError> {
        if !caller.is_admin() {
            return Err(LedgerError::Forbidden);
        }
        if !self.contains_block(&id) {
            return Err(LedgerError::NotFound(id));
        }
        let _commit = self.commit_guard().await;
        let event = Event::BlockRemoved { id };
        self.journal_append(&event).await?;
        self.delete_block(&id);
        Ok(())
    }

    /// Change business hours. Slot computation picks the new hours up on the
    /// next query; existing bookings are untouched.
    pub async fn update_hours(
        &self,
        caller: Caller,
        open: NaiveTime,
        close: NaiveTime,
    ) -> Result<(), LedgerError> {
        if !caller.is_admin() {
            return Err(LedgerError::Forbidden);
        }
        if open > close {
            return Err(LedgerError::Validation("open time after close time"));
        }
        let _commit = self.commit_guard().await;
        let event = Event::HoursUpdated { open, close };
        self.journal_append(&event).await?;
        self.set_hours(open, close).await;
        Ok(())
    }
}
