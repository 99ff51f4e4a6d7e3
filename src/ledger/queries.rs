use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use ulid::Ulid;

use crate::model::{BlockPeriod, Booking};
use crate::timeutil;

use super::{quota, slots, Ledger};

impl Ledger {
    pub async fn get_booking(&self, id: &Ulid) -> Option<Booking> {
        let shared = self.get_shared(id)?;
        Some(shared.read().await.clone())
    }

    /// All bookings on `date`, every status, ordered by start time.
    pub async fn bookings_for_date(&self, date: NaiveDate) -> Vec<Booking> {
        let ids = self
            .by_date
            .get(&date)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut bookings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(shared) = self.get_shared(&id) {
                bookings.push(shared.read().await.clone());
            }
        }
        bookings.sort_by_key(|b| (b.start, b.id));
        bookings
    }

    /// A subject's bookings across all dates, ordered chronologically.
    pub async fn bookings_for_subject(&self, subject_id: Ulid) -> Vec<Booking> {
        let ids = self
            .by_subject
            .get(&subject_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut bookings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(shared) = self.get_shared(&id) {
                bookings.push(shared.read().await.clone());
            }
        }
        bookings.sort_by_key(|b| (b.date, b.start, b.id));
        bookings
    }

    /// The subject's earliest occupying booking that has not started yet.
    pub async fn next_booking_for_subject(
        &self,
        subject_id: Ulid,
        now: NaiveDateTime,
    ) -> Option<Booking> {
        self.bookings_for_subject(subject_id)
            .await
            .into_iter()
            .find(|b| b.status.occupies() && b.start_at() >= now)
    }

    /// Bookable start times on `date`, given current hours, blocks, and
    /// occupying bookings.
    pub async fn available_slots(&self, date: NaiveDate) -> Vec<NaiveTime> {
        self.available_slots_at(date, timeutil::now_local()).await
    }

    pub async fn available_slots_at(&self, date: NaiveDate, now: NaiveDateTime) -> Vec<NaiveTime> {
        let hours = self.business_hours().await;
        let bookings = self.bookings_for_date(date).await;
        let blocks = self.block_snapshot(date);
        slots::available_slots(date, &hours, &self.policy, &bookings, &blocks, now)
    }

    /// Minutes of the daily quota an org has already consumed on `date`.
    pub async fn reserved_minutes(&self, org_id: Ulid, date: NaiveDate) -> u32 {
        let bookings = self.bookings_for_date(date).await;
        quota::reserved_minutes(&bookings, org_id, date)
    }

    pub fn list_blocks(&self, date: NaiveDate) -> Vec<BlockPeriod> {
        self.block_snapshot(date)
    }
}
