use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

use crate::config::{BusinessHours, PolicyConfig};
use crate::model::{BlockPeriod, Booking};
use crate::timeutil;

/// Interval-overlap test between a candidate slot and an existing booking's
/// occupied interval `[start, buffer_until)`. Half-open on both sides:
/// touching endpoints do not conflict. Terminal bookings never conflict.
pub fn conflicts(candidate_start: NaiveDateTime, slot: TimeDelta, booking: &Booking) -> bool {
    if !booking.occupies() {
        return false;
    }
    let candidate_end = candidate_start + slot;
    candidate_start < booking.buffer_until_at() && candidate_end > booking.start_at()
}

/// Open start-times for a date.
///
/// Starts are generated at the slot granularity from `open` through the last
/// start that still completes by `close`; for the current date, starts
/// earlier than `now` are dropped; a start survives only if no occupied
/// interval conflicts and no block covers it.
///
/// The result is strictly ascending and duplicate-free by construction.
pub fn available_slots(
    date: NaiveDate,
    hours: &BusinessHours,
    policy: &PolicyConfig,
    bookings: &[Booking],
    blocks: &[BlockPeriod],
    now: NaiveDateTime,
) -> Vec<NaiveTime> {
    let mut open = Vec::new();
    if hours.open >= hours.close {
        return open;
    }

    let mut cursor = hours.open;
    loop {
        let Some(slot_end) = timeutil::add_minutes(cursor, policy.slot_minutes) else {
            break;
        };
        if slot_end > hours.close {
            break;
        }

        let start_at = timeutil::at(date, cursor);
        let free = start_at >= now
            && !blocks.iter().any(|b| b.date == date && b.covers(cursor))
            && !bookings.iter().any(|b| conflicts(start_at, policy.slot(), b));
        if free {
            open.push(cursor);
        }

        match timeutil::add_minutes(cursor, policy.slot_minutes) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    open
}
