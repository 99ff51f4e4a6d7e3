use chrono::NaiveDateTime;
use ulid::Ulid;

use crate::config::PolicyConfig;
use crate::model::{BookingStatus, Caller};

use super::LedgerError;

/// The complete transition table. Terminal states have no exits.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Active, Confirmed)
            | (Active, Canceled)
            | (Confirmed, Canceled)
            | (Active, Completed)
            | (Confirmed, Completed)
    )
}

/// Guard for a requested transition, mapping illegal moves to the specific
/// error a caller can act on.
pub fn check_transition(
    id: Ulid,
    from: BookingStatus,
    to: BookingStatus,
) -> Result<(), LedgerError> {
    if can_transition(from, to) {
        return Ok(());
    }
    match from {
        BookingStatus::Completed => Err(LedgerError::AlreadyCompleted(id)),
        _ => Err(LedgerError::InvalidState { from, to }),
    }
}

/// Confirming is permitted only while `now ∈ [start − window, start)`.
pub fn check_confirm_window(
    start_at: NaiveDateTime,
    now: NaiveDateTime,
    policy: &PolicyConfig,
) -> Result<(), LedgerError> {
    if now >= start_at - policy.confirm_window() && now < start_at {
        Ok(())
    } else {
        Err(LedgerError::OutsideConfirmWindow)
    }
}

/// Cancellation gate. Admins may always cancel (terminality is checked by the
/// transition table, not here). Members may only cancel their own bookings,
/// and only while at least the configured lead time remains — the boundary
/// itself is allowed.
pub fn check_cancellation(
    caller: &Caller,
    owner: Ulid,
    start_at: NaiveDateTime,
    now: NaiveDateTime,
    policy: &PolicyConfig,
) -> Result<(), LedgerError> {
    let Caller::Member(member) = caller else {
        return Ok(());
    };
    if *member != owner {
        return Err(LedgerError::Forbidden);
    }
    if start_at - now >= policy.cancel_lead() {
        Ok(())
    } else {
        Err(LedgerError::PolicyViolation {
            lead_minutes: policy.cancel_lead_minutes,
        })
    }
}

/// Sweep predicate: an unconfirmed booking whose start is within the
/// confirmation deadline (or already past) must be auto-canceled.
pub fn past_confirm_deadline(
    status: BookingStatus,
    start_at: NaiveDateTime,
    now: NaiveDateTime,
    policy: &PolicyConfig,
) -> bool {
    status == BookingStatus::Active && start_at - now <= policy.confirm_deadline()
}

/// Sweep predicate: a live booking whose buffer has fully elapsed is done.
pub fn ready_to_complete(
    status: BookingStatus,
    buffer_until_at: NaiveDateTime,
    now: NaiveDateTime,
) -> bool {
    status.occupies() && buffer_until_at <= now
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 9, 1)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, m, s).unwrap())
    }

    #[test]
    fn transition_table_is_exhaustive() {
        use BookingStatus::*;
        let all = [Active, Confirmed, Completed, Canceled];
        for from in all {
            for to in all {
                let allowed = can_transition(from, to);
                match (from, to) {
                    (Active, Confirmed)
                    | (Active, Canceled)
                    | (Active, Completed)
                    | (Confirmed, Canceled)
                    | (Confirmed, Completed) => assert!(allowed, "{from} -> {to}"),
                    _ => assert!(!allowed, "{from} -> {to} must be refused"),
                }
            }
        }
    }

    #[test]
    fn terminal_states_map_to_specific_errors() {
        use BookingStatus::*;
        let id = Ulid::new();
        assert!(matches!(
            check_transition(id, Completed, Canceled),
            Err(LedgerError::AlreadyCompleted(got)) if got == id
        ));
        assert!(matches!(
            check_transition(id, Canceled, Confirmed),
            Err(LedgerError::InvalidState {
                from: Canceled,
                to: Confirmed
            })
        ));
    }

    #[test]
    fn confirm_window_bounds() {
        let policy = PolicyConfig::default(); // window 45 min
        let start = at(14, 0, 0);

        assert!(check_confirm_window(start, at(13, 15, 0), &policy).is_ok()); // opens exactly
        assert!(check_confirm_window(start, at(13, 59, 59), &policy).is_ok());
        assert!(check_confirm_window(start, at(13, 14, 59), &policy).is_err()); // too early
        assert!(check_confirm_window(start, at(14, 0, 0), &policy).is_err()); // start itself
    }

    #[test]
    fn cancellation_boundary_is_inclusive() {
        let policy = PolicyConfig::default(); // lead 30 min
        let owner = Ulid::new();
        let caller = Caller::Member(owner);
        let start = at(14, 0, 0);

        // Exactly at the threshold: allowed.
        assert!(check_cancellation(&caller, owner, start, at(13, 30, 0), &policy).is_ok());
        // One second inside: refused.
        assert!(matches!(
            check_cancellation(&caller, owner, start, at(13, 30, 1), &policy),
            Err(LedgerError::PolicyViolation { lead_minutes: 30 })
        ));
    }

    #[test]
    fn cancellation_of_foreign_booking_forbidden() {
        let policy = PolicyConfig::default();
        let caller = Caller::Member(Ulid::new());
        let owner = Ulid::new();
        assert!(matches!(
            check_cancellation(&caller, owner, at(14, 0, 0), at(9, 0, 0), &policy),
            Err(LedgerError::Forbidden)
        ));
    }

    #[test]
    fn admin_ignores_lead_time_and_ownership() {
        let policy = PolicyConfig::default();
        // One minute before start, someone else's booking.
        assert!(
            check_cancellation(&Caller::Admin, Ulid::new(), at(14, 0, 0), at(13, 59, 0), &policy)
                .is_ok()
        );
    }

    #[test]
    fn deadline_predicate_matches_sweep_scenario() {
        let policy = PolicyConfig::default(); // deadline 30 min
        let start = at(14, 0, 0);

        // 29 minutes out: sweep must cancel.
        assert!(past_confirm_deadline(BookingStatus::Active, start, at(13, 31, 0), &policy));
        // 31 minutes out: leave it alone.
        assert!(!past_confirm_deadline(BookingStatus::Active, start, at(13, 29, 0), &policy));
        // Already confirmed: never auto-canceled.
        assert!(!past_confirm_deadline(BookingStatus::Confirmed, start, at(13, 31, 0), &policy));
    }

    #[test]
    fn completion_predicate() {
        let buffer_until = at(11, 10, 0);
        assert!(ready_to_complete(BookingStatus::Active, buffer_until, at(11, 10, 0)));
        assert!(ready_to_complete(BookingStatus::Confirmed, buffer_until, at(12, 0, 0)));
        assert!(!ready_to_complete(BookingStatus::Confirmed, buffer_until, at(11, 9, 59)));
        assert!(!ready_to_complete(BookingStatus::Canceled, buffer_until, at(12, 0, 0)));
    }
}
