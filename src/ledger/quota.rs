use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{Booking, Caller};

use super::LedgerError;

/// Minutes an organization has reserved on a date. Only Active/Confirmed
/// bookings count; the quota is a derived value, never stored.
pub fn reserved_minutes(bookings: &[Booking], org_id: Ulid, date: NaiveDate) -> u32 {
    bookings
        .iter()
        .filter(|b| b.org_id == org_id && b.date == date && b.occupies())
        .map(Booking::duration_minutes)
        .sum()
}

/// Reject a non-privileged creation that would push the organization past
/// its daily ceiling. Admins bypass entirely.
pub fn check_quota(
    caller: &Caller,
    reserved: u32,
    requested: u32,
    ceiling: u32,
) -> Result<(), LedgerError> {
    if caller.is_admin() {
        return Ok(());
    }
    if reserved + requested > ceiling {
        return Err(LedgerError::QuotaExceeded {
            reserved_minutes: reserved,
            ceiling_minutes: ceiling,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
    }

    fn booking(org_id: Ulid, date: NaiveDate, start_h: u32, status: BookingStatus) -> Booking {
        Booking {
            id: Ulid::new(),
            org_id,
            subject_id: Ulid::new(),
            date,
            start: t(start_h, 0),
            end: t(start_h + 1, 0),
            buffer_until: t(start_h + 1, 10),
            status,
            created_at: date.and_time(t(7, 0)),
            canceled_reason: None,
            canceled_at: None,
            devices: vec![],
        }
    }

    #[test]
    fn sums_only_live_bookings_of_org_and_date() {
        let org = Ulid::new();
        let other_org = Ulid::new();
        let other_day = NaiveDate::from_ymd_opt(2026, 9, 2).unwrap();
        let bookings = vec![
            booking(org, day(), 9, BookingStatus::Active),
            booking(org, day(), 11, BookingStatus::Confirmed),
            booking(org, day(), 13, BookingStatus::Canceled), // excluded
            booking(org, other_day, 9, BookingStatus::Active), // excluded
            booking(other_org, day(), 15, BookingStatus::Active), // excluded
        ];
        assert_eq!(reserved_minutes(&bookings, org, day()), 120);
    }

    #[test]
    fn ceiling_is_inclusive() {
        let member = Caller::Member(Ulid::new());
        // 120 reserved + 60 requested == 180 ceiling: allowed.
        assert!(check_quota(&member, 120, 60, 180).is_ok());
        // One more slot would cross it.
        assert!(matches!(
            check_quota(&member, 180, 60, 180),
            Err(LedgerError::QuotaExceeded {
                reserved_minutes: 180,
                ceiling_minutes: 180
            })
        ));
    }

    #[test]
    fn admin_bypasses_quota() {
        assert!(check_quota(&Caller::Admin, 600, 60, 180).is_ok());
    }
}
