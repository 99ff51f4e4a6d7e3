//! The single place where calendar dates and times-of-day are combined into
//! instants. All overlap and buffer arithmetic goes through these helpers so
//! every call site agrees on the conversion.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

/// Combine a calendar date and a time-of-day into a local instant.
pub fn at(date: NaiveDate, time: NaiveTime) -> NaiveDateTime {
    date.and_time(time)
}

/// Add `minutes` to a time-of-day without wrapping past midnight.
/// Returns `None` if the result would land on or after 24:00.
pub fn add_minutes(time: NaiveTime, minutes: u32) -> Option<NaiveTime> {
    let total = time.num_seconds_from_midnight() + minutes * 60;
    if total >= 86_400 {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt(total, 0)
}

/// Whole minutes between `open` and `time` (negative if `time` is earlier).
pub fn minutes_from(open: NaiveTime, time: NaiveTime) -> i64 {
    (time - open).num_minutes()
}

/// Current wall-clock time. Bookings are calendar-local; the ledger has no
/// timezone of its own.
pub fn now_local() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub fn minutes(n: u32) -> TimeDelta {
    TimeDelta::minutes(n as i64)
}
