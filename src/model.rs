use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::timeutil;

/// Booking lifecycle state. `Active` means created but not yet confirmed
/// by the subject. `Completed` and `Canceled` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Active,
    Confirmed,
    Completed,
    Canceled,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Canceled)
    }

    /// Whether a booking in this state keeps its time slot occupied.
    pub fn occupies(&self) -> bool {
        matches!(self, BookingStatus::Active | BookingStatus::Confirmed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single reservation of the studio.
///
/// `end` and `buffer_until` are derived from `start` at creation time
/// (`end = start + slot`, `buffer_until = end + buffer`) and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub org_id: Ulid,
    pub subject_id: Ulid,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub buffer_until: NaiveTime,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    pub canceled_reason: Option<String>,
    pub canceled_at: Option<NaiveDateTime>,
    pub devices: Vec<String>,
}

impl Booking {
    pub fn occupies(&self) -> bool {
        self.status.occupies()
    }

    /// Start of the booking as a local instant.
    pub fn start_at(&self) -> NaiveDateTime {
        timeutil::at(self.date, self.start)
    }

    /// End of the post-booking buffer as a local instant. The resource
    /// counts as free again only from this point.
    pub fn buffer_until_at(&self) -> NaiveDateTime {
        timeutil::at(self.date, self.buffer_until)
    }

    pub fn duration_minutes(&self) -> u32 {
        (self.end - self.start).num_minutes() as u32
    }
}

/// Administrative block: the studio is unavailable on `date`, either for the
/// whole day (`window == None`) or for a half-open `[start, end)` sub-range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPeriod {
    pub id: Ulid,
    pub date: NaiveDate,
    pub window: Option<(NaiveTime, NaiveTime)>,
    pub reason: String,
}

impl BlockPeriod {
    /// Whether a slot starting at `t` falls inside this block.
    pub fn covers(&self, t: NaiveTime) -> bool {
        match self.window {
            None => true,
            Some((start, end)) => start <= t && t < end,
        }
    }
}

/// Who is asking. Admins bypass quota and cancellation lead time and may act
/// on any subject's booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Member(Ulid),
    Admin,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin)
    }
}

/// Reminder intents handed to the notification collaborator. Fire times are
/// recomputed from the booking start, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    /// The confirmation window has opened.
    ConfirmWindowOpen,
    /// Last chance before the sweep auto-cancels the booking.
    FinalWarning,
}

/// The event types — flat, no nesting. This is the journal record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        id: Ulid,
        org_id: Ulid,
        subject_id: Ulid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        buffer_until: NaiveTime,
        created_at: NaiveDateTime,
        devices: Vec<String>,
    },
    BookingConfirmed {
        id: Ulid,
        at: NaiveDateTime,
    },
    BookingCanceled {
        id: Ulid,
        reason: Option<String>,
        at: NaiveDateTime,
    },
    BookingCompleted {
        id: Ulid,
        at: NaiveDateTime,
    },
    BlockAdded {
        id: Ulid,
        date: NaiveDate,
        window: Option<(NaiveTime, NaiveTime)>,
        reason: String,
    },
    BlockRemoved {
        id: Ulid,
    },
    HoursUpdated {
        open: NaiveTime,
        close: NaiveTime,
    },
}

/// Outcome of one sweep pass over the ledger.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub auto_canceled: usize,
    pub auto_completed: usize,
    /// Per-record failures; the pass continues past them.
    pub errors: Vec<(Ulid, String)>,
}

impl SweepReport {
    pub fn transitions(&self) -> usize {
        self.auto_canceled + self.auto_completed
    }
}
