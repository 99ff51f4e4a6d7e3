use ulid::Ulid;

use crate::model::BookingStatus;

/// What, specifically, is sitting on a requested slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obstacle {
    Booking(Ulid),
    Block(Ulid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed date, time, or duration.
    Validation(&'static str),
    /// The requested slot is taken or blocked.
    SlotUnavailable(Obstacle),
    /// The organization's daily ceiling would be exceeded.
    QuotaExceeded {
        reserved_minutes: u32,
        ceiling_minutes: u32,
    },
    /// Member cancellation too close to the start.
    PolicyViolation { lead_minutes: u32 },
    /// Acting on another subject's booking without privilege.
    Forbidden,
    /// Confirmation attempted outside `[start - window, start)`.
    OutsideConfirmWindow,
    /// Mutation of a booking that already ran to completion.
    AlreadyCompleted(Ulid),
    /// Transition not permitted from the booking's current status.
    InvalidState {
        from: BookingStatus,
        to: BookingStatus,
    },
    NotFound(Ulid),
    LimitExceeded(&'static str),
    Journal(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "invalid request: {msg}"),
            LedgerError::SlotUnavailable(Obstacle::Booking(id)) => {
                write!(f, "slot unavailable: conflicts with booking {id}")
            }
            LedgerError::SlotUnavailable(Obstacle::Block(id)) => {
                write!(f, "slot unavailable: blocked by administrator ({id})")
            }
            LedgerError::QuotaExceeded {
                reserved_minutes,
                ceiling_minutes,
            } => write!(
                f,
                "daily quota exceeded: {reserved_minutes} of {ceiling_minutes} minutes already reserved"
            ),
            LedgerError::PolicyViolation { lead_minutes } => write!(
                f,
                "cancellation refused: less than {lead_minutes} minutes before start"
            ),
            LedgerError::Forbidden => write!(f, "not your booking"),
            LedgerError::OutsideConfirmWindow => {
                write!(f, "confirmation is only possible inside its window")
            }
            LedgerError::AlreadyCompleted(id) => {
                write!(f, "booking {id} already completed")
            }
            LedgerError::InvalidState { from, to } => {
                write!(f, "cannot move a {from} booking to {to}")
            }
            LedgerError::NotFound(id) => write!(f, "not found: {id}"),
            LedgerError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            LedgerError::Journal(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for LedgerError {}
