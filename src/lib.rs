//! reservd — an in-memory studio reservation engine with an append-only
//! journal for durability.
//!
//! State lives in a [`ledger::Ledger`]: bookings in fixed-length slots with a
//! mandatory buffer, administrative block periods, and business hours. Every
//! mutation is journaled before it is applied, so a restart replays the
//! journal back to the exact pre-crash state. A background sweeper moves
//! bookings through their lifecycle (auto-cancel of unconfirmed ones,
//! auto-complete of elapsed ones) and compacts the journal.

pub mod config;
pub mod journal;
pub mod ledger;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod sweep;
pub mod timeutil;

pub use config::{BusinessHours, PolicyConfig};
pub use ledger::{Ledger, LedgerError, Obstacle};
pub use model::{BlockPeriod, Booking, BookingStatus, Caller, ReminderKind, SweepReport};
pub use notify::{Notifier, TracingNotifier};
pub use sweep::{spawn_sweeper, SweepHandle};
