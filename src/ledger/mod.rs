mod error;
mod lifecycle;
mod mutations;
mod queries;
mod quota;
mod slots;

pub use error::{LedgerError, Obstacle};
pub use slots::{available_slots, conflicts};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use ulid::Ulid;

use crate::config::{BusinessHours, PolicyConfig};
use crate::journal::Journal;
use crate::model::*;
use crate::notify::Notifier;

pub type SharedBooking = Arc<RwLock<Booking>>;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
    #[cfg(test)]
    FailNextAppends { count: u32 },
}

/// Background task that owns the journal and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            JournalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(JournalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut journal, &mut batch);
                            handle_non_append(&mut journal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut journal, &mut batch);
                }
            }
            other => handle_non_append(&mut journal, other),
        }
    }
}

fn flush_and_respond(
    journal: &mut Journal,
    batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>,
) {
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(journal, batch);
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    journal: &mut Journal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = journal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = journal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Compact { events, response } => {
            let result = Journal::write_compact_file(journal.path(), &events)
                .and_then(|()| journal.swap_compact_file());
            let _ = response.send(result);
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        #[cfg(test)]
        JournalCommand::FailNextAppends { count } => journal.fail_next_appends(count),
        JournalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking ledger — the single logical authority over reservations,
/// blocks, and business hours.
pub struct Ledger {
    bookings: DashMap<Ulid, SharedBooking>,
    /// Date → booking ids (all statuses; readers filter).
    by_date: DashMap<NaiveDate, Vec<Ulid>>,
    /// Subject → booking ids.
    by_subject: DashMap<Ulid, Vec<Ulid>>,
    blocks: DashMap<Ulid, BlockPeriod>,
    hours: RwLock<BusinessHours>,
    pub(super) policy: PolicyConfig,
    /// Serializes slot-check + insert per calendar day so two concurrent
    /// creations cannot both claim the same slot.
    day_locks: DashMap<NaiveDate, Arc<Mutex<()>>>,
    /// Mutations hold this for read across their journal append and in-memory
    /// apply; compaction holds it for write across snapshot and file swap, so
    /// no transition can land in the old file after being snapshotted.
    /// Lock order: `commit_lock` before any booking write lock.
    commit_lock: RwLock<()>,
    journal_tx: mpsc::Sender<JournalCommand>,
    pub(super) notifier: Arc<dyn Notifier>,
}

impl Ledger {
    /// Recover the ledger from the journal at `journal_path` (creating it if
    /// absent) and start the group-commit writer.
    pub fn open(
        journal_path: PathBuf,
        hours: BusinessHours,
        policy: PolicyConfig,
        notifier: Arc<dyn Notifier>,
    ) -> io::Result<Self> {
        policy
            .validate()
            .map_err(|msg| io::Error::new(io::ErrorKind::InvalidInput, msg))?;

        let events = Journal::replay(&journal_path)?;
        let journal = Journal::open(&journal_path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let ledger = Self {
            bookings: DashMap::new(),
            by_date: DashMap::new(),
            by_subject: DashMap::new(),
            blocks: DashMap::new(),
            hours: RwLock::new(hours),
            policy,
            day_locks: DashMap::new(),
            commit_lock: RwLock::new(()),
            journal_tx,
            notifier,
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly. Never use blocking_write here because open()
        // may run inside an async context.
        for event in &events {
            ledger.apply_replayed(event);
        }

        Ok(ledger)
    }

    fn apply_replayed(&self, event: &Event) {
        match event {
            Event::BookingCreated { .. } => self.insert_booking(event),
            Event::BookingConfirmed { id, .. } => {
                if let Some(shared) = self.get_shared(id) {
                    let mut b = shared.try_write().expect("replay: uncontended write");
                    b.status = BookingStatus::Confirmed;
                }
            }
            Event::BookingCanceled { id, reason, at } => {
                if let Some(shared) = self.get_shared(id) {
                    let mut b = shared.try_write().expect("replay: uncontended write");
                    b.status = BookingStatus::Canceled;
                    b.canceled_reason = reason.clone();
                    b.canceled_at = Some(*at);
                }
            }
            Event::BookingCompleted { id, .. } => {
                if let Some(shared) = self.get_shared(id) {
                    let mut b = shared.try_write().expect("replay: uncontended write");
                    b.status = BookingStatus::Completed;
                }
            }
            Event::BlockAdded {
                id,
                date,
                window,
                reason,
            } => {
                self.blocks.insert(
                    *id,
                    BlockPeriod {
                        id: *id,
                        date: *date,
                        window: *window,
                        reason: reason.clone(),
                    },
                );
            }
            Event::BlockRemoved { id } => {
                self.blocks.remove(id);
            }
            Event::HoursUpdated { open, close } => {
                let mut hours = self.hours.try_write().expect("replay: uncontended write");
                hours.open = *open;
                hours.close = *close;
            }
        }
    }

    /// Materialize a `BookingCreated` event into the ledger and its indexes.
    pub(super) fn insert_booking(&self, event: &Event) {
        let Event::BookingCreated {
            id,
            org_id,
            subject_id,
            date,
            start,
            end,
            buffer_until,
            created_at,
            devices,
        } = event
        else {
            unreachable!("insert_booking only accepts BookingCreated");
        };
        let booking = Booking {
            id: *id,
            org_id: *org_id,
            subject_id: *subject_id,
            date: *date,
            start: *start,
            end: *end,
            buffer_until: *buffer_until,
            status: BookingStatus::Active,
            created_at: *created_at,
            canceled_reason: None,
            canceled_at: None,
            devices: devices.clone(),
        };
        self.by_date.entry(*date).or_default().push(*id);
        self.by_subject.entry(*subject_id).or_default().push(*id);
        self.bookings.insert(*id, Arc::new(RwLock::new(booking)));
    }

    pub(super) fn get_shared(&self, id: &Ulid) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub(super) fn day_lock(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        self.day_locks.entry(date).or_default().clone()
    }

    /// Guard a journal-append plus its in-memory apply against a concurrent
    /// compaction. Acquire before taking any booking write lock.
    pub(super) async fn commit_guard(&self) -> tokio::sync::RwLockReadGuard<'_, ()> {
        self.commit_lock.read().await
    }

    pub(super) fn block_snapshot(&self, date: NaiveDate) -> Vec<BlockPeriod> {
        let mut blocks: Vec<BlockPeriod> = self
            .blocks
            .iter()
            .filter(|e| e.value().date == date)
            .map(|e| e.value().clone())
            .collect();
        blocks.sort_by_key(|b| (b.window.map(|(s, _)| s), b.id));
        blocks
    }

    pub(super) fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub(super) fn insert_block(&self, block: BlockPeriod) {
        self.blocks.insert(block.id, block);
    }

    pub(super) fn contains_block(&self, id: &Ulid) -> bool {
        self.blocks.contains_key(id)
    }

    pub(super) fn delete_block(&self, id: &Ulid) {
        self.blocks.remove(id);
    }

    pub async fn business_hours(&self) -> BusinessHours {
        *self.hours.read().await
    }

    pub(super) async fn set_hours(&self, open: chrono::NaiveTime, close: chrono::NaiveTime) {
        let mut hours = self.hours.write().await;
        hours.open = open;
        hours.close = close;
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Write an event via the background group-commit writer.
    pub(super) async fn journal_append(&self, event: &Event) -> Result<(), LedgerError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| LedgerError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| LedgerError::Journal("journal writer dropped response".into()))?
            .map_err(|e| LedgerError::Journal(e.to_string()))
    }

    /// Rewrite the journal with only the events needed to recreate current
    /// state: hours, live blocks, and every booking with its final status.
    ///
    /// Holds `commit_lock` for write for the whole snapshot + swap, so a
    /// transition committed mid-compaction cannot be appended to the old file
    /// and lost in the rename.
    pub async fn compact_journal(&self) -> Result<(), LedgerError> {
        let _commits_paused = self.commit_lock.write().await;
        let mut events = Vec::new();

        let hours = self.business_hours().await;
        events.push(Event::HoursUpdated {
            open: hours.open,
            close: hours.close,
        });

        for entry in self.blocks.iter() {
            let b = entry.value();
            events.push(Event::BlockAdded {
                id: b.id,
                date: b.date,
                window: b.window,
                reason: b.reason.clone(),
            });
        }

        for entry in self.bookings.iter() {
            let shared = entry.value().clone();
            let b = shared.read().await.clone();
            events.push(Event::BookingCreated {
                id: b.id,
                org_id: b.org_id,
                subject_id: b.subject_id,
                date: b.date,
                start: b.start,
                end: b.end,
                buffer_until: b.buffer_until,
                created_at: b.created_at,
                devices: b.devices.clone(),
            });
            match b.status {
                BookingStatus::Active => {}
                BookingStatus::Confirmed => events.push(Event::BookingConfirmed {
                    id: b.id,
                    at: b.created_at,
                }),
                BookingStatus::Completed => events.push(Event::BookingCompleted {
                    id: b.id,
                    at: b.buffer_until_at(),
                }),
                BookingStatus::Canceled => events.push(Event::BookingCanceled {
                    id: b.id,
                    reason: b.canceled_reason.clone(),
                    at: b.canceled_at.unwrap_or(b.created_at),
                }),
            }
        }

        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| LedgerError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| LedgerError::Journal("journal writer dropped response".into()))?
            .map_err(|e| LedgerError::Journal(e.to_string()))
    }

    /// Make the journal refuse the next `count` appends.
    #[cfg(test)]
    pub(super) async fn inject_journal_fault(&self, count: u32) {
        let _ = self
            .journal_tx
            .send(JournalCommand::FailNextAppends { count })
            .await;
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .journal_tx
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
