//! Clock event log: a bounded, cursor-free record of what the engine did.
//!
//! The writer lives inside the engine and is called from both the fire path
//! and the foreground, so emitting never blocks: when the channel is full the
//! event is dropped and counted.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use synclock_types::ClockEvent;

/// A single entry in the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Monotonically increasing sequence number.
    pub seq: u64,
    pub event: ClockEvent,
}

/// Maximum number of undrained entries before new ones are dropped.
pub(crate) const DEFAULT_CAPACITY: usize = 4096;

pub struct EventLogWriter {
    tx: Sender<EventRecord>,
    next_seq: AtomicU64,
    dropped: AtomicU64,
}

impl EventLogWriter {
    /// Create a paired (writer, reader).
    pub fn new() -> (Self, EventLogReader) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, EventLogReader) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let writer = Self {
            tx,
            next_seq: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (writer, EventLogReader { rx })
    }

    pub fn emit(&self, event: ClockEvent) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.tx.try_send(EventRecord { seq, event }) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::debug!(target: "clock::events", "event log full, dropped seq {}", record.seq);
            }
            // nobody is listening; not an error
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    /// Current sequence counter (next entry will get this seq).
    pub fn next_seq(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed)
    }

    /// Entries discarded because the reader fell behind.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub struct EventLogReader {
    rx: Receiver<EventRecord>,
}

impl EventLogReader {
    /// Take every entry currently queued, in order.
    pub fn drain(&self) -> Vec<EventRecord> {
        self.rx.try_iter().collect()
    }

    /// Like `drain`, without the sequence numbers.
    pub fn drain_events(&self) -> Vec<ClockEvent> {
        self.rx.try_iter().map(|r| r.event).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
