//! In-memory snapshot and log storage held by the bridge.

use std::sync::Arc;
use std::time::Instant;

use crate::snapshot::{Baseline, ErrorRecord, LoggedEvent, Snapshot, TimestampMs};

/// Entries that carry an arrival timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> TimestampMs;
}

impl Timestamped for LoggedEvent {
    fn timestamp(&self) -> TimestampMs {
        self.timestamp
    }
}

impl Timestamped for ErrorRecord {
    fn timestamp(&self) -> TimestampMs {
        self.timestamp
    }
}

/// Append-only log with a fixed capacity.
///
/// When a push takes the log over capacity the oldest half of the buffer is dropped in a
/// single drain, so the log shrinks to roughly half and then grows again.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: Clone + Timestamped> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
        if self.items.len() > self.capacity {
            let drop = self.items.len() / 2;
            self.items.drain(..drop);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the log, optionally restricted to entries strictly newer than `since`.
    pub fn snapshot(&self, since: Option<TimestampMs>) -> Vec<T> {
        match since {
            Some(since) => self
                .items
                .iter()
                .filter(|item| item.timestamp() > since)
                .cloned()
                .collect(),
            None => self.items.clone(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// Latest snapshot, event/error logs and the saved baseline.
#[derive(Debug)]
pub struct StateStore {
    snapshot: Option<Arc<Snapshot>>,
    fetched_at: Option<Instant>,
    events: BoundedLog<LoggedEvent>,
    errors: BoundedLog<ErrorRecord>,
    baseline: Option<Arc<Baseline>>,
}

impl StateStore {
    pub fn new(event_capacity: usize, error_capacity: usize) -> Self {
        Self {
            snapshot: None,
            fetched_at: None,
            events: BoundedLog::new(event_capacity),
            errors: BoundedLog::new(error_capacity),
            baseline: None,
        }
    }

    pub fn set_snapshot(&mut self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.snapshot = Some(snapshot.clone());
        self.fetched_at = Some(Instant::now());
        snapshot
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.clone()
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn push_event(&mut self, event: LoggedEvent) {
        self.events.push(event);
    }

    pub fn push_error(&mut self, error: ErrorRecord) {
        self.errors.push(error);
    }

    pub fn events(&self, since: Option<TimestampMs>) -> Vec<LoggedEvent> {
        self.events.snapshot(since)
    }

    pub fn errors(&self, since: Option<TimestampMs>) -> Vec<ErrorRecord> {
        self.errors.snapshot(since)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Deep-copy the current snapshot as the baseline. Returns false if there is no snapshot.
    pub fn save_baseline(&mut self, saved_at: TimestampMs) -> bool {
        match &self.snapshot {
            Some(snapshot) => {
                self.baseline = Some(Arc::new(Baseline {
                    snapshot: Snapshot::clone(snapshot),
                    saved_at,
                }));
                true
            }
            None => false,
        }
    }

    pub fn baseline(&self) -> Option<Arc<Baseline>> {
        self.baseline.clone()
    }
}
