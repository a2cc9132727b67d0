//! Telemetry Sink
//!
//! Bounded in-memory log of filtering decisions, read by the network
//! inspector. Oldest entries are evicted first.

use crate::resource::ResourceKind;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default number of retained records
pub const DEFAULT_CAPACITY: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Allowed,
    Blocked,
}

/// One intercepted request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestRecord {
    pub url: String,
    pub kind: ResourceKind,
    pub verdict: Verdict,
    pub initiator: String,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl RequestRecord {
    pub fn new(url: impl Into<String>, kind: ResourceKind, verdict: Verdict, initiator: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            url: url.into(),
            kind,
            verdict,
            initiator: initiator.into(),
            timestamp_ms,
        }
    }
}

pub struct TelemetrySink {
    records: Mutex<VecDeque<RequestRecord>>,
    capacity: usize,
    recording: AtomicBool,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Sink retaining at most `capacity` records (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            recording: AtomicBool::new(true),
        }
    }

    /// Append a record, evicting the oldest when full. No-op while
    /// recording is off.
    pub fn record(&self, entry: RequestRecord) {
        if !self.is_recording() {
            return;
        }
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(entry);
    }

    /// Copy of all records, most recent last
    pub fn snapshot(&self) -> Vec<RequestRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_recording(&self, enabled: bool) {
        self.recording.store(enabled, Ordering::Relaxed);
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }
}

impl Default for TelemetrySink {
    fn default() -> Self {
        Self::new()
    }
}
