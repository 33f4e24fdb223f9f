//! Client-side notification feed fed by `error` / `success` frames.

use ringbuffer::{AllocRingBuffer, RingBuffer};

pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    pub message: String,
    pub is_error: bool,
}

/// Append-only log that keeps the most recent `capacity` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    entries: AllocRingBuffer<EventLogEntry>,
}

impl EventLog {
    /// A zero capacity is clamped to one entry.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: AllocRingBuffer::new(capacity.max(1)),
        }
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.entries.push(EventLogEntry {
            message: message.into(),
            is_error: true,
        });
    }

    pub fn push_success(&mut self, message: impl Into<String>) {
        self.entries.push(EventLogEntry {
            message: message.into(),
            is_error: false,
        });
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&EventLogEntry> {
        self.entries.back()
    }

    pub fn to_vec(&self) -> Vec<EventLogEntry> {
        self.entries.to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}
