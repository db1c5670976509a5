//! Bounded, time-stamped log of user-visible pipeline events.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use shared::domain::{LogEntry, LogSeverity};

use crate::{EventSender, ForgeEvent};

pub const DEFAULT_LOG_CAPACITY: usize = 100;

pub struct LogStream {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    events: EventSender,
}

impl LogStream {
    pub fn new(events: EventSender) -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY, events)
    }

    pub fn with_capacity(capacity: usize, events: EventSender) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, message: impl Into<String>) -> LogEntry {
        self.append_with(LogSeverity::Info, message)
    }

    pub fn append_with(&self, severity: LogSeverity, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Utc::now(),
            severity,
            message: message.into(),
        };
        {
            let mut entries = self.lock();
            entries.push_back(entry.clone());
            while entries.len() > self.capacity {
                entries.pop_front();
            }
        }
        let _ = self.events.send(ForgeEvent::LogAppended(entry.clone()));
        entry
    }

    pub fn info(&self, message: impl Into<String>) -> LogEntry {
        self.append_with(LogSeverity::Info, message)
    }

    pub fn success(&self, message: impl Into<String>) -> LogEntry {
        self.append_with(LogSeverity::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> LogEntry {
        self.append_with(LogSeverity::Error, message)
    }

    pub fn clear(&self) {
        self.lock().clear();
        let _ = self.events.send(ForgeEvent::LogsCleared);
    }

    /// Oldest-first copy of the retained entries.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<LogEntry> {
        self.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
#[path = "tests/log_stream_tests.rs"]
mod tests;
