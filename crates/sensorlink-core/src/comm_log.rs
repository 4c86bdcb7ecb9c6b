//! Communication log
//!
//! Timestamped record of every protocol event, shown to the user as the
//! "Communication Log". Entries are also mirrored to `tracing` and broadcast
//! to any subscriber so a front end can render them live.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::protocol::format_hex;

/// Entries kept before the oldest are dropped
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

const SUBSCRIBER_BUFFER: usize = 256;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// A single line of the communication log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Local wall-clock time the event was recorded
    pub timestamp: DateTime<Local>,
    /// Severity
    pub level: LogLevel,
    /// Message text
    pub message: String,
    /// Raw frame bytes involved, if any
    pub raw: Option<Vec<u8>>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)?;
        if let Some(raw) = &self.raw {
            write!(f, " {}", format_hex(raw))?;
        }
        Ok(())
    }
}

struct LogInner {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    sender: broadcast::Sender<LogEntry>,
}

/// Shared handle to the communication log. Clones refer to the same log.
#[derive(Clone)]
pub struct CommunicationLog {
    inner: Arc<LogInner>,
}

impl Default for CommunicationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl fmt::Debug for CommunicationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommunicationLog")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl CommunicationLog {
    /// Create a log holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            inner: Arc::new(LogInner {
                entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
                capacity,
                sender,
            }),
        }
    }

    fn entries_guard(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry and notify subscribers
    pub fn record(&self, level: LogLevel, message: impl Into<String>, raw: Option<&[u8]>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
            raw: raw.map(<[u8]>::to_vec),
        };

        match level {
            LogLevel::Info => tracing::info!(target: "sensorlink::comm", "{}", entry.message),
            LogLevel::Warning => tracing::warn!(target: "sensorlink::comm", "{}", entry.message),
            LogLevel::Error => tracing::error!(target: "sensorlink::comm", "{}", entry.message),
        }

        {
            let mut entries = self.entries_guard();
            if entries.len() == self.inner.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        // No subscribers is fine
        let _ = self.inner.sender.send(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.record(LogLevel::Warning, message, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message, None);
    }

    /// Snapshot of all retained entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries_guard().iter().cloned().collect()
    }

    /// Number of retained entries at the given level
    pub fn count(&self, level: LogLevel) -> usize {
        self.entries_guard()
            .iter()
            .filter(|e| e.level == level)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all retained entries. Subscribers are unaffected.
    pub fn clear(&self) {
        self.entries_guard().clear();
    }

    /// Receive every entry recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.inner.sender.subscribe()
    }
}
