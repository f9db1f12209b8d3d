//! Operator-visible status channel
//!
//! The pipeline's own problems (failed writes, panicking handlers, sinks that
//! cannot be opened) cannot be logged through the pipeline itself. They are
//! reported here instead: kept in a bounded history, echoed to stderr above a
//! threshold, and fanned out to subscribers.

use super::level::Level;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_STATUS_HISTORY: usize = 200;
const SUBSCRIBER_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub level: Level,
    pub component: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.level {
            Level::Fatal | Level::Error => "[LOGGER ERROR]",
            Level::Warn => "[LOGGER WARNING]",
            _ => "[LOGGER]",
        };
        write!(f, "{} {}: {}", prefix, self.component, self.message)
    }
}

pub struct StatusLogger {
    history: Mutex<VecDeque<StatusEntry>>,
    max_history: usize,
    /// Entries at least this specific are echoed to stderr.
    echo_level: Level,
    subscribers: Mutex<Vec<Sender<StatusEntry>>>,
}

impl StatusLogger {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_STATUS_HISTORY, Level::Warn)
    }

    /// A status logger that never writes to stderr.
    pub fn silent() -> Self {
        Self::with_settings(DEFAULT_STATUS_HISTORY, Level::Off)
    }

    pub fn with_settings(max_history: usize, echo_level: Level) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(max_history.min(1024))),
            max_history: max_history.max(1),
            echo_level,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn log(&self, level: Level, component: impl Into<String>, message: impl Into<String>) {
        let entry = StatusEntry {
            level,
            component: component.into(),
            message: message.into(),
            timestamp: Utc::now(),
        };

        if self.echo_level != Level::Off && level.is_at_least_as_specific_as(self.echo_level) {
            eprintln!("{}", entry);
        }

        {
            let mut subscribers = self.subscribers.lock();
            subscribers.retain(|tx| match tx.try_send(entry.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
        }

        let mut history = self.history.lock();
        if history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(entry);
    }

    pub fn error(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(Level::Error, component, message);
    }

    pub fn warn(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(Level::Warn, component, message);
    }

    pub fn info(&self, component: impl Into<String>, message: impl Into<String>) {
        self.log(Level::Info, component, message);
    }

    /// Receive every entry logged from now on.
    ///
    /// A subscriber that falls behind loses entries rather than slowing the
    /// reporter down.
    pub fn subscribe(&self) -> Receiver<StatusEntry> {
        let (tx, rx) = bounded(SUBSCRIBER_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn entries(&self) -> Vec<StatusEntry> {
        self.history.lock().iter().cloned().collect()
    }

    /// Number of retained entries at least as specific as `level`.
    pub fn count_at_least(&self, level: Level) -> usize {
        self.history
            .lock()
            .iter()
            .filter(|e| e.level.is_at_least_as_specific_as(level))
            .count()
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

impl Default for StatusLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatusLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusLogger")
            .field("entries", &self.history.lock().len())
            .field("echo_level", &self.echo_level)
            .finish()
    }
}
