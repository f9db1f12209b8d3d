//! Appender trait for event destinations, and the set the dispatcher drives

use super::dispatcher::{panic_message, EventHandler};
use super::error::{LoggerError, Result};
use super::event::EventSlot;
use super::filter::{Filter, FilterChain, FilterResult};
use super::formatter::Formatter;
use super::registry::ManagerHandle;
use super::status::StatusLogger;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

pub trait Appender: Send + Sync {
    /// Render and write one event. `end_of_batch` is forwarded to the
    /// output manager unchanged.
    fn append(&mut self, event: &EventSlot, end_of_batch: bool) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn name(&self) -> &str;

    /// Appender-level filter; a `Deny` skips this appender only.
    fn filter(&self) -> Option<&FilterChain> {
        None
    }

    /// Final flush before the appender is dropped.
    fn stop(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Formatter + manager pair shared by the built-in appenders.
///
/// Each event is formatted into a scratch buffer reused across calls, then
/// handed to the manager in one write.
pub struct ManagedOutput {
    name: String,
    handle: ManagerHandle,
    formatter: Arc<dyn Formatter>,
    filter: Option<FilterChain>,
    scratch: Vec<u8>,
}

impl ManagedOutput {
    pub fn new(
        name: impl Into<String>,
        handle: ManagerHandle,
        formatter: Arc<dyn Formatter>,
    ) -> Self {
        Self {
            name: name.into(),
            handle,
            formatter,
            filter: None,
            scratch: Vec::with_capacity(512),
        }
    }

    pub fn set_filter(&mut self, filter: Option<FilterChain>) {
        self.filter = filter.filter(|chain| !chain.is_empty());
    }

    pub fn handle(&self) -> &ManagerHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> Option<&FilterChain> {
        self.filter.as_ref()
    }

    pub fn append(&mut self, event: &EventSlot, end_of_batch: bool) -> Result<()> {
        self.scratch.clear();
        if let Err(e) = self.formatter.format(event, end_of_batch, &mut self.scratch) {
            // the batch still ends here
            if end_of_batch {
                self.handle.flush()?;
            }
            return Err(e);
        }
        self.handle.write(&self.scratch, end_of_batch)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.handle.flush()
    }
}

/// Every appender of one logger, driven by the dispatcher (or by the caller
/// thread in synchronous mode).
///
/// Appenders are isolated from each other: an error or panic in one is
/// reported and the rest still receive the event.
pub struct AppenderSet {
    appenders: Vec<Box<dyn Appender>>,
    status: Arc<StatusLogger>,
}

impl AppenderSet {
    pub fn new(appenders: Vec<Box<dyn Appender>>, status: Arc<StatusLogger>) -> Self {
        Self { appenders, status }
    }

    pub fn len(&self) -> usize {
        self.appenders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appenders.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.appenders.iter().map(|a| a.name().to_string()).collect()
    }

    /// Deliver one event to every appender whose filter admits it.
    ///
    /// An appender that denies the last event of a batch is flushed instead,
    /// so bytes buffered from earlier events still go out. Returns an error
    /// naming how many appenders failed.
    pub fn deliver(&mut self, event: &EventSlot, end_of_batch: bool) -> Result<()> {
        let mut failed = 0;

        for appender in self.appenders.iter_mut() {
            let denied = appender
                .filter()
                .is_some_and(|f| f.filter_event(event) == FilterResult::Deny);
            if denied && !end_of_batch {
                continue;
            }

            let (action, result) = if denied {
                ("flush", catch_unwind(AssertUnwindSafe(|| appender.flush())))
            } else {
                let appended =
                    catch_unwind(AssertUnwindSafe(|| appender.append(event, end_of_batch)));
                ("append event", appended)
            };
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.status.error(
                        appender.name().to_string(),
                        format!("failed to {}: {}", action, e),
                    );
                    failed += 1;
                }
                Err(panic) => {
                    self.status.error(
                        appender.name().to_string(),
                        format!(
                            "panicked during {}: {}. Other appenders continue to function.",
                            action,
                            panic_message(&*panic)
                        ),
                    );
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            Err(LoggerError::writer(format!(
                "{} of {} appenders failed",
                failed,
                self.appenders.len()
            )))
        } else {
            Ok(())
        }
    }

    /// Flush every appender, returning the first error.
    pub fn flush(&mut self) -> Result<()> {
        let mut first_error = None;
        for appender in self.appenders.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| appender.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.status
                        .error(appender.name().to_string(), format!("flush failed: {}", e));
                    first_error.get_or_insert(e);
                }
                Err(panic) => {
                    let message = panic_message(&*panic);
                    self.status.error(
                        appender.name().to_string(),
                        format!("panicked during flush: {}", message),
                    );
                    first_error.get_or_insert(LoggerError::writer(message));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Stop and drop every appender, releasing their managers.
    pub fn stop(&mut self) -> Result<()> {
        let mut first_error = None;
        for mut appender in self.appenders.drain(..) {
            match catch_unwind(AssertUnwindSafe(|| appender.stop())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.status
                        .error(appender.name().to_string(), format!("stop failed: {}", e));
                    first_error.get_or_insert(e);
                }
                Err(panic) => {
                    let message = panic_message(&*panic);
                    self.status.error(
                        appender.name().to_string(),
                        format!("panicked during stop: {}", message),
                    );
                    first_error.get_or_insert(LoggerError::writer(message));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl EventHandler for AppenderSet {
    fn on_event(&mut self, event: &EventSlot, end_of_batch: bool) -> Result<()> {
        self.deliver(event, end_of_batch)
    }

    fn on_flush(&mut self) -> Result<()> {
        self.flush()
    }

    fn on_shutdown(&mut self) -> Result<()> {
        self.stop()
    }
}

impl Drop for AppenderSet {
    fn drop(&mut self) {
        if !self.appenders.is_empty() {
            let _ = self.stop();
        }
    }
}
