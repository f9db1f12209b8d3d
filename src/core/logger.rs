//! Logger facade
//!
//! A [`Logger`] decides admission on the producer thread (filter chain, then
//! the neutral policy), snapshots the thread context and hands the event
//! either to the ring buffer (async) or straight to its appenders (sync).

use super::appender::{Appender, AppenderSet};
use super::config::AsyncConfig;
use super::context::ThreadContext;
use super::dispatcher::AsyncDispatcher;
use super::error::{LoggerError, Result};
use super::event::{
    current_thread_name, current_time_millis, EventSlot, Location, SlotValues, Thrown,
};
use super::filter::{Filter, FilterChain, NeutralPolicy};
use super::level::Level;
use super::marker::Marker;
use super::message::Message;
use super::metrics::LoggerMetrics;
use super::property::{Property, PropertySet, StrSubstitutor, Substitutor};
use super::ring_buffer::RingBuffer;
use super::status::StatusLogger;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Caller class name recorded on events from this facade.
pub const FQCN: &str = "rust_async_logger::Logger";

const COMPONENT: &str = "Logger";

/// How events travel from producers to appenders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Ring buffer plus one background dispatcher thread.
    #[default]
    Async,
    /// Appenders run on the calling thread; every event ends its own batch.
    Sync,
}

/// An admitted event waiting for its context snapshot.
struct PendingEvent {
    level: Level,
    marker: Option<Marker>,
    message: Message,
    thrown: Option<Thrown>,
    location: Option<Location>,
}

impl PendingEvent {
    fn into_values<'a>(
        self,
        logger: &'a Logger,
        map: &'a HashMap<String, String>,
        stack: &'a [String],
    ) -> SlotValues<'a> {
        SlotValues {
            logger_name: Arc::clone(&logger.name),
            marker: self.marker,
            fqcn: logger.fqcn,
            level: self.level,
            message: self.message,
            thrown: self.thrown,
            context_map: (!map.is_empty()).then_some(map),
            context_stack: stack,
            thread_name: current_thread_name(),
            location: self.location,
            timestamp_millis: current_time_millis(),
            include_location: logger.include_location,
            properties: logger.properties.as_ref(),
        }
    }
}

struct SyncState {
    slot: EventSlot,
    appenders: AppenderSet,
}

enum Backend {
    Async {
        ring: Arc<RingBuffer>,
        dispatcher: Mutex<Option<AsyncDispatcher>>,
    },
    Sync(Mutex<Option<SyncState>>),
}

/// Main logger structure
pub struct Logger {
    name: Arc<str>,
    fqcn: &'static str,
    filter: FilterChain,
    neutral_policy: NeutralPolicy,
    properties: Option<PropertySet>,
    include_location: bool,
    backend: Backend,
    accepting: AtomicBool,
    /// Result of the first shutdown, returned by later calls.
    clean_shutdown: AtomicBool,
    metrics: Arc<LoggerMetrics>,
    status: Arc<StatusLogger>,
    shutdown_timeout: Duration,
}

impl Logger {
    /// Synchronous logger with no appenders and no filters.
    pub fn new() -> Self {
        let status = Arc::new(StatusLogger::new());
        Self {
            name: Arc::from(""),
            fqcn: FQCN,
            filter: FilterChain::new(),
            neutral_policy: NeutralPolicy::Record,
            properties: None,
            include_location: false,
            backend: Backend::Sync(Mutex::new(Some(SyncState {
                slot: EventSlot::new(),
                appenders: AppenderSet::new(Vec::new(), Arc::clone(&status)),
            }))),
            accepting: AtomicBool::new(true),
            clean_shutdown: AtomicBool::new(true),
            metrics: Arc::new(LoggerMetrics::new()),
            status,
            shutdown_timeout: super::dispatcher::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        match self.backend {
            Backend::Async { .. } => DeliveryMode::Async,
            Backend::Sync(_) => DeliveryMode::Sync,
        }
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    pub fn status(&self) -> &Arc<StatusLogger> {
        &self.status
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Capacity of the ring buffer, if this logger is asynchronous.
    pub fn ring_capacity(&self) -> Option<usize> {
        match &self.backend {
            Backend::Async { ring, .. } => Some(ring.capacity()),
            Backend::Sync(_) => None,
        }
    }

    /// Whether an event at `level` without a marker would be recorded.
    pub fn is_enabled(&self, level: Level) -> bool {
        self.is_enabled_with(level, None)
    }

    fn is_enabled_with(&self, level: Level, marker: Option<&Marker>) -> bool {
        let result = self.filter.filter_text(&self.name, level, marker, "", &[]);
        self.neutral_policy.decide(result, level)
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<Message>) {
        let location = self.caller_location();
        self.log_message(level, None, message.into(), None, location);
    }

    /// Log a `{}` pattern. Filters see the raw pattern and parameters; the
    /// parameters are only rendered if the event is admitted.
    #[track_caller]
    pub fn log_params(&self, level: Level, pattern: &str, params: &[&dyn fmt::Display]) {
        let location = self.caller_location();
        self.log_pattern(level, None, pattern, params, location);
    }

    #[track_caller]
    pub fn log_with_error<E>(&self, level: Level, message: impl Into<Message>, error: E)
    where
        E: StdError + Send + Sync + 'static,
    {
        let location = self.caller_location();
        let thrown: Thrown = Arc::new(error);
        self.log_message(level, None, message.into(), Some(thrown), location);
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<Message>) {
        self.log(Level::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<Message>) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<Message>) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<Message>) {
        self.log(Level::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<Message>) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn fatal(&self, message: impl Into<Message>) {
        self.log(Level::Fatal, message);
    }

    /// Borrow this logger with a marker attached to every event.
    pub fn with_marker(&self, marker: Marker) -> MarkerLogger<'_> {
        MarkerLogger {
            logger: self,
            marker,
        }
    }

    #[track_caller]
    fn caller_location(&self) -> Option<Location> {
        if self.include_location {
            Some(Location::caller())
        } else {
            None
        }
    }

    fn log_message(
        &self,
        level: Level,
        marker: Option<&Marker>,
        message: Message,
        thrown: Option<Thrown>,
        location: Option<Location>,
    ) {
        let result = self
            .filter
            .filter_message(&self.name, level, marker, &message, thrown.as_ref());
        if !self.neutral_policy.decide(result, level) {
            self.metrics.record_filtered();
            return;
        }
        self.publish(level, marker, message, thrown, location);
    }

    fn log_pattern(
        &self,
        level: Level,
        marker: Option<&Marker>,
        pattern: &str,
        params: &[&dyn fmt::Display],
        location: Option<Location>,
    ) {
        let result = self
            .filter
            .filter_text(&self.name, level, marker, pattern, params);
        if !self.neutral_policy.decide(result, level) {
            self.metrics.record_filtered();
            return;
        }
        self.publish(level, marker, Message::parameterized(pattern, params), None, location);
    }

    fn publish(
        &self,
        level: Level,
        marker: Option<&Marker>,
        message: Message,
        thrown: Option<Thrown>,
        location: Option<Location>,
    ) {
        if !self.is_accepting() {
            self.metrics.record_rejected();
            return;
        }

        let pending = PendingEvent {
            level,
            marker: marker.cloned(),
            message,
            thrown,
            location,
        };

        match &self.backend {
            Backend::Async { ring, .. } => {
                let claim = match ring.claim() {
                    Ok(claim) => claim,
                    Err(_) => {
                        self.metrics.record_rejected();
                        return;
                    }
                };
                if claim.waited() {
                    self.metrics.record_producer_wait();
                }
                ThreadContext::with(|map, stack| {
                    claim.publish(pending.into_values(self, map, stack))
                });
                self.metrics.record_published();
            }
            Backend::Sync(state) => {
                let mut guard = state.lock();
                let Some(state) = guard.as_mut() else {
                    self.metrics.record_rejected();
                    return;
                };
                ThreadContext::with(|map, stack| {
                    state.slot.set_values(pending.into_values(self, map, stack));
                });
                state.slot.set_end_of_batch(true);
                self.metrics.record_published();
                self.metrics.record_end_of_batch();
                match state.appenders.deliver(&state.slot, true) {
                    Ok(()) => {
                        self.metrics.record_delivered();
                    }
                    Err(_) => {
                        self.metrics.record_delivery_failure();
                    }
                }
            }
        }
    }

    /// Flush pending output.
    ///
    /// Synchronous loggers flush their appenders directly. Asynchronous
    /// loggers wait until the dispatcher has consumed everything claimed so
    /// far, then have the dispatcher thread flush the appenders.
    pub fn flush(&self) -> Result<()> {
        match &self.backend {
            Backend::Sync(state) => match state.lock().as_mut() {
                Some(state) => state.appenders.flush(),
                None => Ok(()),
            },
            Backend::Async { ring, dispatcher } => {
                let target = ring.claimed();
                let deadline = Instant::now() + self.shutdown_timeout;
                while ring.consumed() < target {
                    let running = dispatcher.lock().as_ref().is_some_and(|d| d.is_running());
                    if !running {
                        return Err(LoggerError::LoggerStopped);
                    }
                    if Instant::now() >= deadline {
                        return Err(LoggerError::writer(format!(
                            "flush timed out with {} events pending",
                            target.saturating_sub(ring.consumed())
                        )));
                    }
                    ring.wake_consumer();
                    thread::sleep(Duration::from_millis(1));
                }

                let ticket = match dispatcher.lock().as_ref() {
                    Some(d) if d.is_running() => d.request_flush(),
                    _ => return Err(LoggerError::LoggerStopped),
                };
                loop {
                    match dispatcher.lock().as_ref() {
                        Some(d) if d.is_flushed(ticket) => return Ok(()),
                        Some(d) if d.is_running() => {}
                        _ => return Err(LoggerError::LoggerStopped),
                    }
                    if Instant::now() >= deadline {
                        return Err(LoggerError::writer("flush timed out waiting for appenders"));
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }

    /// Stop accepting events, deliver what was published, then stop the
    /// appenders and release their managers.
    ///
    /// # Arguments
    ///
    /// * `timeout` - How long the dispatcher may keep draining
    ///
    /// # Returns
    ///
    /// * `true` - Every published event was delivered
    /// * `false` - The timeout expired or claimed events were abandoned
    ///
    /// # Example
    ///
    /// ```
    /// use rust_async_logger::Logger;
    /// use std::time::Duration;
    ///
    /// let logger = Logger::builder().async_mode().build().unwrap();
    /// logger.info("Processing complete");
    ///
    /// if !logger.shutdown(Duration::from_secs(2)) {
    ///     eprintln!("Warning: Logger shutdown timed out");
    /// }
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if !self.accepting.swap(false, Ordering::AcqRel) {
            return self.clean_shutdown.load(Ordering::Acquire);
        }

        let clean = match &self.backend {
            Backend::Async { dispatcher, .. } => {
                let taken = dispatcher.lock().take();
                match taken {
                    Some(mut dispatcher) => dispatcher.shutdown(timeout),
                    None => true,
                }
            }
            Backend::Sync(state) => {
                let taken = state.lock().take();
                match taken {
                    Some(mut state) => state.appenders.stop().is_ok(),
                    None => true,
                }
            }
        };

        self.clean_shutdown.store(clean, Ordering::Release);
        clean
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("mode", &self.delivery_mode())
            .field("accepting", &self.is_accepting())
            .finish_non_exhaustive()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if !self.shutdown(self.shutdown_timeout) {
            self.status.warn(
                COMPONENT,
                format!(
                    "shutdown of '{}' did not complete within {:?}. Some logs may be lost.",
                    self.name, self.shutdown_timeout
                ),
            );
        }

        let failures = self.metrics.delivery_failures();
        if failures > 0 {
            self.status.warn(
                COMPONENT,
                format!(
                    "'{}' shutting down with {} failed deliveries (failure rate: {:.2}%)",
                    self.name,
                    failures,
                    self.metrics.failure_rate()
                ),
            );
        }
    }
}

/// A logger borrowed with a marker attached to every event.
#[derive(Debug)]
pub struct MarkerLogger<'a> {
    logger: &'a Logger,
    marker: Marker,
}

impl MarkerLogger<'_> {
    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    pub fn is_enabled(&self, level: Level) -> bool {
        self.logger.is_enabled_with(level, Some(&self.marker))
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<Message>) {
        let location = self.logger.caller_location();
        self.logger
            .log_message(level, Some(&self.marker), message.into(), None, location);
    }

    #[track_caller]
    pub fn log_params(&self, level: Level, pattern: &str, params: &[&dyn fmt::Display]) {
        let location = self.logger.caller_location();
        self.logger
            .log_pattern(level, Some(&self.marker), pattern, params, location);
    }

    #[track_caller]
    pub fn log_with_error<E>(&self, level: Level, message: impl Into<Message>, error: E)
    where
        E: StdError + Send + Sync + 'static,
    {
        let location = self.logger.caller_location();
        let thrown: Thrown = Arc::new(error);
        self.logger
            .log_message(level, Some(&self.marker), message.into(), Some(thrown), location);
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<Message>) {
        self.log(Level::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<Message>) {
        self.log(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<Message>) {
        self.log(Level::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<Message>) {
        self.log(Level::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<Message>) {
        self.log(Level::Error, message);
    }

    #[track_caller]
    pub fn fatal(&self, message: impl Into<Message>) {
        self.log(Level::Fatal, message);
    }
}

/// Builder for creating a logger
///
/// # Example
///
/// ```
/// use rust_async_logger::core::{LoggerBuilder, NeutralPolicy, ThresholdFilter};
/// use rust_async_logger::Level;
///
/// let logger = LoggerBuilder::new()
///     .name("app")
///     .filter(ThresholdFilter::builder().level(Level::Info).build())
///     .neutral_policy(NeutralPolicy::Record)
///     .property("service", "checkout")
///     .async_mode()
///     .build()
///     .unwrap();
///
/// logger.info("ready");
/// ```
pub struct LoggerBuilder {
    name: String,
    fqcn: &'static str,
    appenders: Vec<Box<dyn Appender>>,
    filter: FilterChain,
    neutral_policy: NeutralPolicy,
    properties: Vec<Property>,
    substitutor: Option<Arc<dyn Substitutor>>,
    include_location: bool,
    mode: DeliveryMode,
    async_config: AsyncConfig,
    status: Option<Arc<StatusLogger>>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            fqcn: FQCN,
            appenders: Vec::new(),
            filter: FilterChain::new(),
            neutral_policy: NeutralPolicy::Record,
            properties: Vec::new(),
            substitutor: None,
            include_location: false,
            mode: DeliveryMode::Sync,
            async_config: AsyncConfig::default(),
            status: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Caller class name stamped on every event.
    #[must_use = "builder methods return a new value"]
    pub fn fqcn(mut self, fqcn: &'static str) -> Self {
        self.fqcn = fqcn;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.appenders.push(Box::new(appender));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_appender(mut self, appender: Box<dyn Appender>) -> Self {
        self.appenders.push(appender);
        self
    }

    /// Append a filter to the logger's chain.
    #[must_use = "builder methods return a new value"]
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filter.push(Arc::new(filter));
        self
    }

    /// Replace the logger's chain.
    #[must_use = "builder methods return a new value"]
    pub fn filter_chain(mut self, chain: FilterChain) -> Self {
        self.filter = chain;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn neutral_policy(mut self, policy: NeutralPolicy) -> Self {
        self.neutral_policy = policy;
        self
    }

    /// Add a non-substitutable property.
    #[must_use = "builder methods return a new value"]
    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Property::new(name, value, false));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn properties(mut self, properties: impl IntoIterator<Item = Property>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Resolver for substitutable properties (default: [`StrSubstitutor`]).
    #[must_use = "builder methods return a new value"]
    pub fn substitutor(mut self, substitutor: Arc<dyn Substitutor>) -> Self {
        self.substitutor = Some(substitutor);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn include_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Asynchronous delivery with the default ring configuration.
    #[must_use = "builder methods return a new value"]
    pub fn async_mode(mut self) -> Self {
        self.mode = DeliveryMode::Async;
        self
    }

    /// Asynchronous delivery with an explicit ring configuration.
    #[must_use = "builder methods return a new value"]
    pub fn async_config(mut self, config: AsyncConfig) -> Self {
        self.mode = DeliveryMode::Async;
        self.async_config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn sync_mode(mut self) -> Self {
        self.mode = DeliveryMode::Sync;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Share a status logger (default: a fresh one per logger).
    #[must_use = "builder methods return a new value"]
    pub fn status(mut self, status: Arc<StatusLogger>) -> Self {
        self.status = Some(status);
        self
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for a bad ring size and an I/O error if
    /// the dispatcher thread cannot be started.
    pub fn build(self) -> Result<Logger> {
        let status = self.status.unwrap_or_else(|| Arc::new(StatusLogger::new()));
        let metrics = Arc::new(LoggerMetrics::new());

        let properties = if self.properties.is_empty() {
            None
        } else {
            let substitutor = self
                .substitutor
                .unwrap_or_else(|| Arc::new(StrSubstitutor::new()));
            for prop in self.properties.iter().filter(|p| p.is_substitutable()) {
                let resolved = substitutor.resolve(prop.value());
                if resolved.contains("${") {
                    status.warn(
                        "PropertySet",
                        format!(
                            "property '{}' has unresolved references: {}",
                            prop.name(),
                            resolved
                        ),
                    );
                }
            }
            Some(PropertySet::with_substitutor(self.properties, substitutor))
        };

        let appenders = AppenderSet::new(self.appenders, Arc::clone(&status));
        let backend = match self.mode {
            DeliveryMode::Async => {
                let size = self.async_config.resolved_ring_size()?;
                let ring = Arc::new(RingBuffer::new(size, self.async_config.wait_strategy)?);
                let dispatcher = AsyncDispatcher::start(
                    Arc::clone(&ring),
                    appenders,
                    Arc::clone(&metrics),
                    Arc::clone(&status),
                )?;
                Backend::Async {
                    ring,
                    dispatcher: Mutex::new(Some(dispatcher)),
                }
            }
            DeliveryMode::Sync => Backend::Sync(Mutex::new(Some(SyncState {
                slot: EventSlot::new(),
                appenders,
            }))),
        };

        Ok(Logger {
            name: Arc::from(self.name),
            fqcn: self.fqcn,
            filter: self.filter,
            neutral_policy: self.neutral_policy,
            properties,
            include_location: self.include_location,
            backend,
            accepting: AtomicBool::new(true),
            clean_shutdown: AtomicBool::new(true),
            metrics,
            status,
            shutdown_timeout: self.async_config.shutdown_timeout(),
        })
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
