//! Background delivery thread
//!
//! One dispatcher owns the ring's consumer and a single [`EventHandler`].
//! Events reach the handler strictly in claim order, each with the
//! end-of-batch flag computed when it was taken off the ring. Handler errors
//! and panics are reported to the status logger and never stop the thread.

use super::error::{LoggerError, Result};
use super::event::EventSlot;
use super::metrics::LoggerMetrics;
use super::ring_buffer::{EventConsumer, RingBuffer};
use super::status::StatusLogger;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for logger cleanup (5 seconds)
///
/// This timeout is used when the logger is dropped without explicit shutdown.
/// For custom timeout control, use the `shutdown()` method instead.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the idle dispatcher waits before re-checking the stop flag.
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Extra time granted after the drain deadline for the final flush.
const FLUSH_GRACE: Duration = Duration::from_millis(500);

const COMPONENT: &str = "AsyncDispatcher";

/// Receives events from the dispatcher thread.
pub trait EventHandler: Send {
    /// Handle one event. `end_of_batch` is `true` when no further event was
    /// published at the time this one was taken.
    ///
    /// The slot is only borrowed; copy anything that must outlive the call.
    fn on_event(&mut self, event: &EventSlot, end_of_batch: bool) -> Result<()>;

    /// Push out anything buffered. Called on the dispatcher thread when a
    /// flush is requested.
    fn on_flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once on the dispatcher thread after the last event.
    fn on_shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> EventHandler for F
where
    F: FnMut(&EventSlot, bool) -> Result<()> + Send,
{
    fn on_event(&mut self, event: &EventSlot, end_of_batch: bool) -> Result<()> {
        self(event, end_of_batch)
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

struct Shared {
    stopping: AtomicBool,
    deadline: Mutex<Option<Instant>>,
    /// Claimed sequences left unconsumed when the thread gave up.
    abandoned: AtomicU64,
    flush_requested: AtomicU64,
    flush_completed: AtomicU64,
}

pub struct AsyncDispatcher {
    ring: Arc<RingBuffer>,
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
    status: Arc<StatusLogger>,
}

impl AsyncDispatcher {
    /// Take the ring's consumer and start delivering to `handler`.
    ///
    /// # Errors
    ///
    /// Fails if the ring's consumer is already taken or the thread cannot be
    /// spawned.
    pub fn start<H>(
        ring: Arc<RingBuffer>,
        handler: H,
        metrics: Arc<LoggerMetrics>,
        status: Arc<StatusLogger>,
    ) -> Result<Self>
    where
        H: EventHandler + 'static,
    {
        let consumer = ring
            .consumer()
            .ok_or_else(|| LoggerError::config(COMPONENT, "ring buffer already has a consumer"))?;

        let shared = Arc::new(Shared {
            stopping: AtomicBool::new(false),
            deadline: Mutex::new(None),
            abandoned: AtomicU64::new(0),
            flush_requested: AtomicU64::new(0),
            flush_completed: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_status = Arc::clone(&status);
        let handle = thread::Builder::new()
            .name("async-logger-dispatch".to_string())
            .spawn(move || run(consumer, handler, &worker_shared, &metrics, &worker_status))
            .map_err(|e| {
                LoggerError::io_operation("spawning dispatcher thread", e.to_string(), e)
            })?;

        Ok(Self {
            ring,
            shared,
            handle: Some(handle),
            status,
        })
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the dispatcher thread to call [`EventHandler::on_flush`].
    ///
    /// Returns a ticket for [`is_flushed`](Self::is_flushed). Events already
    /// consumed when the request is made are covered by the flush.
    pub fn request_flush(&self) -> u64 {
        let ticket = self.shared.flush_requested.fetch_add(1, Ordering::SeqCst) + 1;
        self.ring.wake_consumer();
        ticket
    }

    /// `true` once the flush for `ticket` has run.
    pub fn is_flushed(&self, ticket: u64) -> bool {
        self.shared.flush_completed.load(Ordering::Acquire) >= ticket
    }

    /// Stop the dispatcher, draining what producers already published.
    ///
    /// Slots claimed but never published by `timeout` are abandoned. Returns
    /// `true` if the thread exited in time with nothing abandoned.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return self.shared.abandoned.load(Ordering::Acquire) == 0;
        };

        let start = Instant::now();
        *self.shared.deadline.lock() = Some(start + timeout);
        self.shared.stopping.store(true, Ordering::Release);
        self.ring.wake_consumer();

        let limit = timeout + FLUSH_GRACE;
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    self.status.error(
                        COMPONENT,
                        format!(
                            "dispatcher thread panicked during shutdown: {}",
                            panic_message(&*e)
                        ),
                    );
                    return false;
                }
                break;
            }

            if start.elapsed() >= limit {
                self.status.warn(
                    COMPONENT,
                    format!(
                        "dispatcher thread did not finish within {:?}. Some events may be lost.",
                        limit
                    ),
                );
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }

        self.shared.abandoned.load(Ordering::Acquire) == 0
    }
}

impl Drop for AsyncDispatcher {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

impl std::fmt::Debug for AsyncDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncDispatcher")
            .field("ring", &self.ring)
            .field("running", &self.is_running())
            .finish()
    }
}

fn run<H: EventHandler>(
    mut consumer: EventConsumer,
    mut handler: H,
    shared: &Shared,
    metrics: &LoggerMetrics,
    status: &StatusLogger,
) {
    let mut closed = false;
    let mut flushed_through = 0;
    loop {
        if !closed && shared.stopping.load(Ordering::Acquire) {
            // close before the final drain: anything claimed from here on
            // is either seen in `claimed()` or published empty
            consumer.ring().close();
            closed = true;
        }

        let handled = consumer.drain(|event, _, end_of_batch| {
            dispatch(&mut handler, event, end_of_batch, metrics, status);
        });

        let requested = shared.flush_requested.load(Ordering::SeqCst);
        if requested > flushed_through {
            flush(&mut handler, status);
            flushed_through = requested;
            shared.flush_completed.store(requested, Ordering::Release);
        }

        if handled > 0 {
            continue;
        }

        if closed {
            if consumer.is_caught_up() {
                break;
            }
            let expired = shared
                .deadline
                .lock()
                .is_some_and(|deadline| Instant::now() >= deadline);
            if expired {
                let abandoned = consumer.ring().claimed().saturating_sub(consumer.next_sequence());
                shared.abandoned.store(abandoned, Ordering::Release);
                status.warn(
                    COMPONENT,
                    format!("{} claimed events were never published and are abandoned", abandoned),
                );
                break;
            }
            consumer.wait_for_event(Duration::from_millis(1));
        } else {
            consumer.wait_for_event(IDLE_WAIT);
        }
    }

    // release producers still waiting for space
    let ring = Arc::clone(consumer.ring());
    ring.close();
    drop(consumer);

    match catch_unwind(AssertUnwindSafe(|| handler.on_shutdown())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => status.error(COMPONENT, format!("handler shutdown failed: {}", e)),
        Err(panic) => status.error(
            COMPONENT,
            format!("handler panicked during shutdown: {}", panic_message(&*panic)),
        ),
    }
}

fn flush<H: EventHandler>(handler: &mut H, status: &StatusLogger) {
    match catch_unwind(AssertUnwindSafe(|| handler.on_flush())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => status.error(COMPONENT, format!("handler flush failed: {}", e)),
        Err(panic) => status.error(
            COMPONENT,
            format!("handler panicked during flush: {}", panic_message(&*panic)),
        ),
    }
}

fn dispatch<H: EventHandler>(
    handler: &mut H,
    event: &EventSlot,
    end_of_batch: bool,
    metrics: &LoggerMetrics,
    status: &StatusLogger,
) {
    if end_of_batch {
        metrics.record_end_of_batch();
    }

    match catch_unwind(AssertUnwindSafe(|| handler.on_event(event, end_of_batch))) {
        Ok(Ok(())) => {
            metrics.record_delivered();
        }
        Ok(Err(e)) => {
            metrics.record_delivery_failure();
            status.error(COMPONENT, format!("event handler failed: {}", e));
        }
        Err(panic) => {
            metrics.record_delivery_failure();
            status.error(
                COMPONENT,
                format!(
                    "event handler panicked: {}. Dispatching continues.",
                    panic_message(&*panic)
                ),
            );
        }
    }
}
