//! Buffered writer shared by every appender using the same manager name
//!
//! An `OutputManager` owns a fixed-capacity byte buffer and the sink behind
//! it. All access goes through one mutex around the buffer/sink pair, so
//! appenders on different dispatchers can share a manager. End-of-batch is a
//! parameter of each write, never manager state.
//!
//! Flush triggers are independent:
//! - overflow: the incoming chunk does not fit in the remaining space, so the
//!   buffered bytes go out first
//! - immediate flush: configured per manager, flushes after every write
//! - end of batch: the caller's current event closes a batch

use super::error::{LoggerError, Result};
use super::sink::Sink;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;

/// Default buffer capacity (256 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 256 * 1024;

/// Builds the manager for a name on first acquisition.
///
/// The data is consulted only when no live manager with that name exists.
pub trait ManagerFactory {
    fn create_manager(&self, name: &str) -> Result<OutputManager>;
}

struct ManagerState {
    buffer: Vec<u8>,
    sink: Box<dyn Sink>,
    closed: bool,
    bytes_written: u64,
    flushes: u64,
}

impl ManagerState {
    /// Hand buffered bytes to the sink.
    ///
    /// The buffer is emptied even when the sink fails, so a failed batch is
    /// dropped rather than replayed ahead of later writes.
    fn drain_buffer(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = self.sink.write_all(&self.buffer);
        if result.is_ok() {
            self.bytes_written += self.buffer.len() as u64;
        }
        self.buffer.clear();
        result
    }

    fn flush(&mut self) -> Result<()> {
        let drained = self.drain_buffer();
        let flushed = self.sink.flush();
        self.flushes += 1;
        drained.and(flushed)
    }
}

pub struct OutputManager {
    name: String,
    capacity: usize,
    immediate_flush: bool,
    content_format: HashMap<String, String>,
    state: Mutex<ManagerState>,
}

impl OutputManager {
    /// A manager writing to `sink` through a buffer of `capacity` bytes.
    ///
    /// A capacity of zero disables buffering: every write goes straight out.
    pub fn new(
        name: impl Into<String>,
        sink: Box<dyn Sink>,
        capacity: usize,
        immediate_flush: bool,
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            immediate_flush,
            content_format: HashMap::new(),
            state: Mutex::new(ManagerState {
                buffer: Vec::with_capacity(capacity),
                sink,
                closed: false,
                bytes_written: 0,
                flushes: 0,
            }),
        }
    }

    /// Attributes merged over the sink's own `content_format`.
    #[must_use]
    pub fn with_content_format(mut self, attributes: HashMap<String, String>) -> Self {
        self.content_format = attributes;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_immediate_flush(&self) -> bool {
        self.immediate_flush
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Bytes currently held in the buffer.
    pub fn buffered_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Bytes the sink has accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.state.lock().bytes_written
    }

    pub fn flush_count(&self) -> u64 {
        self.state.lock().flushes
    }

    pub fn content_format(&self) -> HashMap<String, String> {
        let mut format = self.state.lock().sink.content_format();
        format.extend(
            self.content_format
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        format
    }

    /// Buffer `bytes`, flushing as the three triggers require.
    ///
    /// A chunk larger than the whole buffer is written directly once the
    /// buffered bytes have gone out. If several steps fail, the first error is
    /// returned; later steps still run so the buffer stays consistent.
    pub fn write(&self, bytes: &[u8], end_of_batch: bool) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::manager_closed(&self.name));
        }

        let mut first_error = None;

        let remaining = self.capacity.saturating_sub(state.buffer.len());
        if bytes.len() > remaining {
            if let Err(e) = state.drain_buffer() {
                first_error.get_or_insert(e);
            }
        }

        if bytes.len() > self.capacity {
            match state.sink.write_all(bytes) {
                Ok(()) => state.bytes_written += bytes.len() as u64,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        } else {
            state.buffer.extend_from_slice(bytes);
        }

        if self.immediate_flush || end_of_batch {
            if let Err(e) = state.flush() {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Push buffered bytes to the sink and flush it.
    pub fn flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.flush()
    }

    /// Flush and close the sink. Later writes fail with `ManagerClosed`.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        let flushed = state.flush();
        let closed = state.sink.close();
        flushed.and(closed)
    }
}

impl fmt::Debug for OutputManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputManager")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("immediate_flush", &self.immediate_flush)
            .finish_non_exhaustive()
    }
}
