//! Byte destinations behind output managers
//!
//! A `Sink` only moves bytes. Buffering, batching and sharing are the output
//! manager's job; a sink sees one large write per flush.

use super::error::{LoggerError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub trait Sink: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Release the underlying resource. Called once, after a final flush.
    fn close(&mut self) -> Result<()> {
        self.flush()
    }

    /// Descriptive attributes advertised for this destination.
    fn content_format(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

/// File destination, optionally holding an exclusive lock around each write.
pub struct FileSink {
    file: Option<File>,
    path: PathBuf,
    #[cfg_attr(not(feature = "file"), allow(dead_code))]
    locking: bool,
}

impl FileSink {
    /// Open `path` for writing, creating missing parent directories.
    ///
    /// With `append == false` an existing file is removed first.
    pub fn open(path: impl Into<PathBuf>, append: bool, locking: bool) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "creating log directory",
                    format!("unable to create {}", parent.display()),
                    e,
                )
            })?;
        }

        if !append {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(LoggerError::io_operation(
                        "truncating log file",
                        format!("unable to delete {}", path.display()),
                        e,
                    ))
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("unable to open {}", path.display()),
                    e,
                )
            })?;

        Ok(Self {
            file: Some(file),
            path,
            locking,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| LoggerError::writer(format!("{} is closed", self.path.display())))
    }

    #[cfg(feature = "file")]
    fn locked_write(&mut self, bytes: &[u8]) -> io::Result<()> {
        use fs2::FileExt;

        let locking = self.locking;
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(io::Error::other("file is closed")),
        };
        if !locking {
            return file.write_all(bytes);
        }
        file.lock_exclusive()?;
        let result = file.write_all(bytes);
        let unlocked = FileExt::unlock(&*file);
        result.and(unlocked)
    }

    #[cfg(not(feature = "file"))]
    fn locked_write(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(bytes),
            None => Err(io::Error::other("file is closed")),
        }
    }
}

impl Sink for FileSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.locked_write(bytes).map_err(|e| {
            LoggerError::io_operation(
                "writing log file",
                format!("unable to write to {}", self.path.display()),
                e,
            )
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.file()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.sync_all().map_err(|e| {
                LoggerError::io_operation(
                    "closing log file",
                    format!("unable to sync {}", self.path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    Stderr,
}

pub struct ConsoleSink {
    target: ConsoleTarget,
}

impl ConsoleSink {
    pub fn new(target: ConsoleTarget) -> Self {
        Self { target }
    }
}

impl Sink for ConsoleSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().lock().write_all(bytes)?,
            ConsoleTarget::Stderr => io::stderr().lock().write_all(bytes)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.target {
            ConsoleTarget::Stdout => io::stdout().flush()?,
            ConsoleTarget::Stderr => io::stderr().flush()?,
        }
        Ok(())
    }
}

/// TCP destination. A failed write is reported, not retried.
pub struct TcpSink {
    stream: Option<TcpStream>,
    address: String,
}

impl TcpSink {
    /// Connect to `address` (e.g. "localhost:5000").
    pub fn connect(address: impl Into<String>, timeout: Duration) -> Result<Self> {
        let address = address.into();
        let stream = TcpStream::connect(&address).map_err(|e| {
            LoggerError::io_operation("connecting", format!("unable to reach {}", address), e)
        })?;

        // Set timeouts to prevent hanging
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream: Some(stream),
            address,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Sink for TcpSink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| {
                LoggerError::writer(format!("connection to {} is closed", self.address))
            })?;
        if let Err(e) = stream.write_all(bytes) {
            // connection lost; later writes fail fast
            self.stream = None;
            return Err(LoggerError::io_operation(
                "sending",
                format!("connection to {} lost", self.address),
                e,
            ));
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut stream) = self.stream {
            stream.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            stream.flush()?;
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Ok(())
    }
}

/// Shared view of what a [`MemorySink`] received.
///
/// Clones observe the same recording, so a test can keep one while the sink
/// itself moves into a manager.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    writes: Mutex<Vec<Vec<u8>>>,
    flushes: AtomicUsize,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write the sink received, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.writes.lock().len()
    }

    /// All bytes received, concatenated.
    pub fn contents(&self) -> Vec<u8> {
        self.inner.writes.lock().concat()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn flush_count(&self) -> usize {
        self.inner.flushes.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Make subsequent writes fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::Release);
    }

    pub fn clear(&self) {
        self.inner.writes.lock().clear();
    }
}

/// In-memory destination recording each write separately.
pub struct MemorySink {
    record: MemoryRecord,
}

impl MemorySink {
    pub fn new(record: MemoryRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &MemoryRecord {
        &self.record
    }
}

impl Sink for MemorySink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if self.record.inner.fail_writes.load(Ordering::Acquire) {
            return Err(LoggerError::writer("memory sink refused write"));
        }
        self.record.inner.writes.lock().push(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.record.inner.flushes.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.record.inner.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_sink_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("app.log");
        let mut sink = FileSink::open(&path, true, false).unwrap();
        sink.write_all(b"hello\n").unwrap();
        sink.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_file_sink_append_vs_truncate() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "old\n").unwrap();

        let mut sink = FileSink::open(&path, true, false).unwrap();
        sink.write_all(b"new\n").unwrap();
        sink.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");

        let mut sink = FileSink::open(&path, false, false).unwrap();
        sink.write_all(b"fresh\n").unwrap();
        sink.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn test_file_sink_locking_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.log");
        let mut sink = FileSink::open(&path, true, true).unwrap();
        sink.write_all(b"a").unwrap();
        sink.write_all(b"b").unwrap();
        sink.close().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ab");
    }

    #[test]
    fn test_closed_file_sink_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::open(dir.path().join("x.log"), true, false).unwrap();
        sink.close().unwrap();
        assert!(sink.write_all(b"late").is_err());
    }

    #[test]
    fn test_memory_sink_records() {
        let record = MemoryRecord::new();
        let mut sink = MemorySink::new(record.clone());
        sink.write_all(b"one").unwrap();
        sink.write_all(b"two").unwrap();
        sink.flush().unwrap();

        assert_eq!(record.write_count(), 2);
        assert_eq!(record.contents_string(), "onetwo");
        assert_eq!(record.flush_count(), 1);

        record.set_fail_writes(true);
        assert!(sink.write_all(b"three").is_err());
        sink.close().unwrap();
        assert!(record.is_closed());
    }

    #[test]
    fn test_tcp_sink_unreachable() {
        let result = TcpSink::connect("127.0.0.1:1", Duration::from_millis(100));
        assert!(result.is_err());
    }
}
