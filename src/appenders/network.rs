//! Socket appender for remote logging
//!
//! Sends formatted events to a remote server over TCP. A failed send is
//! reported to the status logger and the bytes are dropped; reconnecting is
//! left to whoever owns the deployment.

use crate::core::sink::TcpSink;
use crate::core::{
    FilterChain, Formatter, ManagedOutput, ManagerFactory, ManagerRegistry, OutputFormat,
    OutputManager, Result, TimestampFormat,
};
use std::sync::Arc;
use std::time::Duration;

const SOCKET_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketManagerData {
    /// e.g. "localhost:5000"
    pub address: String,
    pub write_timeout: Duration,
    pub immediate_flush: bool,
    pub buffer_capacity: usize,
}

impl SocketManagerData {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            write_timeout: Duration::from_secs(5),
            immediate_flush: false,
            buffer_capacity: SOCKET_BUFFER_SIZE,
        }
    }

    pub fn manager_name(&self) -> String {
        format!("tcp:{}", self.address)
    }
}

impl ManagerFactory for SocketManagerData {
    fn create_manager(&self, name: &str) -> Result<OutputManager> {
        let sink = TcpSink::connect(self.address.clone(), self.write_timeout)?;
        Ok(OutputManager::new(
            name,
            Box::new(sink),
            self.buffer_capacity,
            self.immediate_flush,
        ))
    }
}

/// Socket appender
///
/// # Example
///
/// ```no_run
/// use rust_async_logger::appenders::SocketAppender;
/// use rust_async_logger::core::{ManagerRegistry, OutputFormat, StatusLogger};
/// use std::sync::Arc;
///
/// let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));
/// let appender = SocketAppender::builder("127.0.0.1:5000")
///     .format(OutputFormat::Json)
///     .build(&registry)
///     .expect("Failed to connect to log server");
/// ```
pub struct SocketAppender {
    output: ManagedOutput,
    address: String,
}

impl SocketAppender {
    pub fn builder(address: impl Into<String>) -> SocketAppenderBuilder {
        SocketAppenderBuilder::new(address)
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

managed_appender!(SocketAppender);

#[derive(Debug, Clone)]
pub struct SocketAppenderBuilder {
    name: Option<String>,
    data: SocketManagerData,
    format: OutputFormat,
    timestamp_format: TimestampFormat,
    formatter: Option<Arc<dyn Formatter>>,
    filter: Option<FilterChain>,
}

impl SocketAppenderBuilder {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            data: SocketManagerData::new(address),
            format: OutputFormat::Text,
            timestamp_format: TimestampFormat::default(),
            formatter: None,
            filter: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.data.write_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn immediate_flush(mut self, immediate_flush: bool) -> Self {
        self.data.immediate_flush = immediate_flush;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.data.buffer_capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn filter(mut self, filter: FilterChain) -> Self {
        self.filter = Some(filter);
        self
    }

    /// # Errors
    ///
    /// Returns `ManagerCreation` if the server cannot be reached.
    pub fn build(self, registry: &Arc<ManagerRegistry>) -> Result<SocketAppender> {
        let handle = registry.acquire(&self.data.manager_name(), &self.data)?;
        let formatter = self
            .formatter
            .unwrap_or_else(|| self.format.build(self.timestamp_format, false));

        let mut output = ManagedOutput::new(
            self.name.unwrap_or_else(|| "socket".to_string()),
            handle,
            formatter,
        );
        output.set_filter(self.filter);

        Ok(SocketAppender {
            output,
            address: self.data.address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Appender, EventSlot, Level, LoggerError, SlotValues, StatusLogger};
    use std::io::Read;
    use std::net::TcpListener;

    #[test]
    fn test_unreachable_server_fails_build() {
        let registry = ManagerRegistry::new(Arc::new(StatusLogger::silent()));
        let result = SocketAppender::builder("127.0.0.1:1")
            .write_timeout(Duration::from_millis(100))
            .build(&registry);
        assert!(matches!(result, Err(LoggerError::ManagerCreation { .. })));
    }

    #[test]
    fn test_sends_on_end_of_batch() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = String::new();
            stream.read_to_string(&mut received).unwrap();
            received
        });

        let registry = ManagerRegistry::new(Arc::new(StatusLogger::silent()));
        let mut appender = SocketAppender::builder(address.clone())
            .format(OutputFormat::Json)
            .build(&registry)
            .unwrap();
        assert_eq!(appender.address(), address);

        let event = EventSlot::from_values(SlotValues::new(
            Arc::from("net"),
            Level::Warn,
            "over the wire",
        ));
        appender.append(&event, true).unwrap();
        drop(appender);

        let received = server.join().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(received.trim()).unwrap();
        assert_eq!(parsed["message"], "over the wire");
        assert_eq!(parsed["level"], "WARN");
    }
}
