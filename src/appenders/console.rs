//! Console appender implementation

use crate::core::sink::{ConsoleSink, ConsoleTarget};
use crate::core::{
    FilterChain, Formatter, ManagedOutput, ManagerFactory, ManagerRegistry, OutputFormat,
    OutputManager, Result, TimestampFormat,
};
use std::sync::Arc;

/// Console managers buffer little: lines should appear promptly.
const CONSOLE_BUFFER_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleManagerData {
    pub target: ConsoleTarget,
    pub immediate_flush: bool,
    pub buffer_capacity: usize,
}

impl ConsoleManagerData {
    pub fn new(target: ConsoleTarget) -> Self {
        Self {
            target,
            immediate_flush: true,
            buffer_capacity: CONSOLE_BUFFER_SIZE,
        }
    }

    /// Registry name for the stream; every console appender on the same
    /// stream shares one manager.
    pub fn manager_name(&self) -> &'static str {
        match self.target {
            ConsoleTarget::Stdout => "console.stdout",
            ConsoleTarget::Stderr => "console.stderr",
        }
    }
}

impl ManagerFactory for ConsoleManagerData {
    fn create_manager(&self, name: &str) -> Result<OutputManager> {
        Ok(OutputManager::new(
            name,
            Box::new(ConsoleSink::new(self.target)),
            self.buffer_capacity,
            self.immediate_flush,
        ))
    }
}

pub struct ConsoleAppender {
    output: ManagedOutput,
    target: ConsoleTarget,
}

impl ConsoleAppender {
    /// Builder with defaults: stdout, colored text, immediate flush.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_async_logger::appenders::ConsoleAppender;
    /// use rust_async_logger::core::{ManagerRegistry, OutputFormat, StatusLogger};
    /// use std::sync::Arc;
    ///
    /// let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));
    /// let appender = ConsoleAppender::builder()
    ///     .format(OutputFormat::Json)
    ///     .build(&registry)
    ///     .unwrap();
    /// ```
    pub fn builder() -> ConsoleAppenderBuilder {
        ConsoleAppenderBuilder::default()
    }

    pub fn target(&self) -> ConsoleTarget {
        self.target
    }
}

managed_appender!(ConsoleAppender);

#[derive(Debug, Clone)]
pub struct ConsoleAppenderBuilder {
    name: Option<String>,
    data: ConsoleManagerData,
    use_colors: bool,
    format: OutputFormat,
    timestamp_format: TimestampFormat,
    formatter: Option<Arc<dyn Formatter>>,
    filter: Option<FilterChain>,
}

impl Default for ConsoleAppenderBuilder {
    fn default() -> Self {
        Self {
            name: None,
            data: ConsoleManagerData::new(ConsoleTarget::Stdout),
            use_colors: cfg!(feature = "console"),
            format: OutputFormat::Text,
            timestamp_format: TimestampFormat::default(),
            formatter: None,
            filter: None,
        }
    }
}

impl ConsoleAppenderBuilder {
    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn target(mut self, target: ConsoleTarget) -> Self {
        self.data.target = target;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
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

    pub fn build(self, registry: &Arc<ManagerRegistry>) -> Result<ConsoleAppender> {
        let handle = registry.acquire(self.data.manager_name(), &self.data)?;
        let formatter = self
            .formatter
            .unwrap_or_else(|| self.format.build(self.timestamp_format, self.use_colors));

        let mut output = ManagedOutput::new(
            self.name.unwrap_or_else(|| "console".to_string()),
            handle,
            formatter,
        );
        output.set_filter(self.filter);

        Ok(ConsoleAppender {
            output,
            target: self.data.target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Appender, EventSlot, Level, SlotValues, StatusLogger};

    #[test]
    fn test_console_appenders_share_stream_manager() {
        let registry = ManagerRegistry::new(Arc::new(StatusLogger::silent()));
        let a = ConsoleAppender::builder().name("a").build(&registry).unwrap();
        let b = ConsoleAppender::builder().name("b").build(&registry).unwrap();
        let err = ConsoleAppender::builder()
            .target(ConsoleTarget::Stderr)
            .build(&registry)
            .unwrap();

        assert_eq!(registry.ref_count("console.stdout"), Some(2));
        assert_eq!(registry.ref_count("console.stderr"), Some(1));
        assert_eq!(err.target(), ConsoleTarget::Stderr);
        drop((a, b, err));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_console_append() {
        let registry = ManagerRegistry::new(Arc::new(StatusLogger::silent()));
        let mut appender = ConsoleAppender::builder().colors(false).build(&registry).unwrap();
        let event =
            EventSlot::from_values(SlotValues::new(Arc::from("console"), Level::Info, "visible"));
        assert!(appender.append(&event, true).is_ok());
        assert!(appender.flush().is_ok());
        assert_eq!(appender.name(), "console");
    }
}
