//! File appender implementation

use crate::core::{
    FilterChain, Formatter, LoggerError, ManagedOutput, ManagerFactory, ManagerHandle,
    ManagerRegistry, OutputFormat, OutputManager, Result, TimestampFormat, DEFAULT_BUFFER_SIZE,
};
use crate::core::sink::FileSink;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything needed to open a file manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileManagerData {
    pub path: PathBuf,
    /// Keep existing contents; otherwise the file is replaced.
    pub append: bool,
    pub immediate_flush: bool,
    pub buffer_capacity: usize,
    /// Hold an exclusive lock on the file around each write.
    pub locking: bool,
    /// Advertised as `fileURI` in the manager's content format.
    pub advertise_uri: Option<String>,
}

impl FileManagerData {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: true,
            immediate_flush: true,
            buffer_capacity: DEFAULT_BUFFER_SIZE,
            locking: false,
            advertise_uri: None,
        }
    }
}

impl ManagerFactory for FileManagerData {
    fn create_manager(&self, name: &str) -> Result<OutputManager> {
        let sink = FileSink::open(&self.path, self.append, self.locking)?;

        let mut content_format = HashMap::new();
        if let Some(ref uri) = self.advertise_uri {
            content_format.insert("fileURI".to_string(), uri.clone());
        }

        Ok(OutputManager::new(
            name,
            Box::new(sink),
            self.buffer_capacity,
            self.immediate_flush,
        )
        .with_content_format(content_format))
    }
}

pub struct FileAppender {
    output: ManagedOutput,
    path: PathBuf,
}

impl FileAppender {
    /// Builder with defaults: append, immediate flush, 256 KiB buffer, text format.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rust_async_logger::appenders::FileAppender;
    /// use rust_async_logger::core::{ManagerRegistry, StatusLogger};
    /// use std::sync::Arc;
    ///
    /// let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));
    /// let appender = FileAppender::builder("/var/log/app.log")
    ///     .immediate_flush(false)
    ///     .build(&registry)
    ///     .unwrap();
    /// ```
    pub fn builder(path: impl Into<PathBuf>) -> FileAppenderBuilder {
        FileAppenderBuilder::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manager(&self) -> &ManagerHandle {
        self.output.handle()
    }
}

managed_appender!(FileAppender);

#[derive(Debug, Clone)]
pub struct FileAppenderBuilder {
    name: Option<String>,
    manager_name: Option<String>,
    data: FileManagerData,
    format: OutputFormat,
    timestamp_format: TimestampFormat,
    formatter: Option<Arc<dyn Formatter>>,
    filter: Option<FilterChain>,
}

impl FileAppenderBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            manager_name: None,
            data: FileManagerData::new(path),
            format: OutputFormat::Text,
            timestamp_format: TimestampFormat::default(),
            formatter: None,
            filter: None,
        }
    }

    /// Appender name (defaults to "file").
    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Manager name (defaults to the path). Appenders with the same manager
    /// name share one buffer and file handle.
    #[must_use = "builder methods return a new value"]
    pub fn manager_name(mut self, name: impl Into<String>) -> Self {
        self.manager_name = Some(name.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn append(mut self, append: bool) -> Self {
        self.data.append = append;
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
    pub fn locking(mut self, locking: bool) -> Self {
        self.data.locking = locking;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn advertise_uri(mut self, uri: impl Into<String>) -> Self {
        self.data.advertise_uri = Some(uri.into());
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

    /// Use a custom formatter instead of `format`.
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

    /// Acquire the manager and build the appender.
    ///
    /// # Errors
    ///
    /// Returns `ManagerCreation` if the file cannot be opened.
    pub fn build(self, registry: &Arc<ManagerRegistry>) -> Result<FileAppender> {
        if self.data.path.as_os_str().is_empty() {
            return Err(LoggerError::config("FileAppender", "path must not be empty"));
        }

        let manager_name = self
            .manager_name
            .unwrap_or_else(|| self.data.path.display().to_string());
        let handle = registry.acquire(&manager_name, &self.data)?;
        let formatter = self
            .formatter
            .unwrap_or_else(|| self.format.build(self.timestamp_format, false));

        let mut output = ManagedOutput::new(
            self.name.unwrap_or_else(|| "file".to_string()),
            handle,
            formatter,
        );
        output.set_filter(self.filter);

        Ok(FileAppender {
            output,
            path: self.data.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Appender, EventSlot, Level, SlotValues, StatusLogger};
    use std::fs;
    use tempfile::TempDir;

    fn event(text: &str) -> EventSlot {
        EventSlot::from_values(SlotValues::new(Arc::from("file-test"), Level::Info, text))
    }

    fn registry() -> Arc<ManagerRegistry> {
        ManagerRegistry::new(Arc::new(StatusLogger::silent()))
    }

    #[test]
    fn test_buffered_until_end_of_batch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let registry = registry();
        let mut appender = FileAppender::builder(&path)
            .immediate_flush(false)
            .build(&registry)
            .unwrap();

        appender.append(&event("first"), false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        appender.append(&event("second"), true).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains("file-test - first"));
    }

    #[test]
    fn test_two_appenders_share_manager() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.log");
        let registry = registry();

        let mut a = FileAppender::builder(&path).name("a").build(&registry).unwrap();
        let mut b = FileAppender::builder(&path)
            .name("b")
            .append(false)
            .build(&registry)
            .unwrap();

        assert!(Arc::ptr_eq(a.manager().manager(), b.manager().manager()));
        a.append(&event("from a"), false).unwrap();
        b.append(&event("from b"), true).unwrap();

        drop(a);
        assert!(registry.contains(&path.display().to_string()));
        drop(b);
        assert!(registry.is_empty());

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_truncate_when_not_appending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.log");
        fs::write(&path, "stale\n").unwrap();

        let registry = registry();
        let mut appender = FileAppender::builder(&path).append(false).build(&registry).unwrap();
        appender.append(&event("new"), true).unwrap();
        drop(appender);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("stale"));
        assert!(contents.contains("new"));
    }

    #[test]
    fn test_advertise_uri_in_content_format() {
        let dir = TempDir::new().unwrap();
        let registry = registry();
        let appender = FileAppender::builder(dir.path().join("adv.log"))
            .advertise_uri("file:///logs/adv.log")
            .build(&registry)
            .unwrap();
        assert_eq!(
            appender.manager().content_format().get("fileURI").map(String::as_str),
            Some("file:///logs/adv.log")
        );
    }

    #[test]
    fn test_unopenable_path_fails_build() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let registry = registry();
        let result = FileAppender::builder(blocker.join("app.log")).build(&registry);
        assert!(matches!(result, Err(LoggerError::ManagerCreation { .. })));
        assert!(registry.is_empty());
    }
}
