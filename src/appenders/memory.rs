//! In-memory appender
//!
//! Writes through a normal output manager into a [`MemoryRecord`], so tests
//! observe exactly which physical writes and flushes the manager performed.

use crate::core::sink::{MemoryRecord, MemorySink};
use crate::core::{
    FilterChain, Formatter, LineFormatter, ManagedOutput, ManagerFactory, ManagerHandle,
    ManagerRegistry, OutputManager, Result, DEFAULT_BUFFER_SIZE,
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MemoryManagerData {
    pub record: MemoryRecord,
    pub immediate_flush: bool,
    pub buffer_capacity: usize,
}

impl MemoryManagerData {
    pub fn new(record: MemoryRecord) -> Self {
        Self {
            record,
            immediate_flush: false,
            buffer_capacity: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ManagerFactory for MemoryManagerData {
    fn create_manager(&self, name: &str) -> Result<OutputManager> {
        Ok(OutputManager::new(
            name,
            Box::new(MemorySink::new(self.record.clone())),
            self.buffer_capacity,
            self.immediate_flush,
        ))
    }
}

pub struct MemoryAppender {
    output: ManagedOutput,
    record: MemoryRecord,
}

impl MemoryAppender {
    /// Builder for an appender on the manager called `manager_name`.
    pub fn builder(manager_name: impl Into<String>) -> MemoryAppenderBuilder {
        MemoryAppenderBuilder::new(manager_name)
    }

    /// What the manager's sink received. If the manager already existed
    /// under this name, this is the original creator's record.
    pub fn record(&self) -> &MemoryRecord {
        &self.record
    }

    pub fn manager(&self) -> &ManagerHandle {
        self.output.handle()
    }
}

managed_appender!(MemoryAppender);

#[derive(Debug, Clone)]
pub struct MemoryAppenderBuilder {
    name: Option<String>,
    manager_name: String,
    data: MemoryManagerData,
    formatter: Option<Arc<dyn Formatter>>,
    filter: Option<FilterChain>,
}

impl MemoryAppenderBuilder {
    pub fn new(manager_name: impl Into<String>) -> Self {
        Self {
            name: None,
            manager_name: manager_name.into(),
            data: MemoryManagerData::new(MemoryRecord::new()),
            formatter: None,
            filter: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Record into an existing recording instead of a fresh one.
    #[must_use = "builder methods return a new value"]
    pub fn record(mut self, record: MemoryRecord) -> Self {
        self.data.record = record;
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
    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn filter(mut self, filter: FilterChain) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self, registry: &Arc<ManagerRegistry>) -> Result<MemoryAppender> {
        let handle = registry.acquire(&self.manager_name, &self.data)?;
        let formatter = self
            .formatter
            .unwrap_or_else(|| Arc::new(LineFormatter::new().with_thread(false)));

        let mut output = ManagedOutput::new(
            self.name.unwrap_or_else(|| "memory".to_string()),
            handle,
            formatter,
        );
        output.set_filter(self.filter);

        Ok(MemoryAppender {
            output,
            record: self.data.record,
        })
    }
}
