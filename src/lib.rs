//! # Rust Async Logger
//!
//! The event-delivery core of a logging framework: admission filters, a
//! reusable-slot ring buffer between many producers and one dispatcher
//! thread, and named, reference-counted output managers that buffer writes
//! and flush at the end of each batch.
//!
//! ## Features
//!
//! - **Allocation-light hand-off**: events are written into preallocated
//!   ring slots and delivered strictly in claim order
//! - **Batch-aware flushing**: managers flush when the dispatcher runs out of
//!   published events, not after every line
//! - **Shared outputs**: appenders naming the same manager share one buffer
//!   and one sink
//! - **Isolated failures**: write errors and appender panics go to a status
//!   channel and never reach producers
//!
//! ## Example
//!
//! ```
//! use rust_async_logger::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));
//! let appender = MemoryAppender::builder("memory").build(&registry).unwrap();
//! let record = appender.record().clone();
//!
//! let logger = Logger::builder()
//!     .name("app")
//!     .appender(appender)
//!     .filter(ThresholdFilter::builder().level(Level::Info).build())
//!     .async_mode()
//!     .build()
//!     .unwrap();
//!
//! logger.info("started");
//! logger.debug("not recorded");
//! assert!(logger.shutdown(Duration::from_secs(5)));
//! assert!(record.contents_string().contains("app - started"));
//! ```

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, FileAppender, MemoryAppender, SocketAppender};
    pub use crate::core::{
        Appender, AsyncConfig, ContextGuard, DeliveryMode, Filter, FilterChain, FilterResult,
        Level, Logger, LoggerBuilder, LoggerError, LoggerMetrics, ManagerRegistry, MapMessage,
        Marker, MarkerFilter, Message, NeutralPolicy, OutputFormat, PipelineConfig, Result,
        StackGuard, StatusLogger, ThreadContext, ThresholdFilter, TimestampFormat, WaitStrategy,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use appenders::{ConsoleAppender, FileAppender, MemoryAppender, SocketAppender};
pub use core::{
    Appender, AsyncConfig, ContextGuard, DeliveryMode, Filter, FilterChain, FilterResult, Level,
    Logger, LoggerBuilder, LoggerError, LoggerMetrics, ManagerRegistry, MapMessage, Marker,
    MarkerFilter, Message, NeutralPolicy, OutputFormat, PipelineConfig, Result, StackGuard,
    StatusLogger, ThreadContext, ThresholdFilter, TimestampFormat, WaitStrategy,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
