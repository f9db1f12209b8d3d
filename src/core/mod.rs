//! Core logger types and traits

pub mod appender;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod filter;
pub mod formatter;
pub mod level;
pub mod logger;
pub mod marker;
pub mod message;
pub mod metrics;
pub mod output_manager;
pub mod property;
pub mod registry;
pub mod ring_buffer;
pub mod sink;
pub mod status;
pub mod timestamp;

pub use appender::{Appender, AppenderSet, ManagedOutput};
pub use config::{
    build_filter_chain, AppenderConfig, AsyncConfig, FilterConfig, PipelineConfig,
    PropertyConfig, DEFAULT_RING_BUFFER_SIZE, RING_BUFFER_SIZE_ENV,
};
pub use context::{ContextGuard, StackGuard, ThreadContext};
pub use dispatcher::{AsyncDispatcher, EventHandler, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{LoggerError, Result};
pub use event::{EventSlot, Location, SlotValues, Thrown};
pub use filter::{
    Filter, FilterChain, FilterResult, MarkerFilter, NeutralPolicy, ThresholdFilter,
    ThresholdFilterBuilder,
};
pub use formatter::{Formatter, JsonFormatter, LineFormatter, OutputFormat};
pub use level::Level;
pub use logger::{DeliveryMode, Logger, LoggerBuilder, MarkerLogger};
pub use marker::Marker;
pub use message::{MapFormat, MapMessage, Message};
pub use metrics::LoggerMetrics;
pub use output_manager::{ManagerFactory, OutputManager, DEFAULT_BUFFER_SIZE};
pub use property::{
    merge_properties, NoSubstitution, Property, PropertySet, StrSubstitutor, Substitutor,
};
pub use registry::{ManagerHandle, ManagerRegistry};
pub use ring_buffer::{
    ConsumedEvent, EventConsumer, RingBuffer, SlotClaim, WaitStrategy, MAX_RING_BUFFER_SIZE,
};
pub use sink::{ConsoleTarget, MemoryRecord, Sink};
pub use status::{StatusEntry, StatusLogger};
pub use timestamp::TimestampFormat;
