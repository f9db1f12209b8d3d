//! Serializable pipeline configuration
//!
//! A [`PipelineConfig`] describes one logger: delivery mode, ring settings,
//! filters, properties and appenders. It is loaded from JSON and turned into
//! a running logger by [`Logger::from_config`].
//!
//! ```
//! use rust_async_logger::core::PipelineConfig;
//!
//! let config = PipelineConfig::from_json_str(r#"{
//!     "name": "app",
//!     "mode": "async",
//!     "async": { "ring_buffer_size": 1024, "wait_strategy": "yield" },
//!     "filters": [{ "type": "threshold", "level": "info", "on_match": "accept" }],
//!     "properties": [
//!         { "name": "host", "value": "${env:HOSTNAME:-local}", "substitutable": true }
//!     ],
//!     "appenders": [{ "type": "console", "target": "stderr" }]
//! }"#).unwrap();
//!
//! assert_eq!(config.async_config.ring_buffer_size, 1024);
//! ```

use super::appender::Appender;
use super::error::{LoggerError, Result};
use super::filter::{Filter, FilterChain, MarkerFilter, NeutralPolicy, ThresholdFilter};
use super::formatter::OutputFormat;
use super::logger::{DeliveryMode, Logger};
use super::property::{Property, StrSubstitutor};
use super::registry::ManagerRegistry;
use super::ring_buffer::WaitStrategy;
use super::sink::ConsoleTarget;
use super::timestamp::TimestampFormat;
use crate::appenders::{ConsoleAppender, FileAppender, SocketAppender};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Overrides `ring_buffer_size` when set to a positive integer.
pub const RING_BUFFER_SIZE_ENV: &str = "RUST_ASYNC_LOGGER_RING_BUFFER_SIZE";

pub const DEFAULT_RING_BUFFER_SIZE: usize = 8192;

const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Ring buffer and dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncConfig {
    /// Requested slot count; rounded up to a power of two, minimum 2.
    pub ring_buffer_size: usize,
    pub wait_strategy: WaitStrategy,
    pub shutdown_timeout_ms: u64,
}

impl Default for AsyncConfig {
    fn default() -> Self {
        Self {
            ring_buffer_size: DEFAULT_RING_BUFFER_SIZE,
            wait_strategy: WaitStrategy::default(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
        }
    }
}

impl AsyncConfig {
    pub fn with_ring_buffer_size(size: usize) -> Self {
        Self {
            ring_buffer_size: size,
            ..Self::default()
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn wait_strategy(mut self, strategy: WaitStrategy) -> Self {
        self.wait_strategy = strategy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout_ms(mut self, millis: u64) -> Self {
        self.shutdown_timeout_ms = millis;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Requested ring size, honoring the environment override.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the override is not a positive integer.
    pub fn resolved_ring_size(&self) -> Result<usize> {
        match std::env::var(RING_BUFFER_SIZE_ENV) {
            Ok(raw) => parse_ring_size(&raw),
            Err(_) => Ok(self.ring_buffer_size),
        }
    }
}

fn parse_ring_size(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(LoggerError::config(
            RING_BUFFER_SIZE_ENV,
            format!("expected a positive integer, got '{}'", raw),
        )),
    }
}

/// One filter in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FilterConfig {
    Threshold {
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        on_match: Option<String>,
        #[serde(default)]
        on_mismatch: Option<String>,
    },
    Marker {
        marker: String,
        #[serde(default)]
        on_match: Option<String>,
        #[serde(default)]
        on_mismatch: Option<String>,
    },
}

impl FilterConfig {
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for unknown level or result names.
    pub fn build(&self) -> Result<Arc<dyn Filter>> {
        Ok(match self {
            FilterConfig::Threshold {
                level,
                on_match,
                on_mismatch,
            } => Arc::new(ThresholdFilter::from_names(
                level.as_deref(),
                on_match.as_deref(),
                on_mismatch.as_deref(),
            )?),
            FilterConfig::Marker {
                marker,
                on_match,
                on_mismatch,
            } => Arc::new(MarkerFilter::from_names(
                marker,
                on_match.as_deref(),
                on_mismatch.as_deref(),
            )?),
        })
    }
}

/// Build a chain from filter configs, in order.
pub fn build_filter_chain(filters: &[FilterConfig]) -> Result<FilterChain> {
    let mut chain = FilterChain::new();
    for filter in filters {
        chain.push(filter.build()?);
    }
    Ok(chain)
}

fn chain_or_none(filters: &[FilterConfig]) -> Result<Option<FilterChain>> {
    if filters.is_empty() {
        Ok(None)
    } else {
        build_filter_chain(filters).map(Some)
    }
}

pub type PropertyConfig = Property;

fn default_true() -> bool {
    true
}

/// One appender and the manager it writes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AppenderConfig {
    File {
        #[serde(default)]
        name: Option<String>,
        path: PathBuf,
        /// Manager name; defaults to the path.
        #[serde(default)]
        manager: Option<String>,
        #[serde(default = "default_true")]
        append: bool,
        #[serde(default)]
        immediate_flush: Option<bool>,
        #[serde(default)]
        buffer_size: Option<usize>,
        #[serde(default)]
        locking: bool,
        #[serde(default)]
        advertise_uri: Option<String>,
        #[serde(default)]
        format: OutputFormat,
        #[serde(default)]
        timestamp_format: TimestampFormat,
        #[serde(default)]
        filters: Vec<FilterConfig>,
    },
    Console {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        target: ConsoleTarget,
        #[serde(default)]
        colors: Option<bool>,
        #[serde(default)]
        immediate_flush: Option<bool>,
        #[serde(default)]
        format: OutputFormat,
        #[serde(default)]
        timestamp_format: TimestampFormat,
        #[serde(default)]
        filters: Vec<FilterConfig>,
    },
    Socket {
        #[serde(default)]
        name: Option<String>,
        address: String,
        #[serde(default)]
        write_timeout_ms: Option<u64>,
        #[serde(default)]
        immediate_flush: Option<bool>,
        #[serde(default)]
        buffer_size: Option<usize>,
        #[serde(default)]
        format: OutputFormat,
        #[serde(default)]
        timestamp_format: TimestampFormat,
        #[serde(default)]
        filters: Vec<FilterConfig>,
    },
}

impl AppenderConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AppenderConfig::File { .. } => "file",
            AppenderConfig::Console { .. } => "console",
            AppenderConfig::Socket { .. } => "socket",
        }
    }

    /// Check filter names without opening anything.
    pub fn validate(&self) -> Result<()> {
        chain_or_none(self.filters()).map(|_| ())
    }

    fn filters(&self) -> &[FilterConfig] {
        match self {
            AppenderConfig::File { filters, .. }
            | AppenderConfig::Console { filters, .. }
            | AppenderConfig::Socket { filters, .. } => filters,
        }
    }

    /// Acquire the appender's manager and build it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for bad filter names and
    /// `ManagerCreation` if the manager cannot be opened.
    pub fn build(&self, registry: &Arc<ManagerRegistry>) -> Result<Box<dyn Appender>> {
        let filter = chain_or_none(self.filters())?;

        let appender: Box<dyn Appender> = match self {
            AppenderConfig::File {
                name,
                path,
                manager,
                append,
                immediate_flush,
                buffer_size,
                locking,
                advertise_uri,
                format,
                timestamp_format,
                ..
            } => {
                let mut builder = FileAppender::builder(path.clone())
                    .append(*append)
                    .locking(*locking)
                    .format(*format)
                    .timestamp_format(timestamp_format.clone());
                if let Some(name) = name {
                    builder = builder.name(name.clone());
                }
                if let Some(manager) = manager {
                    builder = builder.manager_name(manager.clone());
                }
                if let Some(immediate_flush) = immediate_flush {
                    builder = builder.immediate_flush(*immediate_flush);
                }
                if let Some(size) = buffer_size {
                    builder = builder.buffer_capacity(*size);
                }
                if let Some(uri) = advertise_uri {
                    builder = builder.advertise_uri(uri.clone());
                }
                if let Some(filter) = filter {
                    builder = builder.filter(filter);
                }
                Box::new(builder.build(registry)?)
            }
            AppenderConfig::Console {
                name,
                target,
                colors,
                immediate_flush,
                format,
                timestamp_format,
                ..
            } => {
                let mut builder = ConsoleAppender::builder()
                    .target(*target)
                    .format(*format)
                    .timestamp_format(timestamp_format.clone());
                if let Some(name) = name {
                    builder = builder.name(name.clone());
                }
                if let Some(colors) = colors {
                    builder = builder.colors(*colors);
                }
                if let Some(immediate_flush) = immediate_flush {
                    builder = builder.immediate_flush(*immediate_flush);
                }
                if let Some(filter) = filter {
                    builder = builder.filter(filter);
                }
                Box::new(builder.build(registry)?)
            }
            AppenderConfig::Socket {
                name,
                address,
                write_timeout_ms,
                immediate_flush,
                buffer_size,
                format,
                timestamp_format,
                ..
            } => {
                let mut builder = SocketAppender::builder(address.clone())
                    .format(*format)
                    .timestamp_format(timestamp_format.clone());
                if let Some(name) = name {
                    builder = builder.name(name.clone());
                }
                if let Some(millis) = write_timeout_ms {
                    builder = builder.write_timeout(Duration::from_millis(*millis));
                }
                if let Some(immediate_flush) = immediate_flush {
                    builder = builder.immediate_flush(*immediate_flush);
                }
                if let Some(size) = buffer_size {
                    builder = builder.buffer_capacity(*size);
                }
                if let Some(filter) = filter {
                    builder = builder.filter(filter);
                }
                Box::new(builder.build(registry)?)
            }
        };
        Ok(appender)
    }
}

/// Complete description of one logger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub mode: DeliveryMode,
    #[serde(rename = "async")]
    pub async_config: AsyncConfig,
    pub neutral_policy: NeutralPolicy,
    pub include_location: bool,
    pub filters: Vec<FilterConfig>,
    pub properties: Vec<PropertyConfig>,
    /// Variables available to `${name}` in substitutable properties.
    pub variables: HashMap<String, String>,
    pub appenders: Vec<AppenderConfig>,
}

impl PipelineConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `JsonError` for malformed JSON and `InvalidConfiguration` for
    /// unknown level or filter result names.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                format!("reading config {}", path.display()),
                e.to_string(),
                e,
            )
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check everything that can be checked without opening sinks.
    pub fn validate(&self) -> Result<()> {
        build_filter_chain(&self.filters)?;
        for appender in &self.appenders {
            appender.validate()?;
        }
        if self.async_config.ring_buffer_size == 0 {
            return Err(LoggerError::config(
                "AsyncConfig",
                "ring_buffer_size must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Logger {
    /// Build a running logger from `config`, acquiring managers from
    /// `registry`. The registry's status logger receives the logger's
    /// diagnostics.
    ///
    /// Appenders whose managers cannot be opened are reported and left out;
    /// every other configuration error is returned.
    pub fn from_config(config: &PipelineConfig, registry: &Arc<ManagerRegistry>) -> Result<Logger> {
        config.validate()?;
        let status = Arc::clone(registry.status());

        let mut builder = Logger::builder()
            .name(config.name.clone())
            .delivery_mode(config.mode)
            .filter_chain(build_filter_chain(&config.filters)?)
            .neutral_policy(config.neutral_policy)
            .include_location(config.include_location)
            .properties(config.properties.iter().cloned())
            .substitutor(Arc::new(StrSubstitutor::with_variables(config.variables.clone())))
            .status(Arc::clone(&status));
        if config.mode == DeliveryMode::Async {
            builder = builder.async_config(config.async_config.clone());
        }

        for appender in &config.appenders {
            match appender.build(registry) {
                Ok(built) => builder = builder.boxed_appender(built),
                Err(e @ LoggerError::ManagerCreation { .. }) => {
                    status.error(
                        "PipelineConfig",
                        format!("{} appender left out: {}", appender.kind(), e),
                    );
                }
                Err(e) => return Err(e),
            }
        }

        builder.build()
    }
}
