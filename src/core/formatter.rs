//! Rendering events to bytes
//!
//! Formatters run on the dispatcher thread and append one record per event
//! to a caller-owned buffer, so appenders can reuse a single allocation.
//! - `LineFormatter`: human-readable single line (default)
//! - `JsonFormatter`: one JSON object per line

use super::error::Result;
use super::event::EventSlot;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Write as _};
use std::sync::Arc;

#[cfg(feature = "console")]
use colored::Colorize;

pub trait Formatter: Send + Sync + fmt::Debug {
    /// Append the rendering of `event` to `out`.
    fn format(&self, event: &EventSlot, end_of_batch: bool, out: &mut Vec<u8>) -> Result<()>;

    fn content_type(&self) -> &'static str {
        "text/plain"
    }
}

/// Formatter selection for configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Example: `[2025-01-08T10:30:45.123Z] [INFO ] [main] app - Request processed`
    #[default]
    Text,

    /// Example: `{"level":"INFO","logger":"app","message":"Request processed",...}`
    Json,
}

impl OutputFormat {
    pub fn build(self, timestamp_format: TimestampFormat, colors: bool) -> Arc<dyn Formatter> {
        match self {
            OutputFormat::Text => Arc::new(
                LineFormatter::new()
                    .with_timestamp_format(timestamp_format)
                    .with_colors(colors),
            ),
            OutputFormat::Json => {
                Arc::new(JsonFormatter::new().with_timestamp_format(timestamp_format))
            }
        }
    }
}

/// Escape line breaks and tabs so one event stays on one line.
fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LineFormatter {
    timestamp_format: TimestampFormat,
    #[cfg_attr(not(feature = "console"), allow(dead_code))]
    use_colors: bool,
    include_thread: bool,
    include_context: bool,
}

impl LineFormatter {
    pub fn new() -> Self {
        Self {
            timestamp_format: TimestampFormat::default(),
            use_colors: false,
            include_thread: true,
            include_context: true,
        }
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Color the level name. Has no effect without the `console` feature.
    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[must_use]
    pub fn with_thread(mut self, include: bool) -> Self {
        self.include_thread = include;
        self
    }

    /// Include the context map and stack.
    #[must_use]
    pub fn with_context(mut self, include: bool) -> Self {
        self.include_context = include;
        self
    }

    fn write_level(&self, event: &EventSlot, line: &mut String) {
        #[cfg(feature = "console")]
        if self.use_colors {
            let level = event.level();
            let _ = write!(line, "{}", format!("{:5}", level.to_str()).color(level.color_code()));
            return;
        }
        let _ = write!(line, "{:5}", event.level().to_str());
    }

    /// Render into a `String` (without touching a byte buffer).
    pub fn format_line(&self, event: &EventSlot) -> String {
        let mut line = String::with_capacity(128);

        line.push('[');
        self.timestamp_format
            .write_millis(event.timestamp_millis(), &mut line);
        line.push_str("] [");
        self.write_level(event, &mut line);
        line.push_str("] ");

        if self.include_thread {
            let _ = write!(line, "[{}] ", event.thread_name());
        }
        if let Some(marker) = event.marker() {
            let _ = write!(line, "[{}] ", marker.name());
        }
        if !event.logger_name().is_empty() {
            let _ = write!(line, "{} - ", event.logger_name());
        }

        escape_into(&event.message().formatted(), &mut line);

        if self.include_context {
            let map = event.context_map();
            if !map.is_empty() {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                line.push_str(" {");
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        line.push_str(", ");
                    }
                    escape_into(key, &mut line);
                    line.push('=');
                    escape_into(&map[key], &mut line);
                }
                line.push('}');
            }

            let stack = event.context_stack();
            if !stack.is_empty() {
                line.push_str(" [");
                for (i, label) in stack.iter().enumerate() {
                    if i > 0 {
                        line.push_str(" > ");
                    }
                    escape_into(label, &mut line);
                }
                line.push(']');
            }
        }

        if let Some(location) = event.location() {
            let _ = write!(line, " ({})", location);
        }

        if let Some(thrown) = event.thrown() {
            line.push_str(" | error: ");
            escape_into(&thrown.to_string(), &mut line);
            let mut source = thrown.source();
            while let Some(cause) = source {
                line.push_str(" | caused by: ");
                escape_into(&cause.to_string(), &mut line);
                source = cause.source();
            }
        }

        line.push('\n');
        line
    }
}

impl Default for LineFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for LineFormatter {
    fn format(&self, event: &EventSlot, _end_of_batch: bool, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.format_line(event).as_bytes());
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn timestamp_value(&self, millis: i64) -> Value {
        match self.timestamp_format {
            TimestampFormat::Unix => Value::from(millis.div_euclid(1000)),
            TimestampFormat::UnixMillis => Value::from(millis),
            _ => Value::String(self.timestamp_format.format_millis(millis)),
        }
    }

    pub fn to_value(&self, event: &EventSlot) -> Value {
        let mut obj = Map::new();

        obj.insert("timestamp".to_string(), self.timestamp_value(event.timestamp_millis()));
        obj.insert("level".to_string(), Value::String(event.level().to_str().to_string()));
        obj.insert("logger".to_string(), Value::String(event.logger_name().to_string()));
        obj.insert("thread".to_string(), Value::String(event.thread_name().to_string()));
        obj.insert(
            "message".to_string(),
            Value::String(event.message().formatted().into_owned()),
        );

        if let Some(marker) = event.marker() {
            obj.insert("marker".to_string(), Value::String(marker.name().to_string()));
        }

        let map = event.context_map();
        if !map.is_empty() {
            let context: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            obj.insert("context".to_string(), Value::Object(context));
        }

        let stack = event.context_stack();
        if !stack.is_empty() {
            obj.insert(
                "stack".to_string(),
                Value::Array(stack.iter().cloned().map(Value::String).collect()),
            );
        }

        if let Some(location) = event.location() {
            let mut loc = Map::new();
            loc.insert("file".to_string(), Value::String(location.file.to_string()));
            loc.insert("line".to_string(), Value::from(location.line));
            loc.insert("column".to_string(), Value::from(location.column));
            obj.insert("location".to_string(), Value::Object(loc));
        }

        if let Some(thrown) = event.thrown() {
            let mut error = Map::new();
            error.insert("message".to_string(), Value::String(thrown.to_string()));
            let mut causes = Vec::new();
            let mut source = thrown.source();
            while let Some(cause) = source {
                causes.push(Value::String(cause.to_string()));
                source = cause.source();
            }
            if !causes.is_empty() {
                error.insert("causes".to_string(), Value::Array(causes));
            }
            obj.insert("error".to_string(), Value::Object(error));
        }

        Value::Object(obj)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, event: &EventSlot, _end_of_batch: bool, out: &mut Vec<u8>) -> Result<()> {
        serde_json::to_writer(&mut *out, &self.to_value(event))?;
        out.push(b'\n');
        Ok(())
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}
