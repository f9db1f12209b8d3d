//! Logging macros with `format!` arguments.
//!
//! The message is only formatted when the logger's filters would admit an
//! event at that level.
//!
//! # Examples
//!
//! ```
//! use rust_async_logger::prelude::*;
//! use rust_async_logger::info;
//!
//! let logger = Logger::new();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//!
//! let user_id = 42;
//! let action = "login";
//! info!(logger, "User {} performed action: {}", user_id, action);
//! ```

/// Log a formatted message at an explicit level.
///
/// # Examples
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_async_logger::log;
/// log!(logger, Level::Info, "Simple message");
/// log!(logger, Level::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let level = $level;
        if $logger.is_enabled(level) {
            $logger.log(level, ::std::format!($($arg)+));
        }
    }};
}

/// Log a trace-level message.
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_async_logger::trace;
/// trace!(logger, "Entering function: calculate()");
/// trace!(logger, "Variable value: {}", 42);
/// ```
#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Trace, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Debug, $($arg)+)
    };
}

/// Log an info-level message.
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_async_logger::info;
/// info!(logger, "Processing {} items", 100);
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Info, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Warn, $($arg)+)
    };
}

/// Log an error-level message.
///
/// ```
/// # use rust_async_logger::prelude::*;
/// # let logger = Logger::new();
/// use rust_async_logger::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error");
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::Fatal, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::appenders::MemoryAppender;
    use crate::core::{Level, Logger, ManagerRegistry, StatusLogger, ThresholdFilter};
    use std::sync::Arc;

    fn recorded_logger(threshold: Level) -> (Logger, crate::core::MemoryRecord) {
        let registry = ManagerRegistry::new(Arc::new(StatusLogger::silent()));
        let appender = MemoryAppender::builder("macros")
            .immediate_flush(true)
            .build(&registry)
            .unwrap();
        let record = appender.record().clone();
        let logger = Logger::builder()
            .name("macros")
            .appender(appender)
            .filter(ThresholdFilter::builder().level(threshold).build())
            .status(Arc::new(StatusLogger::silent()))
            .build()
            .unwrap();
        (logger, record)
    }

    #[test]
    fn test_log_macro_formats_arguments() {
        let (logger, record) = recorded_logger(Level::Info);
        log!(logger, Level::Info, "Formatted: {}", 42);
        assert!(record.contents_string().contains("macros - Formatted: 42"));
    }

    #[test]
    fn test_level_macros() {
        let (logger, record) = recorded_logger(Level::Trace);
        trace!(logger, "t {}", 1);
        debug!(logger, "d {}", 2);
        info!(logger, "i {}", 3);
        warn!(logger, "w {}", 4);
        error!(logger, "e {}", 5);
        fatal!(logger, "f {}", 6);

        let contents = record.contents_string();
        for (level, text) in [
            ("TRACE", "t 1"),
            ("DEBUG", "d 2"),
            ("INFO", "i 3"),
            ("WARN", "w 4"),
            ("ERROR", "e 5"),
            ("FATAL", "f 6"),
        ] {
            assert!(contents.contains(&format!("[{:5}] macros - {}", level, text)));
        }
    }

    #[test]
    fn test_disabled_level_skips_formatting() {
        struct Counted<'a>(&'a std::cell::Cell<u32>);
        impl std::fmt::Display for Counted<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.set(self.0.get() + 1);
                f.write_str("counted")
            }
        }

        let (logger, _record) = recorded_logger(Level::Warn);
        let calls = std::cell::Cell::new(0);
        debug!(logger, "{}", Counted(&calls));
        assert_eq!(calls.get(), 0);
        warn!(logger, "{}", Counted(&calls));
        assert_eq!(calls.get(), 1);
    }
}
