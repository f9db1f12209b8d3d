//! Appender implementations
//!
//! Every built-in appender formats into a reused buffer and writes through a
//! handle on a named output manager. Appenders naming the same manager share
//! its buffer and sink.

/// Implement `Appender` for a type wrapping a `ManagedOutput` in `self.output`.
macro_rules! managed_appender {
    ($ty:ty) => {
        impl $crate::core::Appender for $ty {
            fn append(
                &mut self,
                event: &$crate::core::EventSlot,
                end_of_batch: bool,
            ) -> $crate::core::Result<()> {
                self.output.append(event, end_of_batch)
            }

            fn flush(&mut self) -> $crate::core::Result<()> {
                self.output.flush()
            }

            fn name(&self) -> &str {
                self.output.name()
            }

            fn filter(&self) -> Option<&$crate::core::FilterChain> {
                self.output.filter()
            }
        }
    };
}

pub mod console;
pub mod file;
pub mod memory;
pub mod network;

pub use console::{ConsoleAppender, ConsoleAppenderBuilder, ConsoleManagerData};
pub use file::{FileAppender, FileAppenderBuilder, FileManagerData};
pub use memory::{MemoryAppender, MemoryAppenderBuilder, MemoryManagerData};
pub use network::{SocketAppender, SocketAppenderBuilder, SocketManagerData};

pub use crate::core::Appender;
