//! Basic logger usage example
//!
//! Demonstrates synchronous logging to the console with a threshold filter,
//! markers and thread context.
//!
//! Run with: cargo run --example basic_usage

use rust_async_logger::prelude::*;
use rust_async_logger::info;
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Rust Async Logger - Basic Usage Example ===\n");

    let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));

    let logger = Logger::builder()
        .name("basic")
        .appender(ConsoleAppender::builder().build(&registry)?)
        .filter(ThresholdFilter::builder().level(Level::Trace).build())
        .sync_mode()
        .build()?;

    println!("1. Logging at different levels:");
    logger.trace("This is a trace message");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warn("This is a warning message");
    logger.error("This is an error message");
    logger.fatal("This is a fatal message");

    println!("\n2. Threshold at INFO - trace and debug won't show:");
    let quieter = Logger::builder()
        .name("quiet")
        .appender(ConsoleAppender::builder().build(&registry)?)
        .filter(ThresholdFilter::builder().level(Level::Info).build())
        .build()?;
    quieter.trace("Trace message (hidden)");
    quieter.debug("Debug message (hidden)");
    quieter.info("Info message (visible)");
    quieter.warn("Warning message (visible)");

    println!("\n3. Markers, parameters and context:");
    let audit = Marker::new("AUDIT");
    {
        let _user = ThreadContext::scoped("user", "alice");
        logger.with_marker(audit).info("password changed");
        logger.log_params(Level::Info, "{} items in cart, total {}", &[&3, &"12.50 EUR"]);
    }
    info!(
        logger,
        "Shared console manager has {:?} references",
        registry.ref_count("console.stdout")
    );

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
