//! File logging example
//!
//! Demonstrates a JSON-configured pipeline writing to the console and to a
//! buffered file that is flushed at the end of each batch.
//!
//! Run with: cargo run --example file_logging

use rust_async_logger::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"{
    "name": "app",
    "mode": "async",
    "async": { "ring_buffer_size": 256 },
    "filters": [{ "type": "threshold", "level": "debug" }],
    "properties": [
        { "name": "service", "value": "${service:-demo}", "substitutable": true }
    ],
    "variables": { "service": "file-logging" },
    "appenders": [
        { "type": "console", "colors": true },
        { "type": "file", "path": "application.log", "immediate_flush": false,
          "advertise_uri": "file://application.log", "format": "json" }
    ]
}"#;

fn main() -> Result<()> {
    println!("=== Rust Async Logger - File Logging Example ===\n");

    let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));
    let config = PipelineConfig::from_json_str(CONFIG)?;
    let logger = Logger::from_config(&config, &registry)?;

    println!("1. Logging to both console and file:");
    logger.info("Application started");
    logger.debug("Loading configuration...");
    logger.info("Configuration loaded successfully");
    logger.warn("Using default settings for some options");
    logger.info("Connecting to database...");
    logger.info("Database connection established");
    logger.log_with_error(
        Level::Error,
        "Failed to load optional plugin",
        std::io::Error::new(std::io::ErrorKind::NotFound, "plugin.so not found"),
    );
    logger.info("Application initialization complete");

    println!("\n2. Performing some operations:");
    for i in 1..=5 {
        logger.log_params(Level::Info, "Processing item {}/5", &[&i]);
        if i == 3 {
            logger.warn("Item 3 took longer than expected");
        }
    }
    logger.info("All operations completed");

    if let Some(file) = registry.get("application.log") {
        println!("\n   file manager advertises {:?}", file.content_format().get("fileURI"));
    }

    logger.flush()?;
    logger.shutdown(Duration::from_secs(5));

    println!("\n=== Example completed successfully! ===");
    println!("Check 'application.log' for the full log output");

    Ok(())
}
