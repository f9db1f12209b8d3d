//! Async logging example
//!
//! Demonstrates ring-buffer delivery from several producer threads and a
//! bounded shutdown.
//!
//! Run with: cargo run --example async_logging

use rust_async_logger::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust Async Logger - Async Logging Example ===\n");

    let registry = ManagerRegistry::new(Arc::new(StatusLogger::new()));

    let logger = Logger::builder()
        .name("async")
        .appender(ConsoleAppender::builder().immediate_flush(false).build(&registry)?)
        .appender(FileAppender::builder("async_test.log").immediate_flush(false).build(&registry)?)
        .async_config(AsyncConfig::with_ring_buffer_size(1000).wait_strategy(WaitStrategy::Block))
        .build()?;

    println!("1. High-performance async logging:");
    for i in 0..100 {
        logger.log_params(Level::Info, "Message #{}", &[&i]);
    }
    println!("   Logged 100 messages asynchronously");

    println!("\n2. Multi-threaded logging:");
    let logger = Arc::new(logger);
    let handles: Vec<_> = (0..5)
        .map(|thread_id| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..20 {
                    logger.log_params(Level::Info, "Thread {} - Message {}", &[&thread_id, &i]);
                    thread::sleep(Duration::from_millis(10));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("producer thread panicked");
    }
    println!("   5 threads logged 20 messages each");

    if !logger.shutdown(Duration::from_secs(2)) {
        eprintln!("Warning: Logger shutdown timed out");
    }

    let metrics = logger.metrics();
    println!(
        "\n   published={} delivered={} batches={} producer waits={}",
        metrics.published(),
        metrics.delivered(),
        metrics.end_of_batch_count(),
        metrics.producer_waits()
    );

    println!("\n=== Example completed successfully! ===");
    println!("Check 'async_test.log' for file output");

    Ok(())
}
