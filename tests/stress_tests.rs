//! Stress tests for the ring buffer and dispatcher
//!
//! These tests verify:
//! - Many producers on a small ring wrap around many times without loss
//! - Every published event is delivered exactly once, in claim order
//! - The last event of every drain is flagged end-of-batch
//! - Abandoned claims never surface as events
//! - Per-producer ordering survives the full logger pipeline

use rust_async_logger::appenders::FileAppender;
use rust_async_logger::core::{
    AsyncConfig, AsyncDispatcher, EventSlot, Level, Logger, LoggerMetrics, ManagerRegistry,
    RingBuffer, SlotValues, StatusLogger, WaitStrategy,
};
use std::collections::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const PRODUCERS: usize = 8;
const EVENTS_PER_PRODUCER: usize = 2_000;

fn producer_name(p: usize) -> Arc<str> {
    Arc::from(format!("producer-{}", p))
}

fn spawn_producers(
    ring: &Arc<RingBuffer>,
    producers: usize,
    events: usize,
) -> Vec<thread::JoinHandle<()>> {
    (0..producers)
        .map(|p| {
            let ring = Arc::clone(ring);
            thread::spawn(move || {
                let name = producer_name(p);
                for i in 0..events {
                    let claim = ring.claim().expect("ring closed under producer");
                    claim.publish(SlotValues::new(Arc::clone(&name), Level::Info, i.to_string()));
                }
            })
        })
        .collect()
}

/// Consume on this thread and check sequence, ordering and batch flags.
#[test]
fn test_exactly_once_in_claim_order_with_wraparound() {
    for strategy in [WaitStrategy::Block, WaitStrategy::Yield] {
        let ring = Arc::new(RingBuffer::new(8, strategy).expect("Failed to create ring"));
        let mut consumer = ring.consumer().expect("consumer already taken");
        let producers = spawn_producers(&ring, PRODUCERS, EVENTS_PER_PRODUCER);

        let total = PRODUCERS * EVENTS_PER_PRODUCER;
        let mut next_expected: HashMap<String, usize> = HashMap::new();
        let mut last_sequence: Option<u64> = None;
        let mut delivered = 0;

        while delivered < total {
            let mut last_flag = None;
            let drained = consumer.drain(|event: &EventSlot, sequence, end_of_batch| {
                if let Some(prev) = last_sequence {
                    assert_eq!(sequence, prev + 1, "sequence gap or reorder");
                }
                last_sequence = Some(sequence);

                let expected = next_expected.entry(event.logger_name().to_string()).or_insert(0);
                assert_eq!(event.message().formatted(), expected.to_string());
                *expected += 1;
                last_flag = Some(end_of_batch);
            });
            if drained > 0 {
                assert_eq!(last_flag, Some(true), "drain ended without end-of-batch");
                delivered += drained;
            } else {
                consumer.wait_for_event(Duration::from_millis(10));
            }
        }

        for handle in producers {
            handle.join().expect("producer panicked");
        }
        assert_eq!(delivered, total);
        assert_eq!(ring.claimed(), total as u64);
        assert!(next_expected.values().all(|&n| n == EVENTS_PER_PRODUCER));
        assert!(ring.capacity() * 100 < total, "ring should wrap many times");
    }
}

/// The dispatcher thread sees every event once; the final one ends a batch.
#[test]
fn test_dispatcher_under_contention() {
    let ring = Arc::new(RingBuffer::new(16, WaitStrategy::Block).expect("Failed to create ring"));
    let seen: Arc<Mutex<Vec<(String, String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let metrics = Arc::new(LoggerMetrics::new());

    let mut dispatcher = AsyncDispatcher::start(
        Arc::clone(&ring),
        move |event: &EventSlot, end_of_batch: bool| {
            sink.lock().push((
                event.logger_name().to_string(),
                event.message().formatted().into_owned(),
                end_of_batch,
            ));
            Ok(())
        },
        Arc::clone(&metrics),
        Arc::new(StatusLogger::silent()),
    )
    .expect("Failed to start dispatcher");

    for handle in spawn_producers(&ring, PRODUCERS, EVENTS_PER_PRODUCER) {
        handle.join().expect("producer panicked");
    }
    assert!(dispatcher.shutdown(Duration::from_secs(10)));

    let seen = seen.lock();
    assert_eq!(seen.len(), PRODUCERS * EVENTS_PER_PRODUCER);
    assert!(seen.last().is_some_and(|(_, _, eob)| *eob));
    assert_eq!(metrics.delivered(), seen.len() as u64);
    assert_eq!(
        metrics.end_of_batch_count(),
        seen.iter().filter(|(_, _, eob)| *eob).count() as u64
    );

    let mut per_producer: HashMap<&str, usize> = HashMap::new();
    for (name, message, _) in seen.iter() {
        let next = per_producer.entry(name.as_str()).or_insert(0);
        assert_eq!(message, &next.to_string());
        *next += 1;
    }
}

/// Producers that abandon every third claim leave gaps the consumer skips.
#[test]
fn test_abandoned_claims_skipped_under_load() {
    let ring = Arc::new(RingBuffer::new(4, WaitStrategy::Yield).expect("Failed to create ring"));
    let mut consumer = ring.consumer().expect("consumer already taken");

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let name = producer_name(p);
                let mut published = 0;
                for i in 0..900 {
                    let claim = ring.claim().expect("ring closed under producer");
                    if i % 3 == 2 {
                        drop(claim);
                    } else {
                        claim.publish(SlotValues::new(Arc::clone(&name), Level::Warn, "kept"));
                        published += 1;
                    }
                }
                published
            })
        })
        .collect();

    let mut delivered = 0;
    let expected = 4 * 600;
    while delivered < expected {
        let drained = consumer.drain(|event: &EventSlot, _, _| {
            assert_eq!(event.message().formatted(), "kept");
        });
        if drained == 0 {
            consumer.wait_for_event(Duration::from_millis(10));
        }
        delivered += drained;
    }

    let published: usize = producers
        .into_iter()
        .map(|h| h.join().expect("producer panicked"))
        .sum();
    assert_eq!(published, expected);
    assert_eq!(delivered, expected);
    assert!(consumer.is_caught_up());
}

/// Full pipeline: per-thread order is preserved in the file.
#[test]
fn test_logger_preserves_per_thread_order() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let log_file = temp_dir.path().join("stress.log");
    let registry = ManagerRegistry::new(Arc::new(StatusLogger::silent()));

    let appender = FileAppender::builder(&log_file)
        .immediate_flush(false)
        .build(&registry)
        .expect("Failed to create appender");
    let logger = Arc::new(
        Logger::builder()
            .name("stress")
            .appender(appender)
            .async_config(AsyncConfig::with_ring_buffer_size(32))
            .status(Arc::new(StatusLogger::silent()))
            .build()
            .expect("Failed to build logger"),
    );

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..500 {
                    logger.log_params(Level::Info, "t{} #{}", &[&t, &i]);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("producer panicked");
    }
    assert!(logger.shutdown(Duration::from_secs(10)));

    let content = std::fs::read_to_string(&log_file).expect("Failed to read log file");
    let mut next = vec![0usize; PRODUCERS];
    for line in content.lines() {
        let tail = line
            .split_once("stress - ")
            .map(|(_, message)| message)
            .expect("malformed line");
        let (thread_part, count_part) = tail.split_once(" #").expect("malformed message");
        let t: usize = thread_part.trim_start_matches('t').parse().expect("bad thread id");
        let i: usize = count_part.parse().expect("bad counter");
        assert_eq!(i, next[t], "thread {} out of order", t);
        next[t] += 1;
    }
    assert!(next.iter().all(|&n| n == 500));
    assert_eq!(logger.metrics().delivered(), (PRODUCERS * 500) as u64);
}

/// Producers blocked on a full ring are released once the logger stops.
#[test]
fn test_shutdown_releases_blocked_producers() {
    let appender = rust_async_logger::appenders::MemoryAppender::builder("slow")
        .formatter(Arc::new(SlowFormatter))
        .build(&ManagerRegistry::new(Arc::new(StatusLogger::silent())))
        .expect("Failed to create appender");
    let logger = Arc::new(
        Logger::builder()
            .appender(appender)
            .async_config(AsyncConfig::with_ring_buffer_size(2).shutdown_timeout_ms(100))
            .status(Arc::new(StatusLogger::silent()))
            .build()
            .expect("Failed to build logger"),
    );

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for _ in 0..50 {
                    logger.info("slow");
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    logger.shutdown(Duration::from_millis(100));
    for handle in producers {
        handle.join().expect("producer panicked");
    }

    let metrics = logger.metrics();
    assert_eq!(metrics.published() + metrics.rejected(), 200);
    assert!(metrics.rejected() > 0);
}

#[derive(Debug)]
struct SlowFormatter;

impl rust_async_logger::core::Formatter for SlowFormatter {
    fn format(
        &self,
        event: &EventSlot,
        _end_of_batch: bool,
        out: &mut Vec<u8>,
    ) -> rust_async_logger::Result<()> {
        thread::sleep(Duration::from_millis(5));
        out.extend_from_slice(event.message().formatted().as_bytes());
        out.push(b'\n');
        Ok(())
    }
}
