//! Reusable-slot ring buffer for multi-producer / single-consumer hand-off
//!
//! The buffer owns a fixed, power-of-two number of `EventSlot`s allocated once.
//! Sequence numbers grow forever; sequence `s` lives in slot `s & mask`.
//!
//! - Producers reserve a sequence with an atomic fetch-and-add on the claim
//!   cursor. If the consumer has not yet released the slot's previous
//!   generation (`s - capacity`), the producer waits: this is the only
//!   backpressure point and nothing is ever dropped.
//! - `SlotClaim::publish` overwrites the whole slot and then marks the
//!   sequence available with a `Release` store on the slot's availability
//!   word. Producers never wait for one another to publish.
//! - The single `EventConsumer` walks sequences strictly in claim order,
//!   observing slot `s` only once its availability word reads `s + 1`, and
//!   releases it by advancing the consumed cursor.
//!
//! The only way to write a slot is through a `SlotClaim`, and the only way to
//! read one is through a `ConsumedEvent`; both hand the slot back on drop.

use super::error::{LoggerError, Result};
use super::event::{EventSlot, SlotValues};
use crossbeam_utils::{Backoff, CachePadded};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{fence, AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Largest ring the buffer accepts (16 Mi slots).
pub const MAX_RING_BUFFER_SIZE: usize = 1 << 24;

/// Upper bound on a single blocking wait, so a missed wake-up costs at most this.
const PARK_INTERVAL: Duration = Duration::from_millis(10);

/// How waiting threads (consumer on empty, producers on full) pass the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitStrategy {
    /// Park on a condition variable; lowest CPU use.
    #[default]
    Block,
    /// Spin briefly, then yield the thread.
    Yield,
    /// Busy-spin; lowest latency, burns a core.
    Spin,
}

/// Condition variable paired with a waiter count, so notifiers skip the
/// lock entirely when nobody is parked.
struct Signal {
    lock: Mutex<()>,
    cond: Condvar,
    waiters: AtomicUsize,
}

impl Signal {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    /// Park until `ready` holds or `deadline` passes. Returns `ready()`.
    fn wait_until(&self, deadline: Instant, ready: impl Fn() -> bool) -> bool {
        let mut guard = self.lock.lock();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        let mut result = ready();
        while !result {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let slice = (deadline - now).min(PARK_INTERVAL);
            self.cond.wait_for(&mut guard, slice);
            result = ready();
        }
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Wake parked threads. The state change must be stored before calling.
    fn notify(&self) {
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::SeqCst) > 0 {
            let _guard = self.lock.lock();
            self.cond.notify_all();
        }
    }
}

pub struct RingBuffer {
    slots: Box<[UnsafeCell<EventSlot>]>,
    /// Per slot: `sequence + 1` of the last generation published into it.
    available: Box<[AtomicU64]>,
    mask: u64,
    capacity: u64,
    /// Next sequence handed to a producer.
    claim_cursor: CachePadded<AtomicU64>,
    /// Every sequence below this has been released by the consumer.
    consumed: CachePadded<AtomicU64>,
    consumer_taken: AtomicBool,
    /// Set by `wake_consumer`, cleared when a waiting consumer sees it.
    wake_requested: AtomicBool,
    closed: AtomicBool,
    wait_strategy: WaitStrategy,
    data_signal: Signal,
    space_signal: Signal,
}

// SAFETY: slots are only touched through the claim/consume protocol:
// - a producer writes slot `s & mask` only after claiming `s` (unique per
//   fetch_add) and observing `consumed > s - capacity`, so the previous
//   generation has been released and no other live claim maps to that slot;
// - the single consumer reads it only after an Acquire load sees the
//   producer's Release store of `s + 1` in `available`, and hands it back
//   with a Release store to `consumed`.
unsafe impl Send for RingBuffer {}
// SAFETY: see above.
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring with at least `requested` slots, rounded up to a power of two.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if `requested` is zero or larger than
    /// [`MAX_RING_BUFFER_SIZE`].
    pub fn new(requested: usize, wait_strategy: WaitStrategy) -> Result<Self> {
        if requested == 0 || requested > MAX_RING_BUFFER_SIZE {
            return Err(LoggerError::config(
                "RingBuffer",
                format!(
                    "size must be between 1 and {}, got {}",
                    MAX_RING_BUFFER_SIZE, requested
                ),
            ));
        }
        let capacity = requested.next_power_of_two().max(2);

        let slots: Vec<UnsafeCell<EventSlot>> =
            (0..capacity).map(|_| UnsafeCell::new(EventSlot::new())).collect();
        let available: Vec<AtomicU64> = (0..capacity).map(|_| AtomicU64::new(0)).collect();

        Ok(Self {
            slots: slots.into_boxed_slice(),
            available: available.into_boxed_slice(),
            mask: capacity as u64 - 1,
            capacity: capacity as u64,
            claim_cursor: CachePadded::new(AtomicU64::new(0)),
            consumed: CachePadded::new(AtomicU64::new(0)),
            consumer_taken: AtomicBool::new(false),
            wake_requested: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            wait_strategy,
            data_signal: Signal::new(),
            space_signal: Signal::new(),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn wait_strategy(&self) -> WaitStrategy {
        self.wait_strategy
    }

    /// Sequences claimed so far.
    #[inline]
    pub fn claimed(&self) -> u64 {
        self.claim_cursor.load(Ordering::SeqCst)
    }

    /// Sequences released by the consumer so far.
    #[inline]
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Acquire)
    }

    /// Claimed slots not yet released by the consumer.
    pub fn backlog(&self) -> u64 {
        self.claimed().saturating_sub(self.consumed())
    }

    pub fn remaining_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.backlog())
    }

    #[inline]
    fn index(&self, sequence: u64) -> usize {
        (sequence & self.mask) as usize
    }

    #[inline]
    fn is_published(&self, sequence: u64) -> bool {
        self.available[self.index(sequence)].load(Ordering::Acquire) == sequence + 1
    }

    #[inline]
    fn has_free_slot(&self, sequence: u64) -> bool {
        sequence < self.consumed.load(Ordering::Acquire) + self.capacity
    }

    /// Reserve the next sequence, waiting while the ring is full.
    ///
    /// A sequence taken is always resolved: if the ring closes while the
    /// producer holds it, the slot is published empty once it comes free, so
    /// a consumer draining up to [`claimed`](Self::claimed) never waits on it.
    ///
    /// # Errors
    ///
    /// Returns `LoggerStopped` if the ring is closed.
    pub fn claim(&self) -> Result<SlotClaim<'_>> {
        if self.is_closed() {
            return Err(LoggerError::LoggerStopped);
        }
        // SeqCst pairs with `close`: either the consumer sees this sequence
        // in `claimed()` after closing, or this producer sees the ring closed.
        let sequence = self.claim_cursor.fetch_add(1, Ordering::SeqCst);
        let waited = !self.has_free_slot(sequence);
        if waited && !self.wait_for_free_slot(sequence) {
            return Err(LoggerError::LoggerStopped);
        }
        let claim = SlotClaim {
            ring: self,
            sequence,
            waited,
            published: false,
        };
        if self.is_closed() {
            // dropping publishes the slot empty
            drop(claim);
            return Err(LoggerError::LoggerStopped);
        }
        Ok(claim)
    }

    /// Closed with no consumer left to free slots.
    fn is_abandoned(&self) -> bool {
        self.is_closed() && !self.consumer_taken.load(Ordering::SeqCst)
    }

    /// Returns `false` if the ring was closed and its consumer dropped
    /// before the slot came free.
    fn wait_for_free_slot(&self, sequence: u64) -> bool {
        let backoff = Backoff::new();
        while !self.has_free_slot(sequence) {
            if self.is_abandoned() {
                return false;
            }
            match self.wait_strategy {
                WaitStrategy::Block if backoff.is_completed() => {
                    self.space_signal.wait_until(Instant::now() + PARK_INTERVAL, || {
                        self.has_free_slot(sequence) || self.is_abandoned()
                    });
                }
                WaitStrategy::Spin => backoff.spin(),
                _ => backoff.snooze(),
            }
        }
        true
    }

    /// Stop handing out slots.
    ///
    /// Sequences already claimed still resolve: their producers publish
    /// them, or publish them empty if they see the ring closed first. A
    /// consumer that keeps draining until it reaches `claimed()` therefore
    /// sees every event published before the close. Producers still
    /// waiting for space give up once the consumer is dropped.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _guard = self.space_signal.lock.lock();
        self.space_signal.cond.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn mark_published(&self, sequence: u64) {
        self.available[self.index(sequence)].store(sequence + 1, Ordering::Release);
        if self.wait_strategy == WaitStrategy::Block {
            self.data_signal.notify();
        }
    }

    /// Wake a consumer parked on an empty ring, e.g. for shutdown or a
    /// flush request. A consumer not waiting yet returns from its next wait.
    pub fn wake_consumer(&self) {
        self.wake_requested.store(true, Ordering::SeqCst);
        let _guard = self.data_signal.lock.lock();
        self.data_signal.cond.notify_all();
    }

    /// Take the single consumer. Returns `None` if it was already taken.
    pub fn consumer(self: &Arc<Self>) -> Option<EventConsumer> {
        if self.consumer_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(EventConsumer {
            ring: Arc::clone(self),
            next: self.consumed(),
        })
    }

    /// # Safety
    ///
    /// Caller must own `sequence` under the claim/consume protocol.
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot_mut(&self, sequence: u64) -> &mut EventSlot {
        &mut *self.slots[self.index(sequence)].get()
    }
}

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("claimed", &self.claimed())
            .field("consumed", &self.consumed())
            .field("wait_strategy", &self.wait_strategy)
            .finish()
    }
}

/// Exclusive right to populate one slot.
///
/// Surrender it with [`publish`](Self::publish). A claim dropped without
/// publishing still releases its sequence, as an empty slot the consumer
/// skips, so the ring never stalls behind an abandoned claim.
pub struct SlotClaim<'a> {
    ring: &'a RingBuffer,
    sequence: u64,
    waited: bool,
    published: bool,
}

impl SlotClaim<'_> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// `true` if the producer had to wait for the consumer to free the slot.
    pub fn waited(&self) -> bool {
        self.waited
    }

    /// Overwrite the slot with `values` and make it visible to the consumer.
    pub fn publish(mut self, values: SlotValues<'_>) {
        // SAFETY: this claim owns `sequence` until it is marked published.
        let slot = unsafe { self.ring.slot_mut(self.sequence) };
        slot.set_values(values);
        self.published = true;
        self.ring.mark_published(self.sequence);
    }
}

impl Drop for SlotClaim<'_> {
    fn drop(&mut self) {
        if !self.published {
            // SAFETY: still owned by this claim.
            unsafe { self.ring.slot_mut(self.sequence) }.clear();
            self.ring.mark_published(self.sequence);
        }
    }
}

/// The ring's single reader.
pub struct EventConsumer {
    ring: Arc<RingBuffer>,
    next: u64,
}

impl EventConsumer {
    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    /// Next sequence this consumer will read.
    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    /// `true` if the next sequence has been published.
    pub fn has_available(&self) -> bool {
        self.ring.is_published(self.next)
    }

    /// `true` once every claimed sequence has been read and released.
    pub fn is_caught_up(&self) -> bool {
        self.next >= self.ring.claimed()
    }

    /// A published, non-empty event is waiting at `sequence`.
    fn has_event_at(&self, sequence: u64) -> bool {
        if !self.ring.is_published(sequence) {
            return false;
        }
        // SAFETY: published and not yet released, so only this consumer may
        // read it; it is not the slot currently lent out (distinct sequence
        // within one capacity window).
        !unsafe { &*self.ring.slots[self.ring.index(sequence)].get() }.is_void()
    }

    fn release(&mut self) {
        self.next += 1;
        self.ring.consumed.store(self.next, Ordering::Release);
        if self.ring.wait_strategy == WaitStrategy::Block {
            self.ring.space_signal.notify();
        }
    }

    /// Borrow the next published event, if any.
    ///
    /// The event's end-of-batch flag is set when no further event is
    /// published at this instant. The slot returns to producers when the
    /// returned guard is dropped.
    pub fn try_next(&mut self) -> Option<ConsumedEvent<'_>> {
        loop {
            if !self.ring.is_published(self.next) {
                return None;
            }
            let sequence = self.next;
            // SAFETY: published and unreleased; the consumer owns it now.
            let slot = unsafe { self.ring.slot_mut(sequence) };
            if slot.is_void() {
                self.release();
                continue;
            }
            let end_of_batch = !self.has_event_at(sequence + 1);
            // SAFETY: as above; re-borrowed after the shared peek at the next slot.
            unsafe { self.ring.slot_mut(sequence) }.set_end_of_batch(end_of_batch);
            return Some(ConsumedEvent {
                consumer: self,
                sequence,
                end_of_batch,
            });
        }
    }

    /// Hand every currently published event to `handler`, in order.
    ///
    /// Returns the number of events handled.
    pub fn drain<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(&EventSlot, u64, bool),
    {
        let mut handled = 0;
        while let Some(event) = self.try_next() {
            handler(&*event, event.sequence(), event.end_of_batch());
            handled += 1;
        }
        handled
    }

    /// Wait until an event is published, the ring's `wake_consumer` is
    /// called, or `timeout` elapses. Returns `true` if an event is available.
    pub fn wait_for_event(&self, timeout: Duration) -> bool {
        if self.has_available() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let woken = || self.ring.wake_requested.swap(false, Ordering::SeqCst);
        match self.ring.wait_strategy {
            WaitStrategy::Block => {
                self.ring
                    .data_signal
                    .wait_until(deadline, || self.has_available() || woken());
                self.has_available()
            }
            strategy => {
                let backoff = Backoff::new();
                while !self.has_available() {
                    if woken() || Instant::now() >= deadline {
                        return self.has_available();
                    }
                    if strategy == WaitStrategy::Spin {
                        backoff.spin();
                    } else {
                        backoff.snooze();
                    }
                }
                true
            }
        }
    }
}

impl Drop for EventConsumer {
    fn drop(&mut self) {
        self.ring.consumer_taken.store(false, Ordering::SeqCst);
        // producers waiting on a closed ring re-check and give up
        let _guard = self.ring.space_signal.lock.lock();
        self.ring.space_signal.cond.notify_all();
    }
}

/// A published event lent to the consumer.
pub struct ConsumedEvent<'a> {
    consumer: &'a mut EventConsumer,
    sequence: u64,
    end_of_batch: bool,
}

impl ConsumedEvent<'_> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn end_of_batch(&self) -> bool {
        self.end_of_batch
    }
}

impl Deref for ConsumedEvent<'_> {
    type Target = EventSlot;

    fn deref(&self) -> &EventSlot {
        // SAFETY: the consumer owns this sequence until the guard drops.
        unsafe { &*self.consumer.ring.slots[self.consumer.ring.index(self.sequence)].get() }
    }
}

impl Drop for ConsumedEvent<'_> {
    fn drop(&mut self) {
        self.consumer.release();
    }
}
