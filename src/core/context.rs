//! Per-thread diagnostic context
//!
//! This module provides:
//! - `ThreadContext`: a thread-local key/value map and label stack
//! - `ContextGuard`: RAII guard removing a key when dropped
//! - `StackGuard`: RAII guard popping a pushed label when dropped
//!
//! Producers never hand their live context to the pipeline; the logger copies
//! it into the claimed slot, so later changes on the thread do not leak into
//! already published events.

use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

thread_local! {
    static CONTEXT_MAP: RefCell<HashMap<String, String>> = RefCell::new(HashMap::new());
    static CONTEXT_STACK: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Access point for the calling thread's context.
///
/// # Example
///
/// ```
/// use rust_async_logger::core::ThreadContext;
///
/// {
///     let _request = ThreadContext::scoped("request_id", "abc-123");
///     let _span = ThreadContext::push_scoped("checkout");
///     assert_eq!(ThreadContext::get("request_id").as_deref(), Some("abc-123"));
///     assert_eq!(ThreadContext::depth(), 1);
/// }
/// assert!(ThreadContext::get("request_id").is_none());
/// ```
pub struct ThreadContext;

impl ThreadContext {
    /// Set a key, replacing any previous value.
    pub fn put(key: impl Into<String>, value: impl Into<String>) {
        CONTEXT_MAP.with(|map| {
            map.borrow_mut().insert(key.into(), value.into());
        });
    }

    pub fn get(key: &str) -> Option<String> {
        CONTEXT_MAP.with(|map| map.borrow().get(key).cloned())
    }

    pub fn remove(key: &str) {
        CONTEXT_MAP.with(|map| {
            map.borrow_mut().remove(key);
        });
    }

    pub fn contains_key(key: &str) -> bool {
        CONTEXT_MAP.with(|map| map.borrow().contains_key(key))
    }

    /// Set a key for the lifetime of the returned guard.
    #[must_use = "the key is removed as soon as the guard is dropped"]
    pub fn scoped(key: impl Into<String>, value: impl Into<String>) -> ContextGuard {
        let key = key.into();
        Self::put(key.clone(), value);
        ContextGuard {
            key,
            _not_send: PhantomData,
        }
    }

    pub fn push(label: impl Into<String>) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(label.into()));
    }

    pub fn pop() -> Option<String> {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().pop())
    }

    pub fn peek() -> Option<String> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Push a label for the lifetime of the returned guard.
    #[must_use = "the label is popped as soon as the guard is dropped"]
    pub fn push_scoped(label: impl Into<String>) -> StackGuard {
        Self::push(label);
        StackGuard {
            depth: Self::depth(),
            _not_send: PhantomData,
        }
    }

    /// Clear both the map and the stack of the calling thread.
    pub fn clear_all() {
        CONTEXT_MAP.with(|map| map.borrow_mut().clear());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().clear());
    }

    /// Copy of the map.
    pub fn map_snapshot() -> HashMap<String, String> {
        CONTEXT_MAP.with(|map| map.borrow().clone())
    }

    /// Copy of the stack, bottom first.
    pub fn stack_snapshot() -> Vec<String> {
        CONTEXT_STACK.with(|stack| stack.borrow().clone())
    }

    /// Borrow the live map and stack without copying.
    ///
    /// The closure must not modify the thread context.
    pub fn with<R>(f: impl FnOnce(&HashMap<String, String>, &[String]) -> R) -> R {
        CONTEXT_MAP.with(|map| {
            CONTEXT_STACK.with(|stack| {
                let map = map.borrow();
                let stack = stack.borrow();
                f(&map, &stack)
            })
        })
    }
}

/// RAII guard for a scoped context key
pub struct ContextGuard {
    key: String,
    // thread-local state: the guard must be dropped on the thread that created it
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        ThreadContext::remove(&self.key);
    }
}

/// RAII guard for a scoped stack label
pub struct StackGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        // also unwinds labels pushed after this guard and never popped
        CONTEXT_STACK.with(|stack| stack.borrow_mut().truncate(self.depth.saturating_sub(1)));
    }
}
