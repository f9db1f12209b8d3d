//! Named, reference-counted output managers
//!
//! The registry is an ordinary value created at start-up and shared through
//! an `Arc`; there is no process-wide instance. Acquiring a name that is
//! already live returns the existing manager and bumps its count; the
//! factory is only used to create missing entries. The manager is flushed
//! and closed when the last handle is released.

use super::error::{LoggerError, Result};
use super::output_manager::{ManagerFactory, OutputManager};
use super::status::StatusLogger;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

const COMPONENT: &str = "ManagerRegistry";

struct RegistryEntry {
    ref_count: usize,
    manager: Arc<OutputManager>,
}

pub struct ManagerRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
    status: Arc<StatusLogger>,
}

impl ManagerRegistry {
    pub fn new(status: Arc<StatusLogger>) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            status,
        })
    }

    pub fn status(&self) -> &Arc<StatusLogger> {
        &self.status
    }

    /// Get the manager called `name`, creating it with `factory` if needed.
    ///
    /// # Errors
    ///
    /// Returns `ManagerCreation` if the factory fails. The failure is also
    /// reported to the status logger; no entry is left behind.
    pub fn acquire(
        self: &Arc<Self>,
        name: &str,
        factory: &dyn ManagerFactory,
    ) -> Result<ManagerHandle> {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(name) {
            entry.ref_count += 1;
            return Ok(ManagerHandle {
                registry: Arc::clone(self),
                manager: Arc::clone(&entry.manager),
                released: false,
            });
        }

        let manager = match factory.create_manager(name) {
            Ok(manager) => Arc::new(manager),
            Err(e) => {
                self.status
                    .error(COMPONENT, format!("unable to create manager '{}': {}", name, e));
                return Err(LoggerError::manager_creation(name, e.to_string()));
            }
        };

        entries.insert(
            name.to_string(),
            RegistryEntry {
                ref_count: 1,
                manager: Arc::clone(&manager),
            },
        );

        Ok(ManagerHandle {
            registry: Arc::clone(self),
            manager,
            released: false,
        })
    }

    /// Give a handle back. Equivalent to dropping it.
    pub fn release(&self, handle: ManagerHandle) {
        drop(handle);
    }

    fn release_manager(&self, manager: &Arc<OutputManager>) {
        let last = {
            let mut entries = self.entries.lock();
            match entries.get_mut(manager.name()) {
                // a recreated entry under the same name is not ours to decrement
                Some(entry) if Arc::ptr_eq(&entry.manager, manager) => {
                    entry.ref_count -= 1;
                    if entry.ref_count == 0 {
                        entries.remove(manager.name());
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            }
        };

        // close outside the registry lock; a slow sink must not block acquisitions
        if last {
            if let Err(e) = manager.close() {
                self.status.error(
                    COMPONENT,
                    format!("error closing manager '{}': {}", manager.name(), e),
                );
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    /// Live handle count for `name`, if it is registered.
    pub fn ref_count(&self, name: &str) -> Option<usize> {
        self.entries.lock().get(name).map(|e| e.ref_count)
    }

    /// Look up a live manager without taking a reference.
    pub fn get(&self, name: &str) -> Option<Arc<OutputManager>> {
        self.entries.lock().get(name).map(|e| Arc::clone(&e.manager))
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Flush every live manager, reporting failures.
    pub fn flush_all(&self) {
        let managers: Vec<Arc<OutputManager>> = self
            .entries
            .lock()
            .values()
            .map(|e| Arc::clone(&e.manager))
            .collect();
        for manager in managers {
            if let Err(e) = manager.flush() {
                self.status.error(
                    COMPONENT,
                    format!("error flushing manager '{}': {}", manager.name(), e),
                );
            }
        }
    }
}

impl fmt::Debug for ManagerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerRegistry")
            .field("managers", &self.names())
            .finish()
    }
}

/// One counted reference to a registered manager.
///
/// Dropping the handle releases it.
pub struct ManagerHandle {
    registry: Arc<ManagerRegistry>,
    manager: Arc<OutputManager>,
    released: bool,
}

impl ManagerHandle {
    pub fn manager(&self) -> &Arc<OutputManager> {
        &self.manager
    }

    /// Release now rather than at drop.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.registry.release_manager(&self.manager);
        }
    }
}

impl Deref for ManagerHandle {
    type Target = OutputManager;

    fn deref(&self) -> &OutputManager {
        &self.manager
    }
}

impl Drop for ManagerHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerHandle")
            .field("name", &self.manager.name())
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::level::Level;
    use crate::core::sink::{MemoryRecord, MemorySink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFactory {
        record: MemoryRecord,
        capacity: usize,
        created: AtomicUsize,
    }

    impl CountingFactory {
        fn new(capacity: usize) -> Self {
            Self {
                record: MemoryRecord::new(),
                capacity,
                created: AtomicUsize::new(0),
            }
        }
    }

    impl ManagerFactory for CountingFactory {
        fn create_manager(&self, name: &str) -> Result<OutputManager> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let sink = Box::new(MemorySink::new(self.record.clone()));
            Ok(OutputManager::new(name, sink, self.capacity, false))
        }
    }

    struct FailingFactory;

    impl ManagerFactory for FailingFactory {
        fn create_manager(&self, _name: &str) -> Result<OutputManager> {
            Err(LoggerError::writer("no such device"))
        }
    }

    fn registry() -> Arc<ManagerRegistry> {
        ManagerRegistry::new(Arc::new(StatusLogger::silent()))
    }

    #[test]
    fn test_same_name_shares_manager() {
        let registry = registry();
        let first_factory = CountingFactory::new(64);
        let second_factory = CountingFactory::new(4);

        let a = registry.acquire("x", &first_factory).unwrap();
        let b = registry.acquire("x", &second_factory).unwrap();

        assert!(Arc::ptr_eq(a.manager(), b.manager()));
        assert_eq!(registry.ref_count("x"), Some(2));
        assert_eq!(first_factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(second_factory.created.load(Ordering::SeqCst), 0);
        // existing entry keeps the original configuration
        assert_eq!(b.buffer_capacity(), 64);
    }

    #[test]
    fn test_closed_only_after_last_release() {
        let registry = registry();
        let factory = CountingFactory::new(64);

        let a = registry.acquire("x", &factory).unwrap();
        let b = registry.acquire("x", &factory).unwrap();
        a.write(b"from a ", false).unwrap();
        b.write(b"from b", false).unwrap();

        registry.release(a);
        assert!(!factory.record.is_closed());
        assert!(registry.contains("x"));

        b.release();
        assert!(factory.record.is_closed());
        assert!(!registry.contains("x"));
        assert_eq!(factory.record.contents_string(), "from a from b");
    }

    #[test]
    fn test_reacquire_after_close_creates_new() {
        let registry = registry();
        let factory = CountingFactory::new(64);

        let old = registry.acquire("x", &factory).unwrap();
        let old_manager = Arc::clone(old.manager());
        drop(old);

        let fresh = registry.acquire("x", &factory).unwrap();
        assert!(!Arc::ptr_eq(&old_manager, fresh.manager()));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
        assert!(old_manager.is_closed());
        assert!(!fresh.is_closed());
    }

    #[test]
    fn test_failed_creation_reported() {
        let status = Arc::new(StatusLogger::silent());
        let registry = ManagerRegistry::new(Arc::clone(&status));

        let result = registry.acquire("broken", &FailingFactory);
        assert!(matches!(result, Err(LoggerError::ManagerCreation { .. })));
        assert!(registry.is_empty());
        assert_eq!(status.count_at_least(Level::Error), 1);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let registry = registry();
        let factory = Arc::new(CountingFactory::new(1024));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let factory = Arc::clone(&factory);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        let handle = registry.acquire("shared", &*factory).unwrap();
                        handle.write(format!("{}-{}\n", i, j).as_bytes(), false).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert!(registry.is_empty());
        let lines = factory.record.contents_string().lines().count();
        assert_eq!(lines, 800);
    }
}
