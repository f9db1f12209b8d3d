//! The reusable event record
//!
//! An `EventSlot` is allocated once when the ring buffer is created and is
//! overwritten in place on every publish. `set_values` assigns every field,
//! so nothing from a slot's previous occupant survives into the next one.

use super::level::Level;
use super::marker::Marker;
use super::message::Message;
use super::property::PropertySet;
use chrono::Utc;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error payload attached to an event.
pub type Thrown = Arc<dyn std::error::Error + Send + Sync + 'static>;

// Thread-local cache for the producer's thread name to avoid repeated allocations
thread_local! {
    static THREAD_NAME_CACHE: RefCell<Option<Arc<str>>> = const { RefCell::new(None) };
}

/// Get cached thread name (or the thread id for unnamed threads)
pub fn current_thread_name() -> Arc<str> {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| {
                let thread = std::thread::current();
                match thread.name() {
                    Some(name) => Arc::from(name),
                    None => Arc::from(format!("{:?}", thread.id())),
                }
            })
            .clone()
    })
}

/// Milliseconds since the Unix epoch.
#[inline]
pub fn current_time_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Source location of the logging call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl Location {
    #[track_caller]
    pub fn caller() -> Self {
        let loc = std::panic::Location::caller();
        Self {
            file: loc.file(),
            line: loc.line(),
            column: loc.column(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Everything a producer supplies for one event.
pub struct SlotValues<'a> {
    pub logger_name: Arc<str>,
    pub marker: Option<Marker>,
    pub fqcn: &'static str,
    pub level: Level,
    pub message: Message,
    pub thrown: Option<Thrown>,
    pub context_map: Option<&'a HashMap<String, String>>,
    pub context_stack: &'a [String],
    pub thread_name: Arc<str>,
    pub location: Option<Location>,
    pub timestamp_millis: i64,
    pub include_location: bool,
    /// Configured properties merged into the copied context map.
    pub properties: Option<&'a PropertySet>,
}

impl<'a> SlotValues<'a> {
    /// Values for an event raised on the current thread right now, with an
    /// empty context. Callers override the remaining fields as needed.
    pub fn new(logger_name: Arc<str>, level: Level, message: impl Into<Message>) -> Self {
        Self {
            logger_name,
            marker: None,
            fqcn: "",
            level,
            message: message.into(),
            thrown: None,
            context_map: None,
            context_stack: &[],
            thread_name: current_thread_name(),
            location: None,
            timestamp_millis: current_time_millis(),
            include_location: false,
            properties: None,
        }
    }
}

pub struct EventSlot {
    logger_name: Arc<str>,
    marker: Option<Marker>,
    fqcn: &'static str,
    level: Level,
    message: Message,
    thrown: Option<Thrown>,
    context_map: HashMap<String, String>,
    context_stack: Vec<String>,
    thread_name: Arc<str>,
    location: Option<Location>,
    timestamp_millis: i64,
    include_location: bool,
    end_of_batch: bool,
    /// Set when a claim was abandoned; the consumer skips void slots.
    void: bool,
}

impl EventSlot {
    pub fn new() -> Self {
        Self {
            logger_name: Arc::from(""),
            marker: None,
            fqcn: "",
            level: Level::Off,
            message: Message::default(),
            thrown: None,
            context_map: HashMap::new(),
            context_stack: Vec::new(),
            thread_name: Arc::from(""),
            location: None,
            timestamp_millis: 0,
            include_location: false,
            end_of_batch: false,
            void: true,
        }
    }

    pub fn from_values(values: SlotValues<'_>) -> Self {
        let mut slot = Self::new();
        slot.set_values(values);
        slot
    }

    /// Overwrite every field from `values`.
    ///
    /// The context map and stack keep their allocations; their contents are
    /// replaced, then configured properties are merged in (event keys win).
    pub fn set_values(&mut self, values: SlotValues<'_>) {
        let SlotValues {
            logger_name,
            marker,
            fqcn,
            level,
            message,
            thrown,
            context_map,
            context_stack,
            thread_name,
            location,
            timestamp_millis,
            include_location,
            properties,
        } = values;

        self.logger_name = logger_name;
        self.marker = marker;
        self.fqcn = fqcn;
        self.level = level;
        self.message = message;
        self.thrown = thrown;

        self.context_map.clear();
        if let Some(map) = context_map {
            self.context_map
                .extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Some(properties) = properties {
            properties.merge_into(&mut self.context_map);
        }

        self.context_stack.clear();
        self.context_stack.extend_from_slice(context_stack);

        self.thread_name = thread_name;
        self.location = if include_location { location } else { None };
        self.timestamp_millis = timestamp_millis;
        self.include_location = include_location;
        self.end_of_batch = false;
        self.void = false;
    }

    /// Drop payload references and mark the slot as carrying no event.
    pub(crate) fn clear(&mut self) {
        self.marker = None;
        self.message = Message::default();
        self.thrown = None;
        self.context_map.clear();
        self.context_stack.clear();
        self.location = None;
        self.end_of_batch = false;
        self.void = true;
    }

    pub fn logger_name(&self) -> &str {
        &self.logger_name
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    pub fn fqcn(&self) -> &'static str {
        self.fqcn
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn thrown(&self) -> Option<&Thrown> {
        self.thrown.as_ref()
    }

    pub fn context_map(&self) -> &HashMap<String, String> {
        &self.context_map
    }

    pub fn context_stack(&self) -> &[String] {
        &self.context_stack
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp_millis
    }

    pub fn include_location(&self) -> bool {
        self.include_location
    }

    pub fn is_end_of_batch(&self) -> bool {
        self.end_of_batch
    }

    pub fn set_end_of_batch(&mut self, end_of_batch: bool) {
        self.end_of_batch = end_of_batch;
    }

    pub(crate) fn is_void(&self) -> bool {
        self.void
    }
}

impl Default for EventSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSlot")
            .field("logger_name", &self.logger_name)
            .field("level", &self.level)
            .field("message", &self.message)
            .field("marker", &self.marker)
            .field("thread_name", &self.thread_name)
            .field("timestamp_millis", &self.timestamp_millis)
            .field("end_of_batch", &self.end_of_batch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::property::{Property, PropertySet};

    #[test]
    fn test_set_values_replaces_previous_occupant() {
        let mut first_map = HashMap::new();
        first_map.insert("request".to_string(), "r-1".to_string());
        let stack = vec!["outer".to_string(), "inner".to_string()];

        let mut slot = EventSlot::new();
        let mut values = SlotValues::new(Arc::from("first"), Level::Error, "boom");
        values.marker = Some(Marker::new("AUDIT"));
        values.context_map = Some(&first_map);
        values.context_stack = &stack;
        values.thrown = Some(Arc::new(std::io::Error::other("disk")));
        slot.set_values(values);
        slot.set_end_of_batch(true);

        slot.set_values(SlotValues::new(Arc::from("second"), Level::Info, "ok"));

        assert_eq!(slot.logger_name(), "second");
        assert_eq!(slot.level(), Level::Info);
        assert_eq!(slot.message().formatted(), "ok");
        assert!(slot.marker().is_none());
        assert!(slot.thrown().is_none());
        assert!(slot.context_map().is_empty());
        assert!(slot.context_stack().is_empty());
        assert!(!slot.is_end_of_batch());
        assert!(!slot.is_void());
    }

    #[test]
    fn test_location_only_kept_when_included() {
        let mut values = SlotValues::new(Arc::from("app"), Level::Info, "here");
        values.location = Some(Location::caller());
        let slot = EventSlot::from_values(values);
        assert!(slot.location().is_none());

        let mut values = SlotValues::new(Arc::from("app"), Level::Info, "here");
        values.location = Some(Location::caller());
        values.include_location = true;
        let slot = EventSlot::from_values(values);
        assert!(slot.location().unwrap().file.ends_with("event.rs"));
    }

    #[test]
    fn test_properties_merged_at_set_values() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), "1".to_string());
        let props = PropertySet::new(vec![
            Property::new("a", "2", false),
            Property::new("b", "2", false),
        ]);

        let mut values = SlotValues::new(Arc::from("app"), Level::Info, "msg");
        values.context_map = Some(&map);
        values.properties = Some(&props);
        let slot = EventSlot::from_values(values);

        assert_eq!(slot.context_map().get("a").map(String::as_str), Some("1"));
        assert_eq!(slot.context_map().get("b").map(String::as_str), Some("2"));
        // caller's map untouched
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_thread_name_cached() {
        let handle = std::thread::Builder::new()
            .name("producer-7".into())
            .spawn(|| current_thread_name())
            .unwrap();
        assert_eq!(&*handle.join().unwrap(), "producer-7");
    }
}
