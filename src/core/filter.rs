//! Admission-control filters
//!
//! A filter computes one predicate and answers with its configured
//! `on_match` or `on_mismatch` result. Filters hold only immutable
//! configuration, so any number of producer threads may call them at once.
//!
//! `FilterChain` evaluates filters in order: the first `Accept` or `Deny`
//! wins, and an all-`Neutral` chain is `Neutral`. What a `Neutral` outcome
//! means is decided by the owner of the chain (see `NeutralPolicy`).

use super::error::{LoggerError, Result};
use super::event::{EventSlot, Thrown};
use super::level::Level;
use super::marker::Marker;
use super::message::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterResult {
    /// Stop evaluating and record the event.
    Accept,
    /// No decision; defer to the next filter or the default policy.
    Neutral,
    /// Stop evaluating and discard the event.
    Deny,
}

impl FilterResult {
    pub fn to_str(&self) -> &'static str {
        match self {
            FilterResult::Accept => "ACCEPT",
            FilterResult::Neutral => "NEUTRAL",
            FilterResult::Deny => "DENY",
        }
    }

    /// `true` for `Accept` and `Deny`.
    #[inline]
    pub fn is_decisive(self) -> bool {
        !matches!(self, FilterResult::Neutral)
    }
}

impl fmt::Display for FilterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

impl FromStr for FilterResult {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACCEPT" => Ok(FilterResult::Accept),
            "NEUTRAL" => Ok(FilterResult::Neutral),
            "DENY" => Ok(FilterResult::Deny),
            _ => Err(format!("Invalid filter result: '{}'", s)),
        }
    }
}

impl TryFrom<String> for FilterResult {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FilterResult> for String {
    fn from(result: FilterResult) -> Self {
        result.to_str().to_string()
    }
}

/// What the owner of a chain does when the chain answers `Neutral`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeutralPolicy {
    /// Record the event.
    #[default]
    Record,
    /// Discard the event.
    Discard,
    /// Record only events at least as specific as the level.
    AtLeast(Level),
}

impl NeutralPolicy {
    #[inline]
    pub fn admits(&self, level: Level) -> bool {
        match self {
            NeutralPolicy::Record => true,
            NeutralPolicy::Discard => false,
            NeutralPolicy::AtLeast(threshold) => level.is_at_least_as_specific_as(*threshold),
        }
    }

    /// Turn a chain result into a record/discard decision.
    #[inline]
    pub fn decide(&self, result: FilterResult, level: Level) -> bool {
        match result {
            FilterResult::Accept => true,
            FilterResult::Deny => false,
            FilterResult::Neutral => self.admits(level),
        }
    }
}

/// An admission filter, callable in four shapes.
///
/// Every shape must reduce to the same decision for a given filter: the
/// text shape sees the raw pattern before parameters are rendered, so a
/// denying filter saves the formatting work.
pub trait Filter: Send + Sync + fmt::Debug {
    fn on_match(&self) -> FilterResult;

    fn on_mismatch(&self) -> FilterResult;

    /// Raw message text plus unrendered parameters.
    fn filter_text(
        &self,
        logger: &str,
        level: Level,
        marker: Option<&Marker>,
        msg: &str,
        params: &[&dyn fmt::Display],
    ) -> FilterResult;

    /// Arbitrary displayable payload plus optional error.
    fn filter_object(
        &self,
        logger: &str,
        level: Level,
        marker: Option<&Marker>,
        msg: &dyn fmt::Display,
        thrown: Option<&Thrown>,
    ) -> FilterResult;

    /// Structured message plus optional error.
    fn filter_message(
        &self,
        logger: &str,
        level: Level,
        marker: Option<&Marker>,
        msg: &Message,
        thrown: Option<&Thrown>,
    ) -> FilterResult;

    /// A fully populated event.
    fn filter_event(&self, event: &EventSlot) -> FilterResult;

    /// Pick `on_match` or `on_mismatch` for a predicate outcome.
    #[inline]
    fn result_for(&self, matched: bool) -> FilterResult {
        if matched {
            self.on_match()
        } else {
            self.on_mismatch()
        }
    }
}

fn parse_result(
    component: &str,
    value: Option<&str>,
    default: FilterResult,
) -> Result<FilterResult> {
    match value {
        None => Ok(default),
        Some(text) => text
            .parse()
            .map_err(|e: String| LoggerError::config(component, e)),
    }
}

/// Matches events at least as specific as a configured level.
///
/// Defaults: level `ERROR`, on-match `NEUTRAL`, on-mismatch `DENY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdFilter {
    level: Level,
    on_match: FilterResult,
    on_mismatch: FilterResult,
}

impl ThresholdFilter {
    pub const DEFAULT_LEVEL: Level = Level::Error;
    pub const DEFAULT_ON_MATCH: FilterResult = FilterResult::Neutral;
    pub const DEFAULT_ON_MISMATCH: FilterResult = FilterResult::Deny;

    pub fn new(level: Level, on_match: FilterResult, on_mismatch: FilterResult) -> Self {
        Self {
            level,
            on_match,
            on_mismatch,
        }
    }

    pub fn builder() -> ThresholdFilterBuilder {
        ThresholdFilterBuilder::default()
    }

    /// Build from configuration text; absent values take the defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for unknown level or result names.
    pub fn from_names(
        level: Option<&str>,
        on_match: Option<&str>,
        on_mismatch: Option<&str>,
    ) -> Result<Self> {
        let level = match level {
            None => Self::DEFAULT_LEVEL,
            Some(text) => text
                .parse()
                .map_err(|e: String| LoggerError::config("ThresholdFilter", e))?,
        };
        Ok(Self {
            level,
            on_match: parse_result("ThresholdFilter", on_match, Self::DEFAULT_ON_MATCH)?,
            on_mismatch: parse_result("ThresholdFilter", on_mismatch, Self::DEFAULT_ON_MISMATCH)?,
        })
    }

    pub fn level(&self) -> Level {
        self.level
    }

    #[inline]
    fn filter_level(&self, level: Level) -> FilterResult {
        self.result_for(level.is_at_least_as_specific_as(self.level))
    }
}

impl Default for ThresholdFilter {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_LEVEL,
            Self::DEFAULT_ON_MATCH,
            Self::DEFAULT_ON_MISMATCH,
        )
    }
}

impl fmt::Display for ThresholdFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level)
    }
}

impl Filter for ThresholdFilter {
    fn on_match(&self) -> FilterResult {
        self.on_match
    }

    fn on_mismatch(&self) -> FilterResult {
        self.on_mismatch
    }

    fn filter_text(
        &self,
        _logger: &str,
        level: Level,
        _marker: Option<&Marker>,
        _msg: &str,
        _params: &[&dyn fmt::Display],
    ) -> FilterResult {
        self.filter_level(level)
    }

    fn filter_object(
        &self,
        _logger: &str,
        level: Level,
        _marker: Option<&Marker>,
        _msg: &dyn fmt::Display,
        _thrown: Option<&Thrown>,
    ) -> FilterResult {
        self.filter_level(level)
    }

    fn filter_message(
        &self,
        _logger: &str,
        level: Level,
        _marker: Option<&Marker>,
        _msg: &Message,
        _thrown: Option<&Thrown>,
    ) -> FilterResult {
        self.filter_level(level)
    }

    fn filter_event(&self, event: &EventSlot) -> FilterResult {
        self.filter_level(event.level())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdFilterBuilder {
    level: Level,
    on_match: FilterResult,
    on_mismatch: FilterResult,
}

impl Default for ThresholdFilterBuilder {
    fn default() -> Self {
        let defaults = ThresholdFilter::default();
        Self {
            level: defaults.level,
            on_match: defaults.on_match,
            on_mismatch: defaults.on_mismatch,
        }
    }
}

impl ThresholdFilterBuilder {
    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_match(mut self, result: FilterResult) -> Self {
        self.on_match = result;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_mismatch(mut self, result: FilterResult) -> Self {
        self.on_mismatch = result;
        self
    }

    pub fn build(self) -> ThresholdFilter {
        ThresholdFilter::new(self.level, self.on_match, self.on_mismatch)
    }
}

/// Matches events whose marker is (or descends from) a named marker.
///
/// Defaults: on-match `NEUTRAL`, on-mismatch `DENY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFilter {
    name: String,
    on_match: FilterResult,
    on_mismatch: FilterResult,
}

impl MarkerFilter {
    pub fn new(name: impl Into<String>, on_match: FilterResult, on_mismatch: FilterResult) -> Self {
        Self {
            name: name.into(),
            on_match,
            on_mismatch,
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidConfiguration` for unknown result names.
    pub fn from_names(
        name: &str,
        on_match: Option<&str>,
        on_mismatch: Option<&str>,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(LoggerError::config("MarkerFilter", "marker name is required"));
        }
        Ok(Self::new(
            name,
            parse_result("MarkerFilter", on_match, FilterResult::Neutral)?,
            parse_result("MarkerFilter", on_mismatch, FilterResult::Deny)?,
        ))
    }

    #[inline]
    fn filter_marker(&self, marker: Option<&Marker>) -> FilterResult {
        self.result_for(marker.is_some_and(|m| m.is_instance_of(&self.name)))
    }
}

impl Filter for MarkerFilter {
    fn on_match(&self) -> FilterResult {
        self.on_match
    }

    fn on_mismatch(&self) -> FilterResult {
        self.on_mismatch
    }

    fn filter_text(
        &self,
        _logger: &str,
        _level: Level,
        marker: Option<&Marker>,
        _msg: &str,
        _params: &[&dyn fmt::Display],
    ) -> FilterResult {
        self.filter_marker(marker)
    }

    fn filter_object(
        &self,
        _logger: &str,
        _level: Level,
        marker: Option<&Marker>,
        _msg: &dyn fmt::Display,
        _thrown: Option<&Thrown>,
    ) -> FilterResult {
        self.filter_marker(marker)
    }

    fn filter_message(
        &self,
        _logger: &str,
        _level: Level,
        marker: Option<&Marker>,
        _msg: &Message,
        _thrown: Option<&Thrown>,
    ) -> FilterResult {
        self.filter_marker(marker)
    }

    fn filter_event(&self, event: &EventSlot) -> FilterResult {
        self.filter_marker(event.marker())
    }
}

/// Ordered filter list with first-decisive-result-wins semantics.
///
/// A chain is itself a `Filter`; as such it has no match/mismatch results of
/// its own and reports `Neutral` for both.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn push(&mut self, filter: Arc<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    fn evaluate(&self, mut each: impl FnMut(&dyn Filter) -> FilterResult) -> FilterResult {
        for filter in &self.filters {
            let result = each(filter.as_ref());
            if result.is_decisive() {
                return result;
            }
        }
        FilterResult::Neutral
    }
}

impl Filter for FilterChain {
    fn on_match(&self) -> FilterResult {
        FilterResult::Neutral
    }

    fn on_mismatch(&self) -> FilterResult {
        FilterResult::Neutral
    }

    fn filter_text(
        &self,
        logger: &str,
        level: Level,
        marker: Option<&Marker>,
        msg: &str,
        params: &[&dyn fmt::Display],
    ) -> FilterResult {
        self.evaluate(|f| f.filter_text(logger, level, marker, msg, params))
    }

    fn filter_object(
        &self,
        logger: &str,
        level: Level,
        marker: Option<&Marker>,
        msg: &dyn fmt::Display,
        thrown: Option<&Thrown>,
    ) -> FilterResult {
        self.evaluate(|f| f.filter_object(logger, level, marker, msg, thrown))
    }

    fn filter_message(
        &self,
        logger: &str,
        level: Level,
        marker: Option<&Marker>,
        msg: &Message,
        thrown: Option<&Thrown>,
    ) -> FilterResult {
        self.evaluate(|f| f.filter_message(logger, level, marker, msg, thrown))
    }

    fn filter_event(&self, event: &EventSlot) -> FilterResult {
        self.evaluate(|f| f.filter_event(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::SlotValues;

    /// Filter that always answers the same result.
    #[derive(Debug)]
    struct Fixed(FilterResult);

    impl Filter for Fixed {
        fn on_match(&self) -> FilterResult {
            self.0
        }
        fn on_mismatch(&self) -> FilterResult {
            self.0
        }
        fn filter_text(
            &self,
            _: &str,
            _: Level,
            _: Option<&Marker>,
            _: &str,
            _: &[&dyn fmt::Display],
        ) -> FilterResult {
            self.0
        }
        fn filter_object(
            &self,
            _: &str,
            _: Level,
            _: Option<&Marker>,
            _: &dyn fmt::Display,
            _: Option<&Thrown>,
        ) -> FilterResult {
            self.0
        }
        fn filter_message(
            &self,
            _: &str,
            _: Level,
            _: Option<&Marker>,
            _: &Message,
            _: Option<&Thrown>,
        ) -> FilterResult {
            self.0
        }
        fn filter_event(&self, _: &EventSlot) -> FilterResult {
            self.0
        }
    }

    fn event(level: Level) -> EventSlot {
        EventSlot::from_values(SlotValues::new(Arc::from("test"), level, "msg"))
    }

    #[test]
    fn test_default_threshold() {
        let filter = ThresholdFilter::default();
        assert_eq!(filter.filter_event(&event(Level::Debug)), FilterResult::Deny);
        assert_eq!(filter.filter_event(&event(Level::Error)), FilterResult::Neutral);
        assert_eq!(filter.filter_event(&event(Level::Fatal)), FilterResult::Neutral);
    }

    #[test]
    fn test_all_shapes_agree() {
        let filter = ThresholdFilter::builder()
            .level(Level::Info)
            .on_match(FilterResult::Accept)
            .build();
        let msg = Message::from("hello");
        for level in Level::VALUES {
            let expected = filter.filter_event(&event(level));
            assert_eq!(filter.filter_text("t", level, None, "hello", &[&1]), expected);
            assert_eq!(filter.filter_object("t", level, None, &"hello", None), expected);
            assert_eq!(filter.filter_message("t", level, None, &msg, None), expected);
        }
    }

    #[test]
    fn test_from_names() {
        let filter = ThresholdFilter::from_names(Some("warn"), Some("accept"), None).unwrap();
        assert_eq!(filter.level(), Level::Warn);
        assert_eq!(filter.on_match(), FilterResult::Accept);
        assert_eq!(filter.on_mismatch(), FilterResult::Deny);

        assert_eq!(
            ThresholdFilter::from_names(None, None, None).unwrap(),
            ThresholdFilter::default()
        );

        let err = ThresholdFilter::from_names(Some("LOUD"), None, None).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
        assert!(ThresholdFilter::from_names(None, Some("MAYBE"), None).is_err());
    }

    #[test]
    fn test_chain_short_circuit() {
        let chain = FilterChain::new()
            .with_filter(Fixed(FilterResult::Neutral))
            .with_filter(Fixed(FilterResult::Deny))
            .with_filter(Fixed(FilterResult::Accept));
        assert_eq!(chain.filter_event(&event(Level::Info)), FilterResult::Deny);
    }

    #[test]
    fn test_chain_all_neutral() {
        let chain = FilterChain::new()
            .with_filter(Fixed(FilterResult::Neutral))
            .with_filter(Fixed(FilterResult::Neutral));
        assert_eq!(chain.filter_event(&event(Level::Info)), FilterResult::Neutral);
        assert_eq!(FilterChain::new().filter_event(&event(Level::Info)), FilterResult::Neutral);
    }

    #[test]
    fn test_marker_filter() {
        let filter = MarkerFilter::from_names("AUDIT", Some("ACCEPT"), Some("NEUTRAL")).unwrap();
        let audit = Marker::with_parents("LOGIN", vec![Marker::new("AUDIT")]);
        assert_eq!(
            filter.filter_text("t", Level::Info, Some(&audit), "m", &[]),
            FilterResult::Accept
        );
        assert_eq!(filter.filter_text("t", Level::Info, None, "m", &[]), FilterResult::Neutral);
        assert!(MarkerFilter::from_names("", None, None).is_err());
    }

    #[test]
    fn test_neutral_policy() {
        assert!(NeutralPolicy::Record.decide(FilterResult::Neutral, Level::Trace));
        assert!(!NeutralPolicy::Discard.decide(FilterResult::Neutral, Level::Fatal));
        assert!(NeutralPolicy::Discard.decide(FilterResult::Accept, Level::Trace));
        assert!(!NeutralPolicy::Record.decide(FilterResult::Deny, Level::Fatal));

        let policy = NeutralPolicy::AtLeast(Level::Info);
        assert!(policy.decide(FilterResult::Neutral, Level::Warn));
        assert!(!policy.decide(FilterResult::Neutral, Level::Debug));
    }

    #[test]
    fn test_neutral_policy_defaults_to_record() {
        assert_eq!(NeutralPolicy::default(), NeutralPolicy::Record);
        let policy: NeutralPolicy = serde_json::from_str("\"record\"").unwrap();
        assert_eq!(policy, NeutralPolicy::default());
    }
}
