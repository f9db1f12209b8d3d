//! Property-based tests for rust_async_logger using proptest

use proptest::prelude::*;
use rust_async_logger::core::sink::{MemoryRecord, MemorySink};
use rust_async_logger::core::{
    merge_properties, EventSlot, Filter, FilterChain, FilterResult, LineFormatter, Marker,
    MarkerFilter, Message, NoSubstitution, OutputManager, Property, SlotValues, ThresholdFilter,
};
use rust_async_logger::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;

fn any_level() -> impl Strategy<Value = Level> {
    prop::sample::select(Level::VALUES.to_vec())
}

fn any_result() -> impl Strategy<Value = FilterResult> {
    prop_oneof![
        Just(FilterResult::Accept),
        Just(FilterResult::Neutral),
        Just(FilterResult::Deny),
    ]
}

fn any_marker() -> impl Strategy<Value = Option<Marker>> {
    prop_oneof![
        Just(None),
        "[A-Z]{1,6}".prop_map(|name| Some(Marker::new(name))),
        ("[A-Z]{1,6}", "[A-Z]{1,6}")
            .prop_map(|(child, parent)| {
                Some(Marker::with_parents(child, vec![Marker::new(parent)]))
            }),
    ]
}

/// Every call shape of a filter must reach the same answer for the same event.
fn shapes_agree(
    filter: &dyn Filter,
    level: Level,
    marker: Option<&Marker>,
    text: &str,
) -> FilterResult {
    let message = Message::from(text);
    let mut values = SlotValues::new(Arc::from("prop"), level, message.clone());
    values.marker = marker.cloned();
    let event = EventSlot::from_values(values);

    let by_text = filter.filter_text("prop", level, marker, text, &[]);
    let by_object = filter.filter_object("prop", level, marker, &text as &dyn Display, None);
    let by_message = filter.filter_message("prop", level, marker, &message, None);
    let by_event = filter.filter_event(&event);

    assert_eq!(by_text, by_object);
    assert_eq!(by_text, by_message);
    assert_eq!(by_text, by_event);
    by_text
}

// ============================================================================
// Level Tests
// ============================================================================

proptest! {
    /// Level string conversions roundtrip, case-insensitively
    #[test]
    fn test_level_str_roundtrip(level in any_level(), lower in any::<bool>()) {
        let text = if lower { level.to_str().to_lowercase() } else { level.to_str().to_string() };
        let parsed: Level = text.parse().unwrap();
        prop_assert_eq!(level, parsed);
        prop_assert_eq!(format!("{}", level), level.to_str());
    }

    /// Specificity follows numeric severity
    #[test]
    fn test_specificity_matches_severity(a in any_level(), b in any_level()) {
        prop_assert_eq!(a.is_at_least_as_specific_as(b), a.severity() <= b.severity());
    }

    /// Level JSON serialization roundtrips
    #[test]
    fn test_level_json_roundtrip(level in any_level()) {
        let json = serde_json::to_string(&level).unwrap();
        let back: Level = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, level);
    }

    /// Unknown names are rejected rather than mapped to a default
    #[test]
    fn test_level_invalid_parse(invalid in "[^TDIWEFAOtdiwefao ]+") {
        let result: std::result::Result<Level, String> = invalid.parse();
        prop_assert!(result.is_err(), "Expected parse error for '{}'", invalid);
    }
}

// ============================================================================
// Filter Tests
// ============================================================================

proptest! {
    /// Threshold answers are identical across call shapes and match the predicate
    #[test]
    fn test_threshold_shapes_agree(
        threshold in any_level(),
        on_match in any_result(),
        on_mismatch in any_result(),
        level in any_level(),
        marker in any_marker(),
        text in ".*",
    ) {
        let filter = ThresholdFilter::new(threshold, on_match, on_mismatch);
        let result = shapes_agree(&filter, level, marker.as_ref(), &text);
        let expected = if level.is_at_least_as_specific_as(threshold) {
            on_match
        } else {
            on_mismatch
        };
        prop_assert_eq!(result, expected);
    }

    /// Marker answers are identical across call shapes
    #[test]
    fn test_marker_shapes_agree(
        name in "[A-Z]{1,6}",
        on_match in any_result(),
        on_mismatch in any_result(),
        level in any_level(),
        marker in any_marker(),
    ) {
        let filter = MarkerFilter::new(name.clone(), on_match, on_mismatch);
        let result = shapes_agree(&filter, level, marker.as_ref(), "payload");
        let matched = marker.as_ref().is_some_and(|m| m.is_instance_of(&name));
        prop_assert_eq!(result, if matched { on_match } else { on_mismatch });
    }

    /// A chain answers with its first decisive member, else neutral
    #[test]
    fn test_chain_first_decisive_wins(
        members in prop::collection::vec((any_level(), any_result(), any_result()), 0..6),
        level in any_level(),
    ) {
        let mut chain = FilterChain::new();
        let mut expected = FilterResult::Neutral;
        for (threshold, on_match, on_mismatch) in &members {
            let filter = ThresholdFilter::new(*threshold, *on_match, *on_mismatch);
            let single = filter.filter_text("prop", level, None, "", &[]);
            if expected == FilterResult::Neutral && single.is_decisive() {
                expected = single;
            }
            chain.push(Arc::new(filter));
        }
        let result = shapes_agree(&chain, level, None, "chained");
        prop_assert_eq!(result, expected);
    }

    /// Neutral policy only matters for neutral answers
    #[test]
    fn test_neutral_policy_respects_decisive_results(
        result in any_result(),
        level in any_level(),
        threshold in any_level(),
    ) {
        let policies = [
            NeutralPolicy::Record,
            NeutralPolicy::Discard,
            NeutralPolicy::AtLeast(threshold),
        ];
        for policy in policies {
            let admitted = policy.decide(result, level);
            match result {
                FilterResult::Accept => prop_assert!(admitted),
                FilterResult::Deny => prop_assert!(!admitted),
                FilterResult::Neutral => prop_assert_eq!(admitted, policy.admits(level)),
            }
        }
    }
}

// ============================================================================
// Property Merge Tests
// ============================================================================

proptest! {
    /// Event keys always win; configured keys fill the gaps; input untouched
    #[test]
    fn test_merge_rule(
        existing in prop::collection::hash_map("[a-d]{1,2}", "[a-z]{0,4}", 0..6),
        configured in prop::collection::vec(("[a-d]{1,2}", "[A-Z]{0,4}"), 0..6),
    ) {
        let properties: Vec<Property> = configured
            .iter()
            .map(|(k, v)| Property::new(k.clone(), v.clone(), false))
            .collect();
        let before = existing.clone();
        let input = if existing.is_empty() { None } else { Some(&existing) };
        let merged = merge_properties(input, &properties, &NoSubstitution);

        prop_assert_eq!(&existing, &before);
        for (key, value) in &existing {
            prop_assert_eq!(merged.get(key), Some(value));
        }

        let mut first_configured: HashMap<&str, &str> = HashMap::new();
        for (k, v) in &configured {
            first_configured.entry(k.as_str()).or_insert(v.as_str());
        }
        for (key, value) in first_configured {
            if !existing.contains_key(key) {
                prop_assert_eq!(merged.get(key).map(String::as_str), Some(value));
            }
        }

        let new_keys: HashSet<&String> = configured
            .iter()
            .map(|(k, _)| k)
            .filter(|k| !existing.contains_key(*k))
            .collect();
        let expected_len = existing.len() + new_keys.len();
        prop_assert_eq!(merged.len(), expected_len);
    }
}

// ============================================================================
// Message Tests
// ============================================================================

proptest! {
    /// Placeholders take params in order; surplus placeholders stay literal
    #[test]
    fn test_parameter_substitution(
        parts in prop::collection::vec("[a-z ]{0,5}", 1..6),
        params in prop::collection::vec(0u32..1000, 0..8),
    ) {
        let pattern = parts.join("{}");
        let displays: Vec<&dyn Display> = params.iter().map(|p| p as &dyn Display).collect();
        let message = Message::parameterized(pattern.clone(), &displays);

        let mut expected = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                match params.get(i - 1) {
                    Some(p) => expected.push_str(&p.to_string()),
                    None => expected.push_str("{}"),
                }
            }
            expected.push_str(part);
        }

        prop_assert_eq!(message.formatted().into_owned(), expected);
        prop_assert_eq!(message.format_str().into_owned(), pattern);
    }

    /// Rendered lines never contain raw line breaks (prevents log injection)
    #[test]
    fn test_line_formatter_escapes_breaks(
        message in "(?s).{0,40}",
        key in "[a-z]{1,4}",
        value in "(?s).{0,20}",
    ) {
        let mut values = SlotValues::new(Arc::from("inject"), Level::Info, message);
        let mut context = HashMap::new();
        context.insert(key, value);
        values.context_map = Some(&context);
        let event = EventSlot::from_values(values);

        let line = LineFormatter::new().format_line(&event);
        prop_assert!(line.ends_with('\n'));
        let body = &line[..line.len() - 1];
        prop_assert!(!body.contains('\n'), "unescaped newline in {:?}", line);
        prop_assert!(!body.contains('\r'), "unescaped carriage return in {:?}", line);
    }
}

// ============================================================================
// Output Manager Tests
// ============================================================================

proptest! {
    /// Whatever the chunk sizes and flags, the sink receives every byte once,
    /// in order, and the buffer never exceeds its capacity
    #[test]
    fn test_manager_preserves_bytes(
        capacity in 1usize..64,
        immediate_flush in any::<bool>(),
        chunks in prop::collection::vec(
            (prop::collection::vec(any::<u8>(), 0..100), any::<bool>()),
            0..20,
        ),
    ) {
        let record = MemoryRecord::new();
        let manager = OutputManager::new(
            "prop",
            Box::new(MemorySink::new(record.clone())),
            capacity,
            immediate_flush,
        );

        let mut expected = Vec::new();
        for (bytes, end_of_batch) in &chunks {
            manager.write(bytes, *end_of_batch).unwrap();
            expected.extend_from_slice(bytes);
            prop_assert!(manager.buffered_len() <= capacity);
            if immediate_flush || *end_of_batch {
                prop_assert_eq!(manager.buffered_len(), 0);
                prop_assert_eq!(record.contents(), expected.clone());
            }
        }

        manager.close().unwrap();
        prop_assert_eq!(record.contents(), expected.clone());
        prop_assert_eq!(manager.bytes_written(), expected.len() as u64);
    }
}
