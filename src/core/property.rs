//! Configured properties and their merge into event context maps
//!
//! Event-supplied context always wins: a configured property is only added
//! when the event's own map does not already carry that key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Immutable `(name, value, substitutable)` triple from static configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    name: String,
    value: String,
    #[serde(default)]
    substitutable: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>, substitutable: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            substitutable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_substitutable(&self) -> bool {
        self.substitutable
    }
}

/// Resolves `${...}` variables inside property values.
///
/// Resolution never fails: unresolvable references stay as literal text.
pub trait Substitutor: Send + Sync {
    fn resolve(&self, value: &str) -> String;
}

/// Substitutor that leaves every value untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSubstitution;

impl Substitutor for NoSubstitution {
    fn resolve(&self, value: &str) -> String {
        value.to_string()
    }
}

const MAX_SUBSTITUTION_DEPTH: usize = 8;

/// `${name}` substitution backed by a variable map.
///
/// Supported forms:
/// - `${name}`: configured variable
/// - `${env:NAME}`: process environment
/// - `${name:-fallback}`: fallback text when `name` is unresolved
///
/// Resolved values are themselves resolved, up to a fixed nesting depth.
#[derive(Debug, Clone, Default)]
pub struct StrSubstitutor {
    variables: HashMap<String, String>,
}

impl StrSubstitutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: HashMap<String, String>) -> Self {
        Self { variables }
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    fn lookup(&self, key: &str) -> Option<String> {
        match key.strip_prefix("env:") {
            Some(var) => std::env::var(var).ok(),
            None => self.variables.get(key).cloned(),
        }
    }

    fn resolve_depth(&self, value: &str, depth: usize) -> String {
        if depth >= MAX_SUBSTITUTION_DEPTH || !value.contains("${") {
            return value.to_string();
        }

        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                // unterminated reference: keep the remainder verbatim
                out.push_str(&rest[start..]);
                return out;
            };
            let expr = &after[..end];
            let (key, fallback) = match expr.split_once(":-") {
                Some((key, fallback)) => (key, Some(fallback)),
                None => (expr, None),
            };
            match self.lookup(key) {
                Some(resolved) => out.push_str(&self.resolve_depth(&resolved, depth + 1)),
                None => match fallback {
                    Some(fallback) => out.push_str(fallback),
                    None => {
                        out.push_str("${");
                        out.push_str(expr);
                        out.push('}');
                    }
                },
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

impl Substitutor for StrSubstitutor {
    fn resolve(&self, value: &str) -> String {
        self.resolve_depth(value, 0)
    }
}

/// Merge configured properties into a copy of `existing`.
///
/// `existing` is never mutated; the returned map is a fresh snapshot.
pub fn merge_properties(
    existing: Option<&HashMap<String, String>>,
    properties: &[Property],
    substitutor: &dyn Substitutor,
) -> HashMap<String, String> {
    let mut merged = existing.cloned().unwrap_or_default();
    merge_into(&mut merged, properties, substitutor);
    merged
}

fn merge_into(
    map: &mut HashMap<String, String>,
    properties: &[Property],
    substitutor: &dyn Substitutor,
) {
    for prop in properties {
        if map.contains_key(prop.name()) {
            continue;
        }
        let value = if prop.is_substitutable() {
            substitutor.resolve(prop.value())
        } else {
            prop.value().to_string()
        };
        map.insert(prop.name().to_string(), value);
    }
}

/// Properties bound to the substitutor that resolves them.
#[derive(Clone)]
pub struct PropertySet {
    properties: Vec<Property>,
    substitutor: Arc<dyn Substitutor>,
}

impl PropertySet {
    pub fn new(properties: Vec<Property>) -> Self {
        Self::with_substitutor(properties, Arc::new(StrSubstitutor::new()))
    }

    pub fn with_substitutor(properties: Vec<Property>, substitutor: Arc<dyn Substitutor>) -> Self {
        Self {
            properties,
            substitutor,
        }
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn merge(&self, existing: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        merge_properties(existing, &self.properties, self.substitutor.as_ref())
    }

    /// Merge into a map the caller already owns exclusively.
    pub(crate) fn merge_into(&self, map: &mut HashMap<String, String>) {
        merge_into(map, &self.properties, self.substitutor.as_ref());
    }
}

impl fmt::Debug for PropertySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySet")
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
