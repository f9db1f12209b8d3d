//! Message payloads carried by events
//!
//! - `Message::Simple`: literal text
//! - `Message::Parameterized`: `{}` placeholders filled from rendered params
//! - `Message::Map`: sorted key/value pairs (`MapMessage`)

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Simple(String),
    Parameterized { pattern: String, params: Vec<String> },
    Map(MapMessage),
}

impl Message {
    /// Build a parameterized message, rendering every param with `Display`.
    pub fn parameterized(pattern: impl Into<String>, params: &[&dyn fmt::Display]) -> Self {
        Message::Parameterized {
            pattern: pattern.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Raw text before any substitution.
    pub fn format_str(&self) -> Cow<'_, str> {
        match self {
            Message::Simple(text) => Cow::Borrowed(text),
            Message::Parameterized { pattern, .. } => Cow::Borrowed(pattern),
            Message::Map(map) => Cow::Owned(map.format(MapFormat::Default)),
        }
    }

    pub fn formatted(&self) -> Cow<'_, str> {
        match self {
            Message::Simple(text) => Cow::Borrowed(text),
            Message::Parameterized { pattern, params } => {
                let mut out = String::with_capacity(pattern.len() + 16 * params.len());
                substitute_params(pattern, params, &mut out);
                Cow::Owned(out)
            }
            Message::Map(map) => Cow::Owned(map.format(MapFormat::Default)),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Message::Simple(text) => text.is_empty(),
            Message::Parameterized { pattern, .. } => pattern.is_empty(),
            Message::Map(map) => map.is_empty(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Message::Simple(String::new())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Simple(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Simple(text)
    }
}

impl From<MapMessage> for Message {
    fn from(map: MapMessage) -> Self {
        Message::Map(map)
    }
}

/// Replace each `{}` in `pattern` with the next param, leaving surplus
/// placeholders untouched.
fn substitute_params(pattern: &str, params: &[String], out: &mut String) {
    let mut params = params.iter();
    let mut rest = pattern;
    while let Some(pos) = rest.find("{}") {
        out.push_str(&rest[..pos]);
        match params.next() {
            Some(param) => out.push_str(param),
            None => out.push_str("{}"),
        }
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
}

/// Rendering styles for `MapMessage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapFormat {
    /// `key="value" key2="value2"`
    #[default]
    Default,
    /// `{"key":"value", "key2":"value2"}`
    Json,
    /// `<Map>` with one `<Entry key=..>` element per pair
    Xml,
    /// `{key="value", key2="value2"}`
    Java,
}

/// Structured message made of sorted key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMessage {
    data: BTreeMap<String, String>,
}

impl MapMessage {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(key, value);
        self
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.data.remove(key)
    }

    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn format(&self, format: MapFormat) -> String {
        let mut out = String::new();
        match format {
            MapFormat::Default => {
                for (i, (key, value)) in self.data.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    let _ = write!(out, "{}=\"{}\"", key, value);
                }
            }
            MapFormat::Json => {
                out.push('{');
                for (i, (key, value)) in self.data.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    // serde_json escapes quotes and control characters
                    let key = serde_json::Value::String(key.clone());
                    let value = serde_json::Value::String(value.clone());
                    let _ = write!(out, "{}:{}", key, value);
                }
                out.push('}');
            }
            MapFormat::Xml => {
                out.push_str("<Map>\n");
                for (key, value) in &self.data {
                    let _ = writeln!(out, "  <Entry key={}>{}</Entry>", key, value);
                }
                out.push_str("</Map>");
            }
            MapFormat::Java => {
                out.push('{');
                for (i, (key, value)) in self.data.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{}=\"{}\"", key, value);
                }
                out.push('}');
            }
        }
        out
    }
}

impl fmt::Display for MapMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(MapFormat::Default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MapMessage {
        MapMessage::new()
            .with("message", "Test message {}")
            .with("project", "Log4j")
    }

    #[test]
    fn test_map_default_format() {
        assert_eq!(
            sample().format(MapFormat::Default),
            "message=\"Test message {}\" project=\"Log4j\""
        );
    }

    #[test]
    fn test_map_xml_format() {
        assert_eq!(
            sample().format(MapFormat::Xml),
            "<Map>\n  <Entry key=message>Test message {}</Entry>\n  <Entry key=project>Log4j</Entry>\n</Map>"
        );
    }

    #[test]
    fn test_map_json_format() {
        assert_eq!(
            sample().format(MapFormat::Json),
            "{\"message\":\"Test message {}\", \"project\":\"Log4j\"}"
        );
    }

    #[test]
    fn test_map_java_format() {
        assert_eq!(
            sample().format(MapFormat::Java),
            "{message=\"Test message {}\", project=\"Log4j\"}"
        );
    }

    #[test]
    fn test_parameterized_substitution() {
        let msg = Message::parameterized("User {} performed {}", &[&42, &"login"]);
        assert_eq!(msg.formatted(), "User 42 performed login");
        assert_eq!(msg.format_str(), "User {} performed {}");
    }

    #[test]
    fn test_surplus_placeholders_stay_literal() {
        let msg = Message::parameterized("{} and {}", &[&1]);
        assert_eq!(msg.formatted(), "1 and {}");

        let msg = Message::parameterized("no placeholders", &[&1, &2]);
        assert_eq!(msg.formatted(), "no placeholders");
    }
}
