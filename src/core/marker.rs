//! Named markers used to tag events

use std::fmt;
use std::sync::Arc;

/// An immutable, cheaply cloneable event tag with optional parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    inner: Arc<MarkerInner>,
}

#[derive(Debug, PartialEq, Eq)]
struct MarkerInner {
    name: String,
    parents: Vec<Marker>,
}

impl Marker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MarkerInner {
                name: name.into(),
                parents: Vec::new(),
            }),
        }
    }

    pub fn with_parents(name: impl Into<String>, parents: Vec<Marker>) -> Self {
        Self {
            inner: Arc::new(MarkerInner {
                name: name.into(),
                parents,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parents(&self) -> &[Marker] {
        &self.inner.parents
    }

    /// `true` if this marker or any ancestor carries `name`.
    pub fn is_instance_of(&self, name: &str) -> bool {
        self.inner.name == name || self.inner.parents.iter().any(|p| p.is_instance_of(name))
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)?;
        if !self.inner.parents.is_empty() {
            f.write_str("[ ")?;
            for (i, parent) in self.inner.parents.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", parent)?;
            }
            f.write_str(" ]")?;
        }
        Ok(())
    }
}
