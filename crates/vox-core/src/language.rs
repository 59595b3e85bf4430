//! Language tags declared by producers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Language mode a producer attaches to each request (e.g. `"english-only"`).
///
/// Tags are opaque to the broker apart from the routing table lookup; an
/// empty tag is never constructed from wire input.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Wrap a tag, returning `None` for an empty or whitespace-only string.
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        (!tag.trim().is_empty()).then_some(Self(tag))
    }

    /// Return the tag as a slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LanguageTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
