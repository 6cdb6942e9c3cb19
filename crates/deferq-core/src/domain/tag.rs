//! Tag normalization.
//!
//! A tag partitions tasks: the file store uses it as a directory name, the
//! SQLite store as an indexed column. Normalization keeps letters, digits,
//! `_` and `-` (Unicode letters and digits included), turns `-` into `_`,
//! and falls back to `"default"` when nothing survives.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_TAG: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Whitespace is not a kept character, so it disappears together with
/// punctuation; no separate trim is needed.
pub fn normalize(raw: &str) -> String {
    let tag: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .map(|c| if c == '-' { '_' } else { c })
        .collect();

    if tag.is_empty() {
        DEFAULT_TAG.to_string()
    } else {
        tag
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self(DEFAULT_TAG.to_string())
    }
}

impl From<String> for Tag {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::strips_space_and_punctuation("Hello World!", "HelloWorld")]
    #[case::hyphen_becomes_underscore("a-b", "a_b")]
    #[case::surrounding_whitespace("  My Tag  ", "MyTag")]
    #[case::empty("", "default")]
    #[case::only_punctuation("!!!?..", "default")]
    #[case::only_whitespace("   ", "default")]
    #[case::keeps_underscore("mail_out", "mail_out")]
    #[case::accented_letters("café-crème", "café_crème")]
    #[case::path_traversal("../etc", "etc")]
    fn normalizes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(Tag::new(raw).as_str(), expected);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = Tag::new(" Billing-Run #3 ");
        let twice = Tag::new(once.as_str());
        assert_eq!(once, twice);
    }

    #[test]
    fn decoding_normalizes() {
        let tag: Tag = serde_json::from_str("\"a-b c\"").unwrap();
        assert_eq!(tag.as_str(), "a_bc");
    }
}
