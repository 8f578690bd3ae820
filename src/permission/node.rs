//! Permission nodes
//!
//! A node is a lower-case, dot-separated capability string such as
//! `moderation.kick`. A grant may end in `.*` to cover a whole subtree, and
//! the bare `*` grants everything. There is no negation and no wildcard in
//! any position other than the last segment.

use std::fmt;

use crate::permission::error::PermissionError;

/// Global grant
pub const GLOBAL: &str = "*";

const WILDCARD_SUFFIX: &str = ".*";

/// Decide whether `granted` authorizes `required`
///
/// Comparison is case-insensitive. Empty inputs never match. A wildcard
/// grant whose prefix is itself malformed (empty, empty segments, or a
/// nested `*`) only matches its own exact text.
pub fn matches(granted: &str, required: &str) -> bool {
    if granted.is_empty() || required.is_empty() {
        return false;
    }
    if granted == GLOBAL {
        return true;
    }
    if granted.eq_ignore_ascii_case(required) {
        return true;
    }
    let Some(prefix) = wildcard_prefix(granted) else {
        return false;
    };
    if required.len() < prefix.len() || !required.is_char_boundary(prefix.len()) {
        return false;
    }
    let (head, rest) = required.split_at(prefix.len());
    head.eq_ignore_ascii_case(prefix) && (rest.is_empty() || rest.starts_with('.'))
}

/// Prefix of a well-formed `prefix.*` grant
fn wildcard_prefix(granted: &str) -> Option<&str> {
    let prefix = granted.strip_suffix(WILDCARD_SUFFIX)?;
    if prefix.is_empty() || prefix.contains('*') || prefix.split('.').any(str::is_empty) {
        return None;
    }
    Some(prefix)
}

/// Lower-case a node for storage or lookup
pub fn normalize(node: &str) -> String {
    node.trim().to_lowercase()
}

/// A validated, normalized permission node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionNode(String);

impl PermissionNode {
    /// Normalize and validate a node for storage
    ///
    /// Rejects empty nodes and nodes containing whitespace. Malformed wildcard
    /// shapes are accepted; they simply never match anything but themselves.
    pub fn parse(raw: &str) -> Result<Self, PermissionError> {
        let node = normalize(raw);
        if node.is_empty() {
            return Err(PermissionError::InvalidNode {
                node,
                reason: "empty",
            });
        }
        if node.chars().any(char::is_whitespace) {
            return Err(PermissionError::InvalidNode {
                node,
                reason: "contains whitespace",
            });
        }
        Ok(Self(node))
    }

    /// Normalized text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `*` and well-formed `prefix.*` grants
    pub fn is_wildcard(&self) -> bool {
        self.0 == GLOBAL || wildcard_prefix(&self.0).is_some()
    }

    /// Whether this grant authorizes `required`
    pub fn matches(&self, required: &str) -> bool {
        matches(&self.0, required)
    }

    /// Consume into the normalized string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PermissionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PermissionNode {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_grant_matches_everything() {
        assert!(matches("*", "moderation.kick"));
        assert!(matches("*", "x"));
        assert!(!matches("*", ""));
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        assert!(matches("moderation.kick", "moderation.kick"));
        assert!(matches("moderation.kick", "Moderation.Kick"));
        assert!(!matches("moderation.kick", "moderation.ban"));
    }

    #[test]
    fn wildcard_covers_prefix_and_subtree() {
        assert!(matches("moderation.*", "moderation"));
        assert!(matches("moderation.*", "moderation.kick"));
        assert!(matches("moderation.*", "moderation.kick.temporary"));
        assert!(!matches("moderation.*", "moderationx.kick"));
        assert!(!matches("a.*", "ab"));
    }

    #[test]
    fn non_wildcard_does_not_cover_children() {
        assert!(!matches("a.b", "a.b.c"));
        assert!(!matches("a.b", "a"));
    }

    #[test]
    fn empty_inputs_never_match() {
        assert!(!matches("", ""));
        assert!(!matches("", "a"));
        assert!(!matches("a", ""));
    }

    #[test]
    fn malformed_wildcards_only_match_themselves() {
        for bad in [".*", "a..*", "a.*.*", "*.*", "a.b*.*"] {
            assert!(matches(bad, bad), "{bad} should match itself");
            assert!(!matches(bad, "a.b"), "{bad} should not match a.b");
            assert!(!matches(bad, "a"), "{bad} should not match a");
        }
    }

    #[test]
    fn multi_level_wildcards_are_literal() {
        assert!(!matches("a.*.c", "a.b.c"));
        assert!(matches("a.*.c", "a.*.c"));
    }

    #[test]
    fn parse_normalizes_and_validates() {
        let node = PermissionNode::parse("  Moderation.KICK ").unwrap();
        assert_eq!(node.as_str(), "moderation.kick");
        assert!(!node.is_wildcard());
        assert!(PermissionNode::parse("modules.*").unwrap().is_wildcard());
        assert!(PermissionNode::parse("*").unwrap().is_wildcard());
        assert!(!PermissionNode::parse("a..*").unwrap().is_wildcard());

        assert!(matches!(
            PermissionNode::parse("   "),
            Err(PermissionError::InvalidNode { reason: "empty", .. })
        ));
        assert!(PermissionNode::parse("moderation kick").is_err());
    }

    #[test]
    fn non_ascii_required_does_not_panic() {
        assert!(!matches("ab.*", "aé"));
        assert!(!matches("a.*", "é"));
    }
}
