//! Locator strategies: typed descriptions of how to find one UI element.
//!
//! A strategy is a value, not a handle. It carries a [`LocatorKind`] and an
//! opaque `expression` that only the injected [`Resolver`](crate::Resolver)
//! interprets. Strategies are compared by value and are cheap to clone, so
//! callers build a fresh list per lookup and discard it afterwards.
//!
//! Ordering inside a list is the caller's preference: most stable first.
//!
//! ```
//! use aguardar::LocatorStrategy;
//!
//! let ok_button = [
//!     LocatorStrategy::accessibility_id("OK"),
//!     LocatorStrategy::text("OK"),
//!     LocatorStrategy::text_contains("OK"),
//!     LocatorStrategy::structural_path(r#"//android.widget.Button[@text="OK"]"#),
//! ];
//! assert_eq!(ok_button[0].to_string(), r#"accessibility_id:"OK""#);
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a strategy's expression should be interpreted by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Platform-native identifier (resource id, DOM id)
    NativeId,
    /// Accessibility identifier / content description
    AccessibilityId,
    /// Exact visible text
    Text,
    /// Visible text containing the expression
    TextContains,
    /// Visible text matching the expression as a regular expression
    TextMatches,
    /// Structural path through the view hierarchy (XPath-like)
    StructuralPath,
}

impl LocatorKind {
    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NativeId => "native_id",
            Self::AccessibilityId => "accessibility_id",
            Self::Text => "text",
            Self::TextContains => "text_contains",
            Self::TextMatches => "text_matches",
            Self::StructuralPath => "structural_path",
        }
    }

    /// Whether the kind selects by visible text
    #[must_use]
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::TextContains | Self::TextMatches)
    }

    /// All kinds, in rough order of selector stability
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::NativeId,
            Self::AccessibilityId,
            Self::StructuralPath,
            Self::Text,
            Self::TextContains,
            Self::TextMatches,
        ]
    }
}

impl fmt::Display for LocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable description of one way to find an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorStrategy {
    kind: LocatorKind,
    expression: String,
}

impl LocatorStrategy {
    /// Create a strategy of the given kind
    #[must_use]
    pub fn new(kind: LocatorKind, expression: impl Into<String>) -> Self {
        Self {
            kind,
            expression: expression.into(),
        }
    }

    /// Platform-native id strategy
    #[must_use]
    pub fn native_id(id: impl Into<String>) -> Self {
        Self::new(LocatorKind::NativeId, id)
    }

    /// Accessibility id strategy
    #[must_use]
    pub fn accessibility_id(id: impl Into<String>) -> Self {
        Self::new(LocatorKind::AccessibilityId, id)
    }

    /// Exact text strategy
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(LocatorKind::Text, text)
    }

    /// Text-contains strategy
    #[must_use]
    pub fn text_contains(fragment: impl Into<String>) -> Self {
        Self::new(LocatorKind::TextContains, fragment)
    }

    /// Regex text strategy
    #[must_use]
    pub fn text_matches(pattern: impl Into<String>) -> Self {
        Self::new(LocatorKind::TextMatches, pattern)
    }

    /// Structural path strategy
    #[must_use]
    pub fn structural_path(path: impl Into<String>) -> Self {
        Self::new(LocatorKind::StructuralPath, path)
    }

    /// Strategy kind
    #[must_use]
    pub const fn kind(&self) -> LocatorKind {
        self.kind
    }

    /// Opaque expression handed to the resolver
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Evaluate a textual strategy against a piece of visible text.
    ///
    /// Returns `false` for non-textual kinds and for `TextMatches`
    /// expressions that are not valid regular expressions.
    #[must_use]
    pub fn matches_text(&self, text: &str) -> bool {
        match self.kind {
            LocatorKind::Text => text == self.expression,
            LocatorKind::TextContains => text.contains(self.expression.as_str()),
            LocatorKind::TextMatches => Regex::new(&self.expression)
                .map(|re| re.is_match(text))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.kind, self.expression)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    mod kind_tests {
        use super::*;

        #[test]
        fn test_kind_names() {
            assert_eq!(LocatorKind::NativeId.as_str(), "native_id");
            assert_eq!(LocatorKind::AccessibilityId.as_str(), "accessibility_id");
            assert_eq!(LocatorKind::TextMatches.to_string(), "text_matches");
        }

        #[test]
        fn test_textual_kinds() {
            let textual: Vec<_> = LocatorKind::all()
                .into_iter()
                .filter(LocatorKind::is_textual)
                .collect();
            assert_eq!(
                textual,
                vec![
                    LocatorKind::Text,
                    LocatorKind::TextContains,
                    LocatorKind::TextMatches
                ]
            );
        }

        #[test]
        fn test_kind_serde_snake_case() {
            let yaml = serde_yaml_ng::to_string(&LocatorKind::StructuralPath).unwrap();
            assert_eq!(yaml.trim(), "structural_path");
        }
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_value_equality() {
            assert_eq!(
                LocatorStrategy::accessibility_id("OK"),
                LocatorStrategy::new(LocatorKind::AccessibilityId, "OK")
            );
            assert_ne!(
                LocatorStrategy::accessibility_id("OK"),
                LocatorStrategy::text("OK")
            );
        }

        #[test]
        fn test_hashable_by_value() {
            let set: HashSet<_> = [
                LocatorStrategy::text("OK"),
                LocatorStrategy::text("OK"),
                LocatorStrategy::text_contains("OK"),
            ]
            .into_iter()
            .collect();
            assert_eq!(set.len(), 2);
        }

        #[test]
        fn test_display_quotes_expression() {
            let s = LocatorStrategy::structural_path(r#"//Button[@text="OK"]"#);
            assert_eq!(s.to_string(), r#"structural_path:"//Button[@text=\"OK\"]""#);
        }

        #[test]
        fn test_matches_text() {
            assert!(LocatorStrategy::text("OK").matches_text("OK"));
            assert!(!LocatorStrategy::text("OK").matches_text("OK!"));
            assert!(LocatorStrategy::text_contains("logged in").matches_text("You are logged in!"));
            assert!(LocatorStrategy::text_matches("(?i).*compatible.*")
                .matches_text("Fully COMPATIBLE with Android"));
        }

        #[test]
        fn test_matches_text_invalid_regex_never_matches() {
            assert!(!LocatorStrategy::text_matches("(unclosed").matches_text("(unclosed"));
        }

        #[test]
        fn test_non_textual_kinds_never_match_text() {
            assert!(!LocatorStrategy::accessibility_id("OK").matches_text("OK"));
            assert!(!LocatorStrategy::native_id("ok").matches_text("ok"));
        }

        #[test]
        fn test_serde_roundtrip_shape() {
            let s = LocatorStrategy::text_contains("Invalid credentials");
            let yaml = serde_yaml_ng::to_string(&s).unwrap();
            assert!(yaml.contains("kind: text_contains"));
            let back: LocatorStrategy = serde_yaml_ng::from_str(&yaml).unwrap();
            assert_eq!(back, s);
        }
    }
}
