//! Selectors, locator identities and persisted locator records.
//!
//! A [`Selector`] is a strategy tag plus an expression. A
//! [`LocatorIdentity`] names "the same logical element" across runs so
//! alternates recorded today can be looked up tomorrow. A [`LocatorRecord`]
//! is one stored alternate for an identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy tag for CSS selectors
pub const CSS: &str = "css";
/// Strategy tag for XPath expressions
pub const XPATH: &str = "xpath";
/// Strategy tag for text-content lookups
pub const TEXT: &str = "text";
/// Strategy tag for `data-testid` lookups
pub const TEST_ID: &str = "testid";

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "expression", rename_all = "lowercase")]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    #[serde(rename = "xpath")]
    XPath(String),
    /// Text content selector
    Text(String),
    /// Test ID selector (data-testid attribute)
    #[serde(rename = "testid")]
    TestId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Build a selector from a stored strategy tag; `None` for unknown tags
    #[must_use]
    pub fn from_tag(tag: &str, expression: impl Into<String>) -> Option<Self> {
        let expression = expression.into();
        match tag.to_ascii_lowercase().as_str() {
            CSS => Some(Self::Css(expression)),
            XPATH => Some(Self::XPath(expression)),
            TEXT => Some(Self::Text(expression)),
            TEST_ID => Some(Self::TestId(expression)),
            _ => None,
        }
    }

    /// Strategy tag ("css", "xpath", ...)
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Css(_) => CSS,
            Self::XPath(_) => XPATH,
            Self::Text(_) => TEXT,
            Self::TestId(_) => TEST_ID,
        }
    }

    /// Strategy-specific expression
    #[must_use]
    pub fn expression(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) | Self::Text(s) | Self::TestId(s) => s,
        }
    }

    /// Convert to a JavaScript query expression returning the first match
    #[must_use]
    pub fn to_query(&self) -> String {
        match self {
            Self::Css(s) => format!("document.querySelector({s:?})"),
            Self::XPath(s) => {
                format!("document.evaluate({s:?}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue")
            }
            Self::Text(t) => {
                format!("Array.from(document.querySelectorAll('*')).find(el => el.textContent.includes({t:?}))")
            }
            Self::TestId(id) => format!("document.querySelector('[data-testid={id:?}]')"),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag(), self.expression())
    }
}

// =============================================================================
// LOCATOR IDENTITY
// =============================================================================

/// Replacements applied so identities are safe as storage keys and file names.
/// `_` goes first so every underscore in the output belongs to a token.
const ESCAPES: [(char, &str); 7] = [
    ('_', "_us_"),
    (' ', "_sp_"),
    ('.', "_dot_"),
    (':', "_colon_"),
    ('-', "_hyphen_"),
    ('/', "_slash_"),
    ('|', "_pipe_"),
];

const SEPARATOR: char = '|';

/// Escape `raw` into a storage-key-safe string.
///
/// The mapping is injective: distinct inputs never produce the same output.
#[must_use]
pub fn file_safe(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match ESCAPES.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Stable key identifying a logical element on a page across runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocatorIdentity(String);

impl LocatorIdentity {
    /// Identity for `locator` on the page at `page_url`
    #[must_use]
    pub fn new(locator: &str, page_url: &str) -> Self {
        Self(format!(
            "{}{SEPARATOR}{}",
            file_safe(locator),
            file_safe(page_url)
        ))
    }

    /// Identity derived from a condition's description rather than an
    /// explicit locator key. Descriptions are not guaranteed stable across
    /// builds; prefer [`LocatorIdentity::new`] with a caller-chosen key.
    #[deprecated(note = "give the condition an explicit locator key instead")]
    #[must_use]
    pub fn from_description(description: &str, page_url: &str) -> Self {
        // A third part keeps these apart from every `new` identity
        Self(format!(
            "{}{SEPARATOR}{}{SEPARATOR}description",
            file_safe(description),
            file_safe(page_url)
        ))
    }

    /// Wrap an already-computed identity string (as read back from a store)
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The identity key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocatorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LocatorIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// LOCATOR RECORD
// =============================================================================

/// One persisted alternate locator for an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorRecord {
    /// The alternate selector (strategy + expression)
    pub selector: Selector,
    /// When this strategy slot was last written
    pub recorded_at: DateTime<Utc>,
}

impl LocatorRecord {
    /// Record `selector` as written now
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            recorded_at: Utc::now(),
        }
    }

    /// Strategy tag of the stored alternate
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        self.selector.tag()
    }

    /// Expression of the stored alternate
    #[must_use]
    pub fn expression(&self) -> &str {
        self.selector.expression()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_tags() {
            assert_eq!(Selector::css("#a").tag(), "css");
            assert_eq!(Selector::xpath("//a").tag(), "xpath");
            assert_eq!(Selector::text("Go").tag(), "text");
            assert_eq!(Selector::test_id("go").tag(), "testid");
        }

        #[test]
        fn test_from_tag_round_trips_known_tags() {
            for selector in [
                Selector::css("#a"),
                Selector::xpath("//a"),
                Selector::text("Go"),
                Selector::test_id("go"),
            ] {
                let rebuilt = Selector::from_tag(selector.tag(), selector.expression()).unwrap();
                assert_eq!(rebuilt, selector);
            }
        }

        #[test]
        fn test_from_tag_is_case_insensitive() {
            assert_eq!(
                Selector::from_tag("XPath", "//b"),
                Some(Selector::xpath("//b"))
            );
        }

        #[test]
        fn test_from_tag_unknown() {
            assert!(Selector::from_tag("linktext", "Home").is_none());
        }

        #[test]
        fn test_display() {
            assert_eq!(Selector::css("#foo").to_string(), "css=#foo");
        }

        #[test]
        fn test_to_query() {
            assert!(Selector::css("#foo").to_query().contains("querySelector"));
            assert!(Selector::xpath("//div").to_query().contains("document.evaluate"));
            assert!(Selector::test_id("x").to_query().contains("data-testid"));
        }

        #[test]
        fn test_serde_shape() {
            let json = serde_json::to_value(Selector::xpath("//a")).unwrap();
            assert_eq!(json["strategy"], "xpath");
            assert_eq!(json["expression"], "//a");
        }
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn test_file_safe_mapping() {
            assert_eq!(
                file_safe("https://a.b/c d-e"),
                "https_colon__slash__slash_a_dot_b_slash_c_sp_d_hyphen_e"
            );
        }

        #[test]
        fn test_file_safe_escapes_underscore_first() {
            assert_eq!(file_safe("a_b"), "a_us_b");
            assert_ne!(file_safe("a_dot_b"), file_safe("a.b"));
        }

        #[test]
        fn test_identity_is_stable() {
            let a = LocatorIdentity::new("css=#login", "https://example.com/login");
            let b = LocatorIdentity::new("css=#login", "https://example.com/login");
            assert_eq!(a, b);
        }

        #[test]
        fn test_identity_differs_per_page_and_locator() {
            let base = LocatorIdentity::new("css=#login", "https://example.com/login");
            assert_ne!(
                base,
                LocatorIdentity::new("css=#login", "https://example.com/signup")
            );
            assert_ne!(
                base,
                LocatorIdentity::new("css=#logout", "https://example.com/login")
            );
        }

        #[test]
        fn test_separator_cannot_be_forged() {
            let a = LocatorIdentity::new("a|b", "c");
            let b = LocatorIdentity::new("a", "b|c");
            assert_ne!(a, b);
        }

        #[test]
        #[allow(deprecated)]
        fn test_description_identity_is_distinct_from_locator_identity() {
            let described = LocatorIdentity::from_description("css=#a", "p");
            assert_ne!(described, LocatorIdentity::new("css=#a", "p"));
        }

        #[test]
        #[allow(deprecated)]
        fn test_description_cannot_collide_with_prefixed_locator() {
            let url = "https://x.test/";
            assert_ne!(
                LocatorIdentity::new("description:the cart badge", url),
                LocatorIdentity::from_description("the cart badge", url)
            );
        }

        #[allow(deprecated)]
        fn identity(described: bool, target: &str, url: &str) -> LocatorIdentity {
            if described {
                LocatorIdentity::from_description(target, url)
            } else {
                LocatorIdentity::new(target, url)
            }
        }

        proptest! {
            #[test]
            fn prop_identity_injective(
                d1 in any::<bool>(), l1 in ".{0,12}", u1 in ".{0,12}",
                d2 in any::<bool>(), l2 in ".{0,12}", u2 in ".{0,12}",
            ) {
                let same_inputs = d1 == d2 && l1 == l2 && u1 == u2;
                let same_identity = identity(d1, &l1, &u1) == identity(d2, &l2, &u2);
                prop_assert_eq!(same_inputs, same_identity);
            }

            #[test]
            fn prop_description_never_matches_locator(
                target in "[a-z:_ |]{0,16}", url in "[a-z:/._|]{0,16}",
            ) {
                prop_assert_ne!(
                    identity(true, &target, &url),
                    LocatorIdentity::new(&format!("description:{target}"), &url)
                );
            }
        }
    }

    mod record_tests {
        use super::*;

        #[test]
        fn test_record_accessors() {
            let record = LocatorRecord::new(Selector::css("#foo"));
            assert_eq!(record.strategy(), "css");
            assert_eq!(record.expression(), "#foo");
        }
    }
}
