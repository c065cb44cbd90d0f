//! Driver collaborator: the browser automation seam.
//!
//! The wait engine never talks to a browser directly. It evaluates
//! conditions against an input, and in self-healing mode it needs three
//! things from that input, expressed by [`LocatorDriver`]:
//!
//! - resolve an element from a strategy tag and expression
//! - run an injected script against a resolved element
//! - report the current page URL (part of every locator identity)
//!
//! [`MockDriver`] scripts all three for unit tests.

use crate::condition::ConditionFailure;
use crate::locator::Selector;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Bounding box for an element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X position
    pub x: f32,
    /// Y position
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Element handle for DOM interactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned identifier for the element
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Element text content
    pub text_content: Option<String>,
    /// Bounding box if visible
    pub bounding_box: Option<BoundingBox>,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text_content: None,
            bounding_box: None,
        }
    }

    /// Check if element is visible
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.bounding_box.is_some()
    }
}

/// Browser access needed by conditions, the fallback protocol and the recorder.
///
/// Every call must return in bounded time; the wait engine does not guard
/// against a driver that hangs.
pub trait LocatorDriver {
    /// URL of the current page
    fn current_url(&self) -> Result<String, ConditionFailure>;

    /// First element matching `selector`, `None` if nothing matches
    fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, ConditionFailure>;

    /// Run `script` with `element` bound to `arguments[0]`
    fn execute_script(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<serde_json::Value, ConditionFailure>;

    /// Key/value facts appended to timeout messages (driver name, session...)
    fn diagnostics(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

impl<D: LocatorDriver + ?Sized> LocatorDriver for &D {
    fn current_url(&self) -> Result<String, ConditionFailure> {
        (**self).current_url()
    }

    fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, ConditionFailure> {
        (**self).find_element(selector)
    }

    fn execute_script(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<serde_json::Value, ConditionFailure> {
        (**self).execute_script(script, element)
    }

    fn diagnostics(&self) -> Vec<(String, String)> {
        (**self).diagnostics()
    }
}

impl<D: LocatorDriver + ?Sized> LocatorDriver for Arc<D> {
    fn current_url(&self) -> Result<String, ConditionFailure> {
        (**self).current_url()
    }

    fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, ConditionFailure> {
        (**self).find_element(selector)
    }

    fn execute_script(
        &self,
        script: &str,
        element: &ElementHandle,
    ) -> Result<serde_json::Value, ConditionFailure> {
        (**self).execute_script(script, element)
    }

    fn diagnostics(&self) -> Vec<(String, String)> {
        (**self).diagnostics()
    }
}

// =============================================================================
// ALTERNATE-CANDIDATE GENERATION
// =============================================================================

/// Script shipped with the crate for computing alternate locators
pub const GENERATE_LOCATORS_JS: &str = include_str!("../assets/generate_locators.js");

/// Computes equivalent alternate locators for a resolved element
pub trait CandidateGenerator: Send + Sync + fmt::Debug {
    /// Alternates for `element`, most preferred first
    fn candidates(
        &self,
        driver: &dyn LocatorDriver,
        element: &ElementHandle,
    ) -> Result<Vec<Selector>, ConditionFailure>;
}

/// Candidate generator that runs a script in the page
#[derive(Debug, Clone)]
pub struct ScriptCandidateGenerator {
    script: String,
}

impl ScriptCandidateGenerator {
    /// Use a custom script. It receives the element as `arguments[0]`.
    #[must_use]
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Script text this generator injects
    #[must_use]
    pub fn script(&self) -> &str {
        &self.script
    }
}

impl Default for ScriptCandidateGenerator {
    fn default() -> Self {
        Self::new(GENERATE_LOCATORS_JS)
    }
}

impl CandidateGenerator for ScriptCandidateGenerator {
    fn candidates(
        &self,
        driver: &dyn LocatorDriver,
        element: &ElementHandle,
    ) -> Result<Vec<Selector>, ConditionFailure> {
        let payload = driver.execute_script(&self.script, element)?;
        parse_candidates(&payload)
    }
}

/// Decode a generator payload into selectors.
///
/// Accepts an array (or a JSON string encoding one) whose items are either
/// `{"strategy": tag, "expression": expr}` or single-entry `{tag: expr}`
/// objects. Empty expressions are dropped, unknown tags skipped.
pub fn parse_candidates(payload: &serde_json::Value) -> Result<Vec<Selector>, ConditionFailure> {
    use serde_json::Value;

    match payload {
        Value::Null => Ok(Vec::new()),
        Value::String(encoded) => {
            let decoded: Value = serde_json::from_str(encoded).map_err(|e| {
                ConditionFailure::script(format!("candidate payload is not JSON: {e}"))
            })?;
            if decoded.is_string() {
                return Err(ConditionFailure::script(
                    "candidate payload is doubly encoded",
                ));
            }
            parse_candidates(&decoded)
        }
        Value::Array(items) => {
            let mut selectors = Vec::new();
            for item in items {
                let Value::Object(map) = item else { continue };
                let pairs: Vec<(&str, &Value)> =
                    match (map.get("strategy"), map.get("expression")) {
                        (Some(Value::String(tag)), Some(expr)) => vec![(tag.as_str(), expr)],
                        _ => map.iter().map(|(k, v)| (k.as_str(), v)).collect(),
                    };
                for (tag, expr) in pairs {
                    let Some(expr) = expr.as_str().filter(|e| !e.trim().is_empty()) else {
                        continue;
                    };
                    match Selector::from_tag(tag, expr) {
                        Some(selector) => selectors.push(selector),
                        None => warn!(strategy = tag, "skipping candidate with unknown strategy"),
                    }
                }
            }
            Ok(selectors)
        }
        other => Err(ConditionFailure::script(format!(
            "unexpected candidate payload: {other}"
        ))),
    }
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

#[derive(Debug, Default)]
struct MockState {
    current_url: String,
    url_failure: Option<ConditionFailure>,
    session_id: Option<String>,
    elements: HashMap<Selector, ElementHandle>,
    failing: HashMap<Selector, ConditionFailure>,
    script_results: VecDeque<serde_json::Value>,
    script_failure: Option<ConditionFailure>,
    call_history: Vec<String>,
}

/// Mock driver for unit testing
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the current URL
    pub fn set_url(&self, url: impl Into<String>) {
        self.state().current_url = url.into();
    }

    /// Make `current_url` fail
    pub fn fail_url(&self, failure: ConditionFailure) {
        self.state().url_failure = Some(failure);
    }

    /// Set a session id reported in diagnostics
    pub fn set_session_id(&self, session: impl Into<String>) {
        self.state().session_id = Some(session.into());
    }

    /// Make `selector` resolve to `element`
    pub fn add_element(&self, selector: &Selector, element: ElementHandle) {
        let mut state = self.state();
        state.failing.remove(selector);
        state.elements.insert(selector.clone(), element);
    }

    /// Make `selector` resolve to nothing
    pub fn remove_element(&self, selector: &Selector) {
        self.state().elements.remove(selector);
    }

    /// Make lookups of `selector` raise `failure`
    pub fn fail_selector(&self, selector: &Selector, failure: ConditionFailure) {
        self.state().failing.insert(selector.clone(), failure);
    }

    /// Queue a result for the next `execute_script`
    pub fn push_script_result(&self, result: serde_json::Value) {
        self.state().script_results.push_back(result);
    }

    /// Make every `execute_script` raise `failure`
    pub fn fail_scripts(&self, failure: ConditionFailure) {
        self.state().script_failure = Some(failure);
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    /// Number of recorded calls starting with `prefix`
    #[must_use]
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state()
            .call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl LocatorDriver for MockDriver {
    fn current_url(&self) -> Result<String, ConditionFailure> {
        let mut state = self.state();
        state.call_history.push("current_url".to_string());
        match &state.url_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(state.current_url.clone()),
        }
    }

    fn find_element(&self, selector: &Selector) -> Result<Option<ElementHandle>, ConditionFailure> {
        let mut state = self.state();
        state.call_history.push(format!("find_element:{selector}"));
        if let Some(failure) = state.failing.get(selector) {
            return Err(failure.clone());
        }
        Ok(state.elements.get(selector).cloned())
    }

    fn execute_script(
        &self,
        _script: &str,
        element: &ElementHandle,
    ) -> Result<serde_json::Value, ConditionFailure> {
        let mut state = self.state();
        state
            .call_history
            .push(format!("execute_script:{}", element.id));
        if let Some(failure) = &state.script_failure {
            return Err(failure.clone());
        }
        state
            .script_results
            .pop_front()
            .ok_or_else(|| ConditionFailure::script("No mock script result set"))
    }

    fn diagnostics(&self) -> Vec<(String, String)> {
        let state = self.state();
        let mut info = vec![("Driver info".to_string(), "MockDriver".to_string())];
        if let Some(session) = &state.session_id {
            info.push(("Session ID".to_string(), session.clone()));
        }
        info
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::condition::FailureKind;
    use serde_json::json;

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_element_handle_creation() {
            let elem = ElementHandle::new("btn-1", "button");
            assert_eq!(elem.id, "btn-1");
            assert_eq!(elem.tag_name, "button");
            assert!(elem.text_content.is_none());
        }

        #[test]
        fn test_element_handle_visibility() {
            let mut elem = ElementHandle::new("elem", "div");
            assert!(!elem.is_visible());

            elem.bounding_box = Some(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
            assert!(elem.is_visible());
        }
    }

    mod parse_candidates_tests {
        use super::*;

        #[test]
        fn test_single_entry_objects() {
            let payload = json!([{"css": "BODY DIV:nth-of-type(2)"}, {"xpath": "//*[text()[contains(.,'Go')]]"}]);
            let selectors = parse_candidates(&payload).unwrap();
            assert_eq!(
                selectors,
                vec![
                    Selector::css("BODY DIV:nth-of-type(2)"),
                    Selector::xpath("//*[text()[contains(.,'Go')]]"),
                ]
            );
        }

        #[test]
        fn test_strategy_expression_objects() {
            let payload = json!([{"strategy": "testid", "expression": "submit"}]);
            assert_eq!(
                parse_candidates(&payload).unwrap(),
                vec![Selector::test_id("submit")]
            );
        }

        #[test]
        fn test_stringified_payload() {
            let payload = json!("[{\"css\":\"#a\"}]");
            assert_eq!(parse_candidates(&payload).unwrap(), vec![Selector::css("#a")]);
        }

        #[test]
        fn test_drops_empty_null_and_unknown() {
            let payload = json!([
                {"css": ""},
                {"xpath": null},
                {"linktext": "Home"},
                "not-an-object",
                {"css": "#kept"}
            ]);
            assert_eq!(
                parse_candidates(&payload).unwrap(),
                vec![Selector::css("#kept")]
            );
        }

        #[test]
        fn test_null_payload_is_empty() {
            assert!(parse_candidates(&serde_json::Value::Null).unwrap().is_empty());
        }

        #[test]
        fn test_rejects_garbage() {
            let err = parse_candidates(&json!("not json")).unwrap_err();
            assert_eq!(err.kind, FailureKind::Script);
            assert!(parse_candidates(&json!(42)).is_err());
        }
    }

    mod generator_tests {
        use super::*;

        #[test]
        fn test_default_script_is_embedded() {
            let generator = ScriptCandidateGenerator::default();
            assert!(generator.script().contains("arguments[0]"));
            assert!(generator.script().contains("nth-of-type"));
        }

        #[test]
        fn test_script_generator_uses_driver() {
            let driver = MockDriver::new();
            driver.push_script_result(json!("[{\"css\":\"#a\"},{\"xpath\":\"//a\"}]"));
            let generator = ScriptCandidateGenerator::default();
            let element = ElementHandle::new("e1", "a");
            let selectors = generator.candidates(&driver, &element).unwrap();
            assert_eq!(selectors.len(), 2);
            assert!(driver.was_called("execute_script:e1"));
        }

        #[test]
        fn test_script_generator_propagates_script_failure() {
            let driver = MockDriver::new();
            driver.fail_scripts(ConditionFailure::script("blocked by CSP"));
            let generator = ScriptCandidateGenerator::new("return 1;");
            let err = generator
                .candidates(&driver, &ElementHandle::new("e", "div"))
                .unwrap_err();
            assert!(err.message.contains("CSP"));
        }
    }

    mod mock_driver_tests {
        use super::*;

        #[test]
        fn test_mock_driver_creation() {
            let driver = MockDriver::new();
            assert!(driver.history().is_empty());
            assert_eq!(driver.current_url().unwrap(), "");
        }

        #[test]
        fn test_mock_driver_elements() {
            let driver = MockDriver::new();
            let selector = Selector::css("#a");
            assert!(driver.find_element(&selector).unwrap().is_none());
            driver.add_element(&selector, ElementHandle::new("a", "div"));
            assert!(driver.find_element(&selector).unwrap().is_some());
            driver.remove_element(&selector);
            assert!(driver.find_element(&selector).unwrap().is_none());
            assert_eq!(driver.call_count("find_element:css=#a"), 3);
        }

        #[test]
        fn test_mock_driver_failing_selector() {
            let driver = MockDriver::new();
            let selector = Selector::css("#stale");
            driver.fail_selector(
                &selector,
                ConditionFailure::new(FailureKind::StaleElement, "detached"),
            );
            let err = driver.find_element(&selector).unwrap_err();
            assert_eq!(err.kind, FailureKind::StaleElement);
        }

        #[test]
        fn test_mock_driver_script_queue() {
            let driver = MockDriver::new();
            let element = ElementHandle::new("e", "div");
            driver.push_script_result(json!(1));
            driver.push_script_result(json!(2));
            assert_eq!(driver.execute_script("x", &element).unwrap(), json!(1));
            assert_eq!(driver.execute_script("x", &element).unwrap(), json!(2));
            assert!(driver.execute_script("x", &element).is_err());
        }

        #[test]
        fn test_mock_driver_diagnostics() {
            let driver = MockDriver::new();
            driver.set_session_id("abc123");
            let info = driver.diagnostics();
            assert!(info.iter().any(|(k, v)| k == "Session ID" && v == "abc123"));
        }

        #[test]
        fn test_driver_through_reference_and_arc() {
            let driver = Arc::new(MockDriver::new());
            driver.set_url("https://example.com");
            let by_ref: &dyn LocatorDriver = &driver;
            assert_eq!(by_ref.current_url().unwrap(), "https://example.com");
            assert_eq!((&*driver).current_url().unwrap(), "https://example.com");
        }
    }
}
