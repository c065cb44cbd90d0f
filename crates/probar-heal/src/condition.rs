//! Conditions polled by the wait engine.
//!
//! A [`Condition`] turns an input (usually a driver) into an [`Outcome`].
//! An outcome is either satisfied, carrying the value `until` returns, or
//! not yet satisfied (`None`/`false`). Raising a [`ConditionFailure`] is
//! distinct from "not yet": failures are filtered by the ignore list in
//! plain mode and trigger the fallback protocol in self-healing mode.

use crate::driver::{ElementHandle, LocatorDriver};
use crate::locator::Selector;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// FAILURES
// =============================================================================

/// Category of a condition failure, matched against a wait's ignore list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No element matched the locator
    NoSuchElement,
    /// Target frame does not exist
    NoSuchFrame,
    /// Target window does not exist
    NoSuchWindow,
    /// Umbrella kind: as an ignore entry it matches every `NoSuch*` kind
    NotFound,
    /// Element reference went stale (DOM re-rendered)
    StaleElement,
    /// Element exists but cannot be interacted with
    ElementNotInteractable,
    /// Injected script raised an error
    Script,
    /// Driver or transport failure
    Driver,
    /// Caller-defined category
    Custom(String),
}

impl FailureKind {
    /// Whether a failure of this kind is covered by the ignore entry `ignored`
    #[must_use]
    pub fn is_covered_by(&self, ignored: &Self) -> bool {
        if self == ignored {
            return true;
        }
        matches!(
            (ignored, self),
            (
                Self::NotFound,
                Self::NoSuchElement | Self::NoSuchFrame | Self::NoSuchWindow
            )
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchElement => f.write_str("no such element"),
            Self::NoSuchFrame => f.write_str("no such frame"),
            Self::NoSuchWindow => f.write_str("no such window"),
            Self::NotFound => f.write_str("not found"),
            Self::StaleElement => f.write_str("stale element reference"),
            Self::ElementNotInteractable => f.write_str("element not interactable"),
            Self::Script => f.write_str("script error"),
            Self::Driver => f.write_str("driver error"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Failure raised by a condition or by a driver call made on its behalf
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ConditionFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable detail
    pub message: String,
}

impl ConditionFailure {
    /// Create a failure of `kind`
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a "no such element" failure
    #[must_use]
    pub fn no_such_element(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NoSuchElement, message)
    }

    /// Create a driver failure
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Driver, message)
    }

    /// Create a script failure
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Script, message)
    }

    /// Whether any entry of `ignored` covers this failure
    #[must_use]
    pub fn is_ignored_by(&self, ignored: &[FailureKind]) -> bool {
        ignored.iter().any(|entry| self.kind.is_covered_by(entry))
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of one condition evaluation: satisfied with a value, or not yet
pub trait Outcome {
    /// Value returned by `until` once satisfied
    type Value;

    /// `Some(value)` when satisfied; `None` for "not yet" (null or false)
    fn into_satisfied(self) -> Option<Self::Value>;
}

impl Outcome for bool {
    type Value = bool;

    fn into_satisfied(self) -> Option<bool> {
        self.then_some(true)
    }
}

impl<T> Outcome for Option<T> {
    type Value = T;

    fn into_satisfied(self) -> Option<T> {
        self
    }
}

impl Outcome for ElementHandle {
    type Value = ElementHandle;

    fn into_satisfied(self) -> Option<ElementHandle> {
        Some(self)
    }
}

impl Outcome for String {
    type Value = String;

    fn into_satisfied(self) -> Option<String> {
        Some(self)
    }
}

impl<T> Outcome for Vec<T> {
    type Value = Vec<T>;

    fn into_satisfied(self) -> Option<Vec<T>> {
        Some(self)
    }
}

impl Outcome for serde_json::Value {
    type Value = serde_json::Value;

    fn into_satisfied(self) -> Option<serde_json::Value> {
        match self {
            Self::Null | Self::Bool(false) => None,
            other => Some(other),
        }
    }
}

/// Shorthand for the value a condition yields once satisfied
pub type Satisfied<C, I> = <<C as Condition<I>>::Output as Outcome>::Value;

// =============================================================================
// CONDITION TRAIT
// =============================================================================

/// Caller-supplied evaluator polled until it reports success
pub trait Condition<I: ?Sized> {
    /// What one evaluation produces
    type Output: Outcome;

    /// Evaluate once against `input`
    fn check(&self, input: &I) -> Result<Self::Output, ConditionFailure>;

    /// Description for error messages
    fn description(&self) -> String;

    /// Stable key naming the logical target, used to index stored alternates.
    /// Conditions without one fall back to their description.
    fn locator_key(&self) -> Option<String> {
        None
    }
}

/// A function-based condition
pub struct FnCondition<F> {
    func: F,
    description: String,
    locator: Option<String>,
}

impl<F> fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .field("locator", &self.locator)
            .finish_non_exhaustive()
    }
}

impl<F> FnCondition<F> {
    /// Create a new function condition
    pub fn new(func: F, description: impl Into<String>) -> Self {
        Self {
            func,
            description: description.into(),
            locator: None,
        }
    }

    /// Attach an explicit locator key
    #[must_use]
    pub fn with_locator(mut self, key: impl Into<String>) -> Self {
        self.locator = Some(key.into());
        self
    }
}

impl<I, R, F> Condition<I> for FnCondition<F>
where
    I: ?Sized,
    R: Outcome,
    F: Fn(&I) -> Result<R, ConditionFailure>,
{
    type Output = R;

    fn check(&self, input: &I) -> Result<R, ConditionFailure> {
        (self.func)(input)
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn locator_key(&self) -> Option<String> {
        self.locator.clone()
    }
}

// =============================================================================
// READY-MADE CONDITIONS
// =============================================================================

/// Conditions over a [`LocatorDriver`]
pub mod conditions {
    use super::*;

    /// Waits until an element matching a selector exists
    #[derive(Debug, Clone)]
    pub struct PresenceOf {
        selector: Selector,
    }

    /// Waits until an element matching a selector exists and is visible
    #[derive(Debug, Clone)]
    pub struct VisibilityOf {
        selector: Selector,
    }

    /// Waits until the current URL contains a fragment
    #[derive(Debug, Clone)]
    pub struct UrlContains {
        fragment: String,
    }

    /// Element present in the DOM. Missing elements raise `NoSuchElement`.
    #[must_use]
    pub fn presence_of_element(selector: Selector) -> PresenceOf {
        PresenceOf { selector }
    }

    /// Element present and visible. Present-but-hidden is "not yet".
    #[must_use]
    pub fn visibility_of_element(selector: Selector) -> VisibilityOf {
        VisibilityOf { selector }
    }

    /// Current URL contains `fragment`
    #[must_use]
    pub fn url_contains(fragment: impl Into<String>) -> UrlContains {
        UrlContains {
            fragment: fragment.into(),
        }
    }

    fn locate<D: LocatorDriver + ?Sized>(
        driver: &D,
        selector: &Selector,
    ) -> Result<ElementHandle, ConditionFailure> {
        driver.find_element(selector)?.ok_or_else(|| {
            ConditionFailure::no_such_element(format!("no element matches {selector}"))
        })
    }

    impl<D: LocatorDriver + ?Sized> Condition<D> for PresenceOf {
        type Output = ElementHandle;

        fn check(&self, driver: &D) -> Result<ElementHandle, ConditionFailure> {
            locate(driver, &self.selector)
        }

        fn description(&self) -> String {
            format!("presence of element located by {}", self.selector)
        }

        fn locator_key(&self) -> Option<String> {
            Some(self.selector.to_string())
        }
    }

    impl<D: LocatorDriver + ?Sized> Condition<D> for VisibilityOf {
        type Output = Option<ElementHandle>;

        fn check(&self, driver: &D) -> Result<Option<ElementHandle>, ConditionFailure> {
            let element = locate(driver, &self.selector)?;
            Ok(element.is_visible().then_some(element))
        }

        fn description(&self) -> String {
            format!("visibility of element located by {}", self.selector)
        }

        fn locator_key(&self) -> Option<String> {
            Some(self.selector.to_string())
        }
    }

    impl<D: LocatorDriver + ?Sized> Condition<D> for UrlContains {
        type Output = bool;

        fn check(&self, driver: &D) -> Result<bool, ConditionFailure> {
            Ok(driver.current_url()?.contains(&self.fragment))
        }

        fn description(&self) -> String {
            format!("url to contain {:?}", self.fragment)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::conditions::*;
    use super::*;
    use crate::driver::{BoundingBox, MockDriver};

    mod failure_tests {
        use super::*;

        #[test]
        fn test_exact_kind_is_covered() {
            assert!(FailureKind::StaleElement.is_covered_by(&FailureKind::StaleElement));
            assert!(!FailureKind::StaleElement.is_covered_by(&FailureKind::Script));
        }

        #[test]
        fn test_not_found_covers_no_such_kinds() {
            for kind in [
                FailureKind::NoSuchElement,
                FailureKind::NoSuchFrame,
                FailureKind::NoSuchWindow,
            ] {
                assert!(kind.is_covered_by(&FailureKind::NotFound));
            }
            assert!(!FailureKind::StaleElement.is_covered_by(&FailureKind::NotFound));
            assert!(!FailureKind::NotFound.is_covered_by(&FailureKind::NoSuchElement));
        }

        #[test]
        fn test_custom_kinds_compare_by_name() {
            let kind = FailureKind::Custom("Flaky".into());
            assert!(kind.is_covered_by(&FailureKind::Custom("Flaky".into())));
            assert!(!kind.is_covered_by(&FailureKind::Custom("Other".into())));
        }

        #[test]
        fn test_is_ignored_by() {
            let failure = ConditionFailure::no_such_element("#x");
            assert!(failure.is_ignored_by(&[FailureKind::Script, FailureKind::NotFound]));
            assert!(!failure.is_ignored_by(&[]));
        }

        #[test]
        fn test_failure_display() {
            let failure = ConditionFailure::script("ReferenceError: x");
            assert_eq!(failure.to_string(), "script error: ReferenceError: x");
        }

        #[test]
        fn test_failure_kind_serde() {
            let json = serde_json::to_string(&FailureKind::NoSuchElement).unwrap();
            assert_eq!(json, "\"no_such_element\"");
            let custom: FailureKind = serde_json::from_str("{\"custom\":\"Flaky\"}").unwrap();
            assert_eq!(custom, FailureKind::Custom("Flaky".into()));
        }
    }

    mod outcome_tests {
        use super::*;

        #[test]
        fn test_bool_outcome() {
            assert_eq!(true.into_satisfied(), Some(true));
            assert_eq!(false.into_satisfied(), None);
        }

        #[test]
        fn test_option_outcome() {
            assert_eq!(Some(3).into_satisfied(), Some(3));
            assert_eq!(None::<i32>.into_satisfied(), None);
        }

        #[test]
        fn test_json_outcome() {
            assert!(serde_json::Value::Null.into_satisfied().is_none());
            assert!(serde_json::json!(false).into_satisfied().is_none());
            assert!(serde_json::json!(true).into_satisfied().is_some());
            assert!(serde_json::json!(0).into_satisfied().is_some());
        }

        #[test]
        fn test_empty_collections_are_satisfied() {
            assert_eq!(Vec::<u8>::new().into_satisfied(), Some(vec![]));
            assert_eq!(String::new().into_satisfied(), Some(String::new()));
        }
    }

    mod fn_condition_tests {
        use super::*;

        #[test]
        fn test_fn_condition_check_and_description() {
            let cond = FnCondition::new(|n: &i32| Ok::<_, ConditionFailure>(*n > 2), "n > 2");
            assert!(cond.check(&3).unwrap());
            assert!(!cond.check(&1).unwrap());
            assert_eq!(Condition::<i32>::description(&cond), "n > 2");
            assert_eq!(Condition::<i32>::locator_key(&cond), None);
        }

        #[test]
        fn test_fn_condition_with_locator() {
            let cond = FnCondition::new(|_: &()| Ok::<_, ConditionFailure>(true), "always")
                .with_locator("css=#a");
            assert_eq!(
                Condition::<()>::locator_key(&cond),
                Some("css=#a".to_string())
            );
        }
    }

    mod ready_made_tests {
        use super::*;

        #[test]
        fn test_presence_found() {
            let driver = MockDriver::new();
            driver.add_element(&Selector::css("#a"), ElementHandle::new("e1", "div"));
            let el = presence_of_element(Selector::css("#a")).check(&driver).unwrap();
            assert_eq!(el.id, "e1");
        }

        #[test]
        fn test_presence_missing_raises_no_such_element() {
            let driver = MockDriver::new();
            let err = presence_of_element(Selector::css("#a"))
                .check(&driver)
                .unwrap_err();
            assert_eq!(err.kind, FailureKind::NoSuchElement);
        }

        #[test]
        fn test_presence_locator_key_and_description() {
            let cond = presence_of_element(Selector::xpath("//a"));
            assert_eq!(
                Condition::<MockDriver>::locator_key(&cond),
                Some("xpath=//a".to_string())
            );
            assert!(Condition::<MockDriver>::description(&cond).contains("xpath=//a"));
        }

        #[test]
        fn test_visibility() {
            let driver = MockDriver::new();
            driver.add_element(&Selector::css("#hidden"), ElementHandle::new("h", "div"));
            let mut shown = ElementHandle::new("s", "div");
            shown.bounding_box = Some(BoundingBox::new(0.0, 0.0, 10.0, 10.0));
            driver.add_element(&Selector::css("#shown"), shown);

            assert!(visibility_of_element(Selector::css("#hidden"))
                .check(&driver)
                .unwrap()
                .is_none());
            assert!(visibility_of_element(Selector::css("#shown"))
                .check(&driver)
                .unwrap()
                .is_some());
        }

        #[test]
        fn test_url_contains() {
            let driver = MockDriver::new();
            driver.set_url("https://example.com/dashboard");
            assert!(url_contains("dashboard").check(&driver).unwrap());
            assert!(!url_contains("login").check(&driver).unwrap());
        }
    }
}
