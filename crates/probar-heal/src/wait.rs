//! Retry/Wait Engine
//!
//! Repeatedly applies a [`Condition`] to the wait's input until it is
//! satisfied, raises a failure the wait does not tolerate, or the deadline
//! passes.
//!
//! ## Failure strategies
//!
//! - [`FailureStrategy::PropagateOrIgnore`]: failures on the ignore list
//!   are remembered and polling continues; anything else propagates at once.
//! - [`FailureStrategy::AlwaysFallback`]: the first failure of any kind
//!   ends polling and hands over to the wait's [`Recovery`] (the stored
//!   alternate locators); a success is reported to the same recovery so it
//!   can record alternates for next time.
//!
//! ## Timing
//!
//! The deadline is checked after each evaluation, so a zero timeout still
//! evaluates once, and again after each sleep, so no evaluation starts at
//! or past the deadline.

use crate::clock::{duration_ms, Clock, Sleeper, SystemClock, ThreadSleeper};
use crate::condition::{Condition, ConditionFailure, FailureKind, Outcome, Satisfied};
use crate::driver::LocatorDriver;
use crate::result::{HealError, HealResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (500ms).
///
/// With the default poll interval this allows a single evaluation: the
/// deadline is checked again after the sleep, and the second evaluation
/// would start exactly at it. Raise the timeout to get more than one.
pub const DEFAULT_TIMEOUT_MS: u64 = 500;

/// Default polling interval (500ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

// =============================================================================
// WAIT CONFIGURATION
// =============================================================================

/// Lazily evaluated timeout message
#[derive(Clone)]
pub struct MessageSupplier(Arc<dyn Fn() -> String + Send + Sync>);

impl MessageSupplier {
    /// Wrap a message-producing function
    pub fn new(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Produce the message
    #[must_use]
    pub fn get(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for MessageSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MessageSupplier(..)")
    }
}

/// Timing and failure-filtering options for one wait
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Failure kinds tolerated while polling (plain mode only)
    pub ignored: Vec<FailureKind>,
    /// Replaces "waiting for <condition>" in timeout messages
    #[serde(skip)]
    pub message: Option<MessageSupplier>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            ignored: Vec::new(),
            message: None,
        }
    }
}

impl WaitConfig {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Tolerate failures of `kind`
    #[must_use]
    pub fn ignoring(mut self, kind: FailureKind) -> Self {
        if !self.ignored.contains(&kind) {
            self.ignored.push(kind);
        }
        self
    }

    /// Fixed timeout message
    #[must_use]
    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.with_message_fn(move || message.clone())
    }

    /// Timeout message computed when the wait gives up
    #[must_use]
    pub fn with_message_fn(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.message = Some(MessageSupplier::new(f));
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Render a duration the way timeout messages show it ("2s", "500ms")
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let ms = duration_ms(duration);
    if ms >= 1000 && ms % 1000 == 0 {
        format!("{}s", ms / 1000)
    } else {
        format!("{ms}ms")
    }
}

// =============================================================================
// FAILURE STRATEGY & RECOVERY
// =============================================================================

/// How the engine reacts when the condition raises a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    /// Tolerate ignored failures until the deadline; propagate the rest at once
    #[default]
    PropagateOrIgnore,
    /// Abandon polling on any failure and consult the recovery
    AlwaysFallback,
}

impl FailureStrategy {
    /// Name used in logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PropagateOrIgnore => "propagate_or_ignore",
            Self::AlwaysFallback => "always_fallback",
        }
    }
}

impl fmt::Display for FailureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a condition's stored alternates are filed under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetKey {
    /// Caller-supplied locator key
    Explicit(String),
    /// No key given; the condition's description stands in for one
    Described(String),
}

impl TargetKey {
    fn of<I, C: Condition<I>>(condition: &C) -> Self {
        condition
            .locator_key()
            .map_or_else(|| Self::Described(condition.description()), Self::Explicit)
    }
}

/// Hooks consulted under [`FailureStrategy::AlwaysFallback`]
pub trait Recovery<I, V> {
    /// The condition failed; produce a value some other way or give up
    fn on_failure(&self, input: &I, target: &TargetKey, cause: ConditionFailure)
        -> HealResult<V>;

    /// The condition succeeded with `value`. Must not fail the wait.
    fn on_success(&self, input: &I, target: &TargetKey, value: &V);
}

/// Recovery with nothing to fall back on
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecovery;

impl<I, V> Recovery<I, V> for NoRecovery {
    fn on_failure(&self, _input: &I, target: &TargetKey, cause: ConditionFailure) -> HealResult<V> {
        let identity = match target {
            TargetKey::Explicit(key) | TargetKey::Described(key) => key.clone(),
        };
        Err(HealError::FallbackExhausted {
            identity,
            attempted: 0,
            store_error: None,
            cause: Some(cause),
        })
    }

    fn on_success(&self, _input: &I, _target: &TargetKey, _value: &V) {}
}

// =============================================================================
// WAIT
// =============================================================================

type Diagnostics<I> = fn(&I) -> Vec<(String, String)>;

/// Polls a condition against `input` until it is satisfied or the wait gives up
#[derive(Debug)]
pub struct Wait<I, R = NoRecovery> {
    input: I,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    config: WaitConfig,
    strategy: FailureStrategy,
    recovery: R,
    diagnostics: Option<Diagnostics<I>>,
}

impl<I> Wait<I, NoRecovery> {
    /// Plain wait on the system clock
    pub fn new(input: I) -> Self {
        Self::with_clock(
            input,
            Arc::new(SystemClock::new()),
            Arc::new(ThreadSleeper::new()),
        )
    }

    /// Plain wait on the given clock and sleeper
    pub fn with_clock(input: I, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            input,
            clock,
            sleeper,
            config: WaitConfig::default(),
            strategy: FailureStrategy::PropagateOrIgnore,
            recovery: NoRecovery,
            diagnostics: None,
        }
    }

    /// Tolerate failures of `kind` while polling
    #[must_use]
    pub fn ignoring(mut self, kind: FailureKind) -> Self {
        self.config = self.config.ignoring(kind);
        self
    }

    /// Tolerate every kind in `kinds`
    #[must_use]
    pub fn ignore_all(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        for kind in kinds {
            self.config = self.config.ignoring(kind);
        }
        self
    }

    /// Apply `config` on top of the current settings. Its ignore list is
    /// added to the kinds already tolerated.
    #[must_use]
    pub fn with_config(self, config: WaitConfig) -> Self {
        let ignored = config.ignored.clone();
        self.with_timing(&config).ignore_all(ignored)
    }
}

impl<D: LocatorDriver> Wait<D, NoRecovery> {
    /// Plain wait over a driver: polls every 500ms, tolerates `NotFound`,
    /// and adds the driver's diagnostics to timeout messages.
    pub fn for_driver(driver: D, timeout: Duration) -> Self {
        Self::new(driver)
            .with_timeout(timeout)
            .polling_every(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
            .ignoring(FailureKind::NotFound)
            .reporting_driver_diagnostics()
    }
}

impl<D: LocatorDriver, R> Wait<D, R> {
    /// Append the driver's diagnostics to timeout messages
    #[must_use]
    pub fn reporting_driver_diagnostics(mut self) -> Self {
        let diagnostics: Diagnostics<D> = |driver| driver.diagnostics();
        self.diagnostics = Some(diagnostics);
        self
    }
}

impl<I, R> Wait<I, R> {
    /// Wait with an explicit strategy and recovery
    pub fn with_recovery(input: I, strategy: FailureStrategy, recovery: R) -> Self {
        Self {
            input,
            clock: Arc::new(SystemClock::new()),
            sleeper: Arc::new(ThreadSleeper::new()),
            config: WaitConfig::default(),
            strategy,
            recovery,
            diagnostics: None,
        }
    }

    /// Swap in another clock and sleeper
    #[must_use]
    pub fn using_clock(mut self, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        self.clock = clock;
        self.sleeper = sleeper;
        self
    }

    /// Take timeout, poll interval and message (when set) from `config`.
    /// Its ignore list is not applied here; see [`Wait::with_config`].
    #[must_use]
    pub fn with_timing(mut self, config: &WaitConfig) -> Self {
        self.config.timeout_ms = config.timeout_ms;
        self.config.poll_interval_ms = config.poll_interval_ms;
        if let Some(message) = &config.message {
            self.config.message = Some(message.clone());
        }
        self
    }

    /// How long to wait for the condition
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = duration_ms(timeout);
        self
    }

    /// How often to evaluate the condition. Evaluation cost is not
    /// subtracted, so the real interval can be longer.
    #[must_use]
    pub fn polling_every(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Fixed timeout message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.config = self.config.with_message(message);
        self
    }

    /// Timeout message computed when the wait gives up
    #[must_use]
    pub fn with_message_fn(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.config = self.config.with_message_fn(f);
        self
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Failure strategy chosen at construction
    #[must_use]
    pub const fn strategy(&self) -> FailureStrategy {
        self.strategy
    }

    /// The value conditions are evaluated against
    #[must_use]
    pub const fn input(&self) -> &I {
        &self.input
    }

    /// The recovery consulted under [`FailureStrategy::AlwaysFallback`]
    #[must_use]
    pub const fn recovery(&self) -> &R {
        &self.recovery
    }

    /// Evaluate `condition` until it is satisfied.
    ///
    /// # Errors
    ///
    /// - [`HealError::Condition`] for an unignored failure (plain mode)
    /// - [`HealError::Timeout`] when the deadline passes
    /// - whatever the recovery returns after a failure (self-healing mode),
    ///   normally [`HealError::FallbackExhausted`]
    /// - [`HealError::Cancelled`] if the poll sleep is interrupted
    pub fn until<C>(&self, condition: &C) -> HealResult<Satisfied<C, I>>
    where
        C: Condition<I>,
        R: Recovery<I, Satisfied<C, I>>,
    {
        let end = self.clock.later_by(self.config.timeout());
        let mut last_failure: Option<ConditionFailure> = None;
        let mut evaluations: u64 = 0;

        loop {
            evaluations += 1;
            match condition.check(&self.input) {
                Ok(outcome) => {
                    if let Some(value) = outcome.into_satisfied() {
                        debug!(
                            condition = %condition.description(),
                            evaluations,
                            "condition satisfied"
                        );
                        if self.strategy == FailureStrategy::AlwaysFallback {
                            self.recovery
                                .on_success(&self.input, &TargetKey::of(condition), &value);
                        }
                        return Ok(value);
                    }
                    // A plain "not yet" means an earlier failure is no longer what blocks us
                    last_failure = None;
                }
                Err(failure) => match self.strategy {
                    FailureStrategy::AlwaysFallback => {
                        return self.fall_back(condition, failure);
                    }
                    FailureStrategy::PropagateOrIgnore => {
                        last_failure = Some(self.propagate_or_ignore(failure)?);
                    }
                },
            }

            if !self.clock.is_now_before(end) {
                return Err(self.timeout_error(condition, last_failure, evaluations));
            }
            trace!(interval_ms = self.config.poll_interval_ms, "sleeping before next poll");
            self.sleeper
                .sleep(self.config.poll_interval())
                .map_err(HealError::Cancelled)?;
            if !self.clock.is_now_before(end) {
                return Err(self.timeout_error(condition, last_failure, evaluations));
            }
        }
    }

    fn propagate_or_ignore(&self, failure: ConditionFailure) -> HealResult<ConditionFailure> {
        if failure.is_ignored_by(&self.config.ignored) {
            debug!(error = %failure, "ignoring condition failure");
            Ok(failure)
        } else {
            Err(HealError::Condition(failure))
        }
    }

    fn fall_back<C>(&self, condition: &C, failure: ConditionFailure) -> HealResult<Satisfied<C, I>>
    where
        C: Condition<I>,
        R: Recovery<I, Satisfied<C, I>>,
    {
        warn!(
            condition = %condition.description(),
            error = %failure,
            "primary condition failed, trying stored alternates"
        );
        self.recovery
            .on_failure(&self.input, &TargetKey::of(condition), failure)
    }

    fn timeout_error<C: Condition<I>>(
        &self,
        condition: &C,
        cause: Option<ConditionFailure>,
        evaluations: u64,
    ) -> HealError {
        let what = self
            .config
            .message
            .as_ref()
            .map_or_else(|| format!("waiting for {}", condition.description()), |m| m.get());
        let mut message = format!(
            "Expected condition failed: {what} (tried for {} with {} interval)",
            format_duration(self.config.timeout()),
            format_duration(self.config.poll_interval()),
        );
        if let Some(cause) = &cause {
            message.push_str(&format!("; last failure: {cause}"));
        }
        if let Some(diagnostics) = self.diagnostics {
            for (key, value) in diagnostics(&self.input) {
                message.push_str(&format!("\n{key}: {value}"));
            }
        }
        debug!(evaluations, "wait timed out");
        HealError::Timeout { message, cause }
    }
}

// =============================================================================
// TESTS
// =============================================================================
