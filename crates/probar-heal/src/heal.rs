//! Self-healing recovery: fallback resolution and locator recording.
//!
//! When a primary locator fails, the stored alternates for its identity
//! are tried in order and the first one that resolves wins. When a primary
//! locator succeeds, alternates are generated for the element it found and
//! written back, so the next run has something to fall back on.

use crate::condition::ConditionFailure;
use crate::driver::{CandidateGenerator, ElementHandle, LocatorDriver, ScriptCandidateGenerator};
use crate::locator::LocatorIdentity;
use crate::result::{HealError, HealResult};
use crate::store::{with_handle, LocatorStore};
use crate::wait::{FailureStrategy, Recovery, TargetKey, Wait};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Recovery backed by a [`LocatorStore`]
#[derive(Debug, Clone)]
pub struct SelfHealing {
    store: Arc<dyn LocatorStore>,
    generator: Arc<dyn CandidateGenerator>,
    record_on_success: bool,
}

impl SelfHealing {
    /// Heal from `store`, generating alternates with the bundled script
    #[must_use]
    pub fn new(store: Arc<dyn LocatorStore>) -> Self {
        Self {
            store,
            generator: Arc::new(ScriptCandidateGenerator::default()),
            record_on_success: true,
        }
    }

    /// Use another candidate generator
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn CandidateGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Turn recording of alternates after a success on or off
    #[must_use]
    pub const fn recording(mut self, enabled: bool) -> Self {
        self.record_on_success = enabled;
        self
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &dyn LocatorStore {
        self.store.as_ref()
    }

    /// Whether successes are recorded
    #[must_use]
    pub const fn records_on_success(&self) -> bool {
        self.record_on_success
    }

    /// Identity under which `target`'s alternates live on the driver's current page
    pub fn identity_for<D: LocatorDriver + ?Sized>(
        &self,
        driver: &D,
        target: &TargetKey,
    ) -> LocatorIdentity {
        let page = driver.current_url().unwrap_or_else(|failure| {
            warn!(error = %failure, "could not read current URL; using empty page context");
            String::new()
        });
        match target {
            TargetKey::Explicit(key) => LocatorIdentity::new(key, &page),
            TargetKey::Described(description) => {
                warn!(
                    condition = %description,
                    "condition has no locator key; keying alternates by its description"
                );
                #[allow(deprecated)]
                LocatorIdentity::from_description(description, &page)
            }
        }
    }

    /// Try every stored alternate for `identity`, most recent first, and
    /// return the first element one of them resolves.
    ///
    /// # Errors
    ///
    /// [`HealError::FallbackExhausted`] when the store is empty, unreadable,
    /// or no alternate resolves. `cause` is carried along as the error source.
    pub fn try_alternates<D: LocatorDriver + ?Sized>(
        &self,
        driver: &D,
        identity: &LocatorIdentity,
        cause: Option<ConditionFailure>,
    ) -> HealResult<ElementHandle> {
        let records = match with_handle(self.store.as_ref(), |h| h.get_all(identity)) {
            Ok(records) => records,
            Err(e) => {
                warn!(identity = %identity, error = %e, "locator store unavailable during fallback");
                return Err(HealError::FallbackExhausted {
                    identity: identity.to_string(),
                    attempted: 0,
                    store_error: Some(e.to_string()),
                    cause,
                });
            }
        };

        if records.is_empty() {
            debug!(identity = %identity, "no stored alternates");
        }

        let mut attempted = 0;
        for record in &records {
            attempted += 1;
            match driver.find_element(&record.selector) {
                Ok(Some(element)) => {
                    info!(
                        identity = %identity,
                        selector = %record.selector,
                        attempted,
                        "resolved element through stored alternate"
                    );
                    return Ok(element);
                }
                Ok(None) => debug!(selector = %record.selector, "alternate matched nothing"),
                Err(failure) => {
                    debug!(selector = %record.selector, error = %failure, "alternate lookup failed");
                }
            }
        }

        Err(HealError::FallbackExhausted {
            identity: identity.to_string(),
            attempted,
            store_error: None,
            cause,
        })
    }

    /// Generate alternates for `element` and store them under `identity`.
    /// Returns how many were written.
    ///
    /// # Errors
    ///
    /// Fails if generation or the store write fails. The wait engine logs
    /// and discards these errors; direct callers may want them.
    pub fn record<D: LocatorDriver>(
        &self,
        driver: &D,
        identity: &LocatorIdentity,
        element: &ElementHandle,
    ) -> HealResult<usize> {
        let candidates = self.generator.candidates(driver, element)?;
        if candidates.is_empty() {
            debug!(identity = %identity, "generator produced no alternates");
            return Ok(0);
        }
        with_handle(self.store.as_ref(), |h| h.put_all(identity, &candidates))?;
        debug!(identity = %identity, count = candidates.len(), "recorded alternates");
        Ok(candidates.len())
    }
}

impl<D: LocatorDriver> Recovery<D, ElementHandle> for SelfHealing {
    fn on_failure(
        &self,
        driver: &D,
        target: &TargetKey,
        cause: ConditionFailure,
    ) -> HealResult<ElementHandle> {
        let identity = self.identity_for(driver, target);
        self.try_alternates(driver, &identity, Some(cause))
    }

    fn on_success(&self, driver: &D, target: &TargetKey, element: &ElementHandle) {
        if !self.record_on_success {
            return;
        }
        let identity = self.identity_for(driver, target);
        if let Err(e) = self.record(driver, &identity, element) {
            warn!(identity = %identity, error = %e, "failed to record alternate locators");
        }
    }
}

impl<D: LocatorDriver> Wait<D, SelfHealing> {
    /// Self-healing wait: the first failure switches to stored alternates,
    /// and every success records alternates for next time.
    pub fn self_healing(driver: D, healing: SelfHealing) -> Self {
        Self::with_recovery(driver, FailureStrategy::AlwaysFallback, healing)
            .reporting_driver_diagnostics()
    }
}
