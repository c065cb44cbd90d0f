//! YAML configuration for self-healing waits.
//!
//! ```yaml
//! store:
//!   backend: sqlite
//!   path: target/probar-heal/locators.db
//!   namespace: checkout_suite
//! wait:
//!   timeout_ms: 5000
//!   poll_interval_ms: 250
//!   ignored: [not_found, stale_element]
//! record_on_success: true
//! ```

use crate::driver::LocatorDriver;
use crate::heal::SelfHealing;
use crate::result::{HealError, HealResult};
use crate::store::{LocatorStore, MemoryLocatorStore, DEFAULT_NAMESPACE};
use crate::wait::{Wait, WaitConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default location of the SQLite store file
pub const DEFAULT_STORE_PATH: &str = "target/probar-heal/locators.db";

/// Which [`LocatorStore`] implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process, lost when the process exits
    Memory,
    /// SQLite file shared across runs
    Sqlite,
}

impl Default for StoreBackend {
    fn default() -> Self {
        if cfg!(feature = "sqlite") {
            Self::Sqlite
        } else {
            Self::Memory
        }
    }
}

/// Locator store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend
    pub backend: StoreBackend,
    /// Database file (sqlite backend only)
    pub path: PathBuf,
    /// Namespace records are filed under
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: PathBuf::from(DEFAULT_STORE_PATH),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Open the configured store
    ///
    /// # Errors
    /// Returns a configuration error if the backend is unavailable or
    /// its settings are incomplete
    pub fn build(&self) -> HealResult<Arc<dyn LocatorStore>> {
        match self.backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryLocatorStore::with_namespace(
                self.namespace.clone(),
            ))),
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite => Ok(Arc::new(crate::store::SqliteLocatorStore::with_namespace(
                self.path.clone(),
                self.namespace.clone(),
            ))),
            #[cfg(not(feature = "sqlite"))]
            StoreBackend::Sqlite => Err(HealError::config(
                "sqlite backend requested but the `sqlite` feature is disabled",
            )),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Where alternates are stored
    pub store: StoreConfig,
    /// Timing and ignore list
    pub wait: WaitConfig,
    /// Record alternates after each successful self-healing wait
    pub record_on_success: bool,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            wait: WaitConfig::default(),
            record_on_success: true,
        }
    }
}

impl HealConfig {
    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    /// Returns error if YAML is invalid or validation fails.
    pub fn from_yaml_str(yaml: &str) -> HealResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> HealResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> HealResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Check settings serde cannot
    ///
    /// # Errors
    /// Returns a configuration error naming the first bad field
    pub fn validate(&self) -> HealResult<()> {
        if self.store.namespace.trim().is_empty() {
            return Err(HealError::config("store.namespace must not be empty"));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(HealError::config("store.path is required for the sqlite backend"));
        }
        if self.wait.poll_interval_ms == 0 && self.wait.timeout_ms > 0 {
            return Err(HealError::config(
                "wait.poll_interval_ms must be positive when wait.timeout_ms is",
            ));
        }
        Ok(())
    }

    /// Open the configured store
    ///
    /// # Errors
    /// See [`StoreConfig::build`]
    pub fn build_store(&self) -> HealResult<Arc<dyn LocatorStore>> {
        self.store.build()
    }

    /// Recovery over the configured store
    ///
    /// # Errors
    /// See [`StoreConfig::build`]
    pub fn self_healing(&self) -> HealResult<SelfHealing> {
        Ok(SelfHealing::new(self.build_store()?).recording(self.record_on_success))
    }

    /// Self-healing wait over `driver` with the configured store and the
    /// timing from `wait`. The ignore list does not apply in this mode.
    ///
    /// # Errors
    /// See [`StoreConfig::build`]
    pub fn self_healing_wait<D: LocatorDriver>(
        &self,
        driver: D,
    ) -> HealResult<Wait<D, SelfHealing>> {
        Ok(Wait::self_healing(driver, self.self_healing()?).with_timing(&self.wait))
    }

    /// Plain driver wait (see [`Wait::for_driver`]) with `wait` applied on top
    #[must_use]
    pub fn driver_wait<D: LocatorDriver>(&self, driver: D) -> Wait<D> {
        Wait::for_driver(driver, self.wait.timeout()).with_config(self.wait.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::condition::FailureKind;
    use crate::locator::{LocatorIdentity, Selector};
    use crate::store::with_handle;
    use tempfile::TempDir;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_defaults_from_empty_document() {
            let config = HealConfig::from_yaml_str("{}").unwrap();
            assert_eq!(config.store.namespace, DEFAULT_NAMESPACE);
            assert_eq!(config.wait.timeout_ms, 500);
            assert!(config.record_on_success);
        }

        #[test]
        fn test_full_document() {
            let yaml = r"
store:
  backend: memory
  namespace: checkout_suite
wait:
  timeout_ms: 5000
  poll_interval_ms: 250
  ignored: [not_found, stale_element]
record_on_success: false
";
            let config = HealConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.store.backend, StoreBackend::Memory);
            assert_eq!(config.store.namespace, "checkout_suite");
            assert_eq!(config.wait.poll_interval_ms, 250);
            assert_eq!(
                config.wait.ignored,
                vec![FailureKind::NotFound, FailureKind::StaleElement]
            );
            assert!(!config.record_on_success);
        }

        #[test]
        fn test_unknown_backend_rejected() {
            let err = HealConfig::from_yaml_str("store: {backend: redis}").unwrap_err();
            assert!(matches!(err, HealError::Yaml(_)));
        }

        #[test]
        fn test_empty_namespace_rejected() {
            let err = HealConfig::from_yaml_str("store: {backend: memory, namespace: ' '}")
                .unwrap_err();
            assert!(err.to_string().contains("store.namespace"));
        }

        #[test]
        fn test_zero_interval_rejected() {
            let err = HealConfig::from_yaml_str("wait: {timeout_ms: 1000, poll_interval_ms: 0}")
                .unwrap_err();
            assert!(matches!(err, HealError::Config { .. }));
        }

        #[test]
        fn test_yaml_round_trip_keeps_settings() {
            let mut config = HealConfig::default();
            config.store.namespace = "nightly".into();
            config.wait.ignored.push(FailureKind::StaleElement);
            let back = HealConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
            assert_eq!(back.store, config.store);
            assert_eq!(back.wait.ignored, config.wait.ignored);
        }

        #[test]
        fn test_from_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("heal.yaml");
            std::fs::write(&path, "store: {backend: memory}\n").unwrap();
            let config = HealConfig::from_file(&path).unwrap();
            assert_eq!(config.store.backend, StoreBackend::Memory);
        }

        #[test]
        fn test_missing_file_is_io_error() {
            let err = HealConfig::from_file(Path::new("/nonexistent/heal.yaml")).unwrap_err();
            assert!(matches!(err, HealError::Io(_)));
        }
    }

    mod build_tests {
        use super::*;

        #[test]
        fn test_memory_store_uses_namespace() {
            let config = HealConfig::from_yaml_str("store: {backend: memory, namespace: ns1}").unwrap();
            assert_eq!(config.build_store().unwrap().namespace(), "ns1");
        }

        #[cfg(feature = "sqlite")]
        #[test]
        fn test_sqlite_store_is_shared_across_builds() {
            let dir = TempDir::new().unwrap();
            let mut config = HealConfig::default();
            config.store.backend = StoreBackend::Sqlite;
            config.store.path = dir.path().join("locators.db");
            let identity = LocatorIdentity::new("css=#a", "https://example.com");

            let first = config.build_store().unwrap();
            with_handle(first.as_ref(), |h| h.put(&identity, &Selector::css("#b"))).unwrap();
            let second = config.build_store().unwrap();
            let records = with_handle(second.as_ref(), |h| h.get_all(&identity)).unwrap();
            assert_eq!(records[0].selector, Selector::css("#b"));
        }

        #[test]
        fn test_self_healing_honours_recording_flag() {
            let config =
                HealConfig::from_yaml_str("store: {backend: memory}\nrecord_on_success: false")
                    .unwrap();
            assert!(!config.self_healing().unwrap().records_on_success());
        }
    }

    mod wait_tests {
        use super::*;
        use crate::driver::MockDriver;
        use crate::wait::FailureStrategy;

        const TIMED: &str = "store: {backend: memory}
wait: {timeout_ms: 5000, poll_interval_ms: 250, ignored: [stale_element]}";

        #[test]
        fn test_self_healing_wait_uses_configured_timing() {
            let config = HealConfig::from_yaml_str(TIMED).unwrap();
            let driver = MockDriver::new();
            let wait = config.self_healing_wait(&driver).unwrap();
            assert_eq!(wait.strategy(), FailureStrategy::AlwaysFallback);
            assert_eq!(wait.config().timeout_ms, 5000);
            assert_eq!(wait.config().poll_interval_ms, 250);
            assert!(wait.config().ignored.is_empty());
        }

        #[test]
        fn test_driver_wait_keeps_not_found_ignore() {
            let config = HealConfig::from_yaml_str(TIMED).unwrap();
            let driver = MockDriver::new();
            let wait = config.driver_wait(&driver);
            assert_eq!(wait.strategy(), FailureStrategy::PropagateOrIgnore);
            assert_eq!(wait.config().timeout_ms, 5000);
            assert_eq!(wait.config().poll_interval_ms, 250);
            assert_eq!(
                wait.config().ignored,
                vec![FailureKind::NotFound, FailureKind::StaleElement]
            );
        }
    }
}
