//! Probar Heal: self-healing waits for browser automation
//!
//! A wait polls a [`Condition`] until it yields a value. In self-healing
//! mode a failing locator is not the end of the test: alternates recorded
//! on earlier successful runs are tried instead, and every success records
//! fresh alternates for next time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    PROBAR HEAL                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │   ┌───────────┐   failure   ┌───────────┐   get_all          │
//! │   │ Wait      │────────────►│ Fallback  │──────────┐         │
//! │   │ (poll)    │             │ protocol  │          ▼         │
//! │   └─────┬─────┘             └───────────┘   ┌────────────┐   │
//! │         │ success           ┌───────────┐   │ Locator    │   │
//! │         └──────────────────►│ Recorder  │──►│ Store      │   │
//! │                             └───────────┘   └────────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use probar_heal::{conditions, HealConfig, Selector, MockDriver};
//!
//! # fn main() -> probar_heal::HealResult<()> {
//! let config = HealConfig::from_yaml_str(
//!     "store: {backend: memory}\nwait: {timeout_ms: 5000, poll_interval_ms: 250}",
//! )?;
//! let driver = MockDriver::new();
//! let wait = config.self_healing_wait(&driver)?;
//! let login = wait.until(&conditions::presence_of_element(Selector::css("#login")))?;
//! # let _ = login;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod clock;
mod condition;
mod config;
mod driver;
mod heal;
mod locator;
mod result;
pub mod store;
mod wait;

pub use clock::{
    Clock, FakeClock, FakeSleeper, Interrupted, Interrupter, Sleeper, SystemClock, ThreadSleeper,
};
pub use condition::{
    conditions, Condition, ConditionFailure, FailureKind, FnCondition, Outcome, Satisfied,
};
pub use config::{HealConfig, StoreBackend, StoreConfig, DEFAULT_STORE_PATH};
pub use driver::{
    parse_candidates, BoundingBox, CandidateGenerator, ElementHandle, LocatorDriver, MockDriver,
    ScriptCandidateGenerator, GENERATE_LOCATORS_JS,
};
pub use heal::SelfHealing;
pub use locator::{file_safe, LocatorIdentity, LocatorRecord, Selector};
pub use result::{HealError, HealResult};
pub use store::{with_handle, LocatorStore, MemoryLocatorStore, StoreError, StoreHandle};
#[cfg(feature = "sqlite")]
pub use store::SqliteLocatorStore;
pub use wait::{
    format_duration, FailureStrategy, MessageSupplier, NoRecovery, Recovery, TargetKey, Wait,
    WaitConfig, DEFAULT_POLL_INTERVAL_MS, DEFAULT_TIMEOUT_MS,
};
