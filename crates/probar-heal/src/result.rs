//! Result and error types for probar-heal.

use crate::condition::ConditionFailure;
use crate::clock::Interrupted;
use crate::store::StoreError;
use thiserror::Error;

/// Result type for probar-heal operations
pub type HealResult<T> = Result<T, HealError>;

/// Errors that can occur while waiting, healing or recording
#[derive(Debug, Error)]
pub enum HealError {
    /// The condition raised a failure that is not on the ignore list
    #[error("Condition failed: {0}")]
    Condition(#[from] ConditionFailure),

    /// Deadline passed without a satisfying result
    #[error("{message}")]
    Timeout {
        /// Full diagnostic message (condition, timeout, interval, driver info)
        message: String,
        /// Last ignored failure still blocking the condition, if any
        #[source]
        cause: Option<ConditionFailure>,
    },

    /// Self-healing mode: no stored alternate resolved the target
    #[error("No stored alternate resolved {identity} ({attempted} tried)")]
    FallbackExhausted {
        /// Identity the alternates were looked up under
        identity: String,
        /// Number of stored alternates attempted
        attempted: usize,
        /// Store access problem that left the protocol without candidates
        store_error: Option<String>,
        /// The primary failure that triggered the fallback
        #[source]
        cause: Option<ConditionFailure>,
    },

    /// The poll-interval sleep was interrupted by the host
    #[error("Wait cancelled: {0}")]
    Cancelled(#[source] Interrupted),

    /// Locator store unavailable
    #[error("Locator store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HealError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// True for the two "gave up" outcomes: primary timeout or exhausted fallback
    #[must_use]
    pub const fn is_exhaustion(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::FallbackExhausted { .. })
    }

    /// The condition failure behind this error, if there is one
    #[must_use]
    pub const fn condition_failure(&self) -> Option<&ConditionFailure> {
        match self {
            Self::Condition(failure) => Some(failure),
            Self::Timeout { cause, .. } | Self::FallbackExhausted { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }
}
