//! Result and error types for Aguardar.

use crate::driver::DriverError;
use crate::fallback::ResolutionAttempt;
use std::time::Duration;
use thiserror::Error;

/// Result type for Aguardar operations
pub type AguardarResult<T> = Result<T, AguardarError>;

/// Errors that can occur while resolving or verifying UI elements
#[derive(Debug, Error)]
pub enum AguardarError {
    /// Invalid wait policy, empty strategy list or malformed configuration.
    /// Raised at construction time and never retried.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message
        message: String,
    },

    /// Deadline reached without the awaited condition becoming true
    #[error(
        "Timed out waiting for {description} after {}ms ({attempts} attempt(s)){}",
        .elapsed.as_millis(),
        .last_error.as_ref().map(|e| format!(", last error: {e}")).unwrap_or_default()
    )]
    Timeout {
        /// What was being waited for
        description: String,
        /// Time spent before giving up
        elapsed: Duration,
        /// Number of predicate invocations
        attempts: usize,
        /// Last transport error swallowed while polling, if any
        last_error: Option<String>,
    },

    /// Wait abandoned through its cancellation token
    #[error("Cancelled after {}ms ({attempts} attempt(s))", .elapsed.as_millis())]
    Cancelled {
        /// Time spent before cancellation was observed
        elapsed: Duration,
        /// Number of predicate invocations
        attempts: usize,
    },

    /// Every strategy of a fallback chain failed
    #[error("Element not found: {}", summarize_attempts(.attempts))]
    NotFound {
        /// Attempted strategies in order, with their failure reasons
        attempts: Vec<ResolutionAttempt>,
    },

    /// Several outcome conditions held at once and precedence could not pick one
    #[error("Ambiguous outcome: conditions {} held simultaneously", .conditions.join(", "))]
    Ambiguous {
        /// Names of the tied conditions, in declaration order
        conditions: Vec<String>,
    },

    /// Transport error propagated by a fail-fast wait
    #[error("Driver error: {0}")]
    Transport(#[from] DriverError),

    /// Gesture injection failed
    #[error("Gesture failed: {message}")]
    Gesture {
        /// Error message
        message: String,
    },

    /// YAML parse error
    #[error("YAML error: {message}")]
    Yaml {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AguardarError {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this failure should be followed by a diagnostic capture.
    ///
    /// Only unresolved outcomes qualify; cancellation and configuration
    /// errors are the caller's own doing.
    #[must_use]
    pub const fn triggers_diagnostics(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NotFound { .. } | Self::Ambiguous { .. }
        )
    }
}

fn summarize_attempts(attempts: &[ResolutionAttempt]) -> String {
    if attempts.is_empty() {
        return "no strategy attempted".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
