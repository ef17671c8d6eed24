//! Wait policies and the polling scheduler.
//!
//! Every retry loop in the engine goes through [`Poller`]: invoke the
//! predicate immediately, then sleep one interval between attempts until the
//! predicate yields a value, the deadline passes, or the cancellation token
//! fires.
//!
//! ## Timing contract
//!
//! - attempt `k` starts at `(k - 1) * interval` (plus time spent inside the
//!   predicate itself)
//! - the last sleep is shortened so the poller wakes exactly at the deadline
//! - no attempt ever starts at or after the deadline
//! - cancellation is observed before each attempt and during each sleep,
//!   never in the middle of a predicate call

use crate::driver::{DriverError, DriverResult};
use crate::result::{AguardarError, AguardarResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for element resolution (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (500ms)
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Default timeout for outcome classification (7 seconds)
pub const DEFAULT_CLASSIFY_TIMEOUT_MS: u64 = 7_000;

// =============================================================================
// WAIT POLICY
// =============================================================================

/// Timeout and poll-interval pair governing one wait.
///
/// Only constructible through [`WaitPolicy::new`], so `interval_ms > 0` and
/// `timeout_ms >= interval_ms` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWaitPolicy", into = "RawWaitPolicy")]
pub struct WaitPolicy {
    timeout_ms: u64,
    interval_ms: u64,
    fail_fast: bool,
}

impl WaitPolicy {
    /// Create a policy, rejecting zero or inverted values
    pub fn new(timeout_ms: u64, interval_ms: u64) -> AguardarResult<Self> {
        if interval_ms == 0 {
            return Err(AguardarError::configuration(
                "wait interval_ms must be greater than zero",
            ));
        }
        if timeout_ms < interval_ms {
            return Err(AguardarError::configuration(format!(
                "wait timeout_ms ({timeout_ms}) must be >= interval_ms ({interval_ms})"
            )));
        }
        Ok(Self {
            timeout_ms,
            interval_ms,
            fail_fast: false,
        })
    }

    /// Propagate predicate errors immediately instead of retrying
    #[must_use]
    pub const fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Timeout in milliseconds
    #[must_use]
    pub const fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Poll interval in milliseconds
    #[must_use]
    pub const fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Whether predicate errors propagate
    #[must_use]
    pub const fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Derive a policy with a smaller budget, clamping the interval to it.
    ///
    /// Returns `None` when less than one millisecond of budget remains.
    #[must_use]
    pub fn with_budget(&self, budget: Duration) -> Option<Self> {
        let timeout_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        if timeout_ms == 0 {
            return None;
        }
        Some(Self {
            timeout_ms,
            interval_ms: self.interval_ms.min(timeout_ms),
            fail_fast: self.fail_fast,
        })
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            interval_ms: DEFAULT_INTERVAL_MS,
            fail_fast: false,
        }
    }
}

impl WaitPolicy {
    /// Default policy for outcome classification (7000/500)
    #[must_use]
    pub const fn classification() -> Self {
        Self {
            timeout_ms: DEFAULT_CLASSIFY_TIMEOUT_MS,
            interval_ms: DEFAULT_INTERVAL_MS,
            fail_fast: false,
        }
    }
}

/// Unvalidated wire form of [`WaitPolicy`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct RawWaitPolicy {
    timeout_ms: u64,
    interval_ms: u64,
    #[serde(default)]
    fail_fast: bool,
}

impl TryFrom<RawWaitPolicy> for WaitPolicy {
    type Error = AguardarError;

    fn try_from(raw: RawWaitPolicy) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.timeout_ms, raw.interval_ms)?.fail_fast(raw.fail_fast))
    }
}

impl From<WaitPolicy> for RawWaitPolicy {
    fn from(policy: WaitPolicy) -> Self {
        Self {
            timeout_ms: policy.timeout_ms,
            interval_ms: policy.interval_ms,
            fail_fast: policy.fail_fast,
        }
    }
}

// =============================================================================
// WAIT RESULT
// =============================================================================

/// Value produced by a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waited<T> {
    /// The predicate's value
    pub value: T,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of predicate invocations, including the successful one
    pub attempts: usize,
}

// =============================================================================
// POLLER
// =============================================================================

/// The polling scheduler
#[derive(Debug, Clone, Default)]
pub struct Poller {
    policy: WaitPolicy,
    cancel: Option<CancellationToken>,
}

impl Poller {
    /// Create a poller for a policy
    #[must_use]
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            policy,
            cancel: None,
        }
    }

    /// Observe a cancellation token at every poll boundary
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attach an optional token
    #[must_use]
    pub fn with_optional_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// The policy this poller enforces
    #[must_use]
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Poll `predicate` until it yields `Some(value)`.
    ///
    /// `Ok(None)` means "not yet". `Err(_)` is logged and treated as
    /// "not yet", or returned as [`AguardarError::Transport`] when the policy
    /// is fail-fast.
    pub async fn poll<T, F, Fut>(
        &self,
        description: &str,
        mut predicate: F,
    ) -> AguardarResult<Waited<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DriverResult<Option<T>>>,
    {
        let start = Instant::now();
        let deadline = start + self.policy.timeout();
        let mut attempts = 0usize;
        let mut last_error: Option<DriverError> = None;

        loop {
            if self.is_cancelled() {
                return Err(AguardarError::Cancelled {
                    elapsed: start.elapsed(),
                    attempts,
                });
            }

            attempts += 1;
            match predicate().await {
                Ok(Some(value)) => {
                    return Ok(Waited {
                        value,
                        elapsed: start.elapsed(),
                        attempts,
                    });
                }
                Ok(None) => {}
                Err(err) if self.policy.fail_fast => {
                    debug!(
                        %description,
                        attempt = attempts,
                        error = %err,
                        "fail-fast predicate error"
                    );
                    return Err(AguardarError::Transport(err));
                }
                Err(err) => {
                    debug!(
                        %description,
                        attempt = attempts,
                        error = %err,
                        "predicate error treated as not satisfied"
                    );
                    last_error = Some(err);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let pause = self.policy.interval().min(deadline - now);
            if !self.pause(pause).await {
                return Err(AguardarError::Cancelled {
                    elapsed: start.elapsed(),
                    attempts,
                });
            }
            if Instant::now() >= deadline {
                break;
            }
        }

        Err(AguardarError::Timeout {
            description: description.to_string(),
            elapsed: start.elapsed(),
            attempts,
            last_error: last_error.map(|e| e.to_string()),
        })
    }

    /// Poll a boolean check until it returns `true`
    pub async fn wait_until<F, Fut>(
        &self,
        description: &str,
        mut check: F,
    ) -> AguardarResult<Waited<()>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DriverResult<bool>>,
    {
        self.poll(description, || {
            let pending = check();
            async move { pending.await.map(|done| done.then_some(())) }
        })
        .await
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Sleep for `duration`; returns `false` if cancelled meanwhile
    async fn pause(&self, duration: Duration) -> bool {
        match &self.cancel {
            Some(token) => tokio::select! {
                () = tokio::time::sleep(duration) => true,
                () = token.cancelled() => false,
            },
            None => {
                tokio::time::sleep(duration).await;
                true
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
