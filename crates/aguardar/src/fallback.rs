//! Fallback chain evaluation.
//!
//! Tries an ordered list of [`LocatorStrategy`] values, polling each one
//! through a [`Poller`], and returns the first element that resolves.
//!
//! Per tick and per strategy:
//!
//! | resolver answer                    | meaning                          |
//! |------------------------------------|----------------------------------|
//! | error                              | not yet (fail-fast: propagate)   |
//! | handles, one of them `exists()`    | first existing one resolves      |
//! | handles, none there yet            | not yet                          |
//! | empty set                          | strategy finished as `Empty`     |
//!
//! An empty set is a definitive answer for that strategy and the chain moves
//! on at once; a transport error is only a failed tick.

use crate::driver::{DriverResult, ElementHandle, Resolver};
use crate::locator::LocatorStrategy;
use crate::result::{AguardarError, AguardarResult};
use crate::wait::{Poller, WaitPolicy, Waited};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How the chain's timeout is spread over its strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// The policy timeout is the budget of the whole chain; each strategy
    /// gets the remaining budget divided by the strategies still untried
    #[default]
    Shared,
    /// Every strategy gets the full policy timeout
    FullPerStrategy,
}

/// Terminal state of one strategy inside a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Element found and existing
    Resolved,
    /// The resolver matched zero elements
    Empty,
    /// The strategy's budget ran out
    Exhausted,
    /// Element found, but the follow-up action raised
    ActionFailed,
}

impl AttemptStatus {
    /// Short lowercase label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Resolved => "resolved",
            Self::Empty => "empty",
            Self::Exhausted => "exhausted",
            Self::ActionFailed => "action failed",
        }
    }
}

/// Record of one strategy's attempt within a single `resolve` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionAttempt {
    /// Strategy tried
    pub strategy: LocatorStrategy,
    /// Offset from the start of the chain
    pub started_at: Duration,
    /// Time spent on this strategy
    pub elapsed: Duration,
    /// How the attempt ended
    pub status: AttemptStatus,
    /// Failure reason, if any
    pub error: Option<String>,
}

impl ResolutionAttempt {
    /// Create an attempt record
    #[must_use]
    pub fn new(
        strategy: LocatorStrategy,
        started_at: Duration,
        elapsed: Duration,
        status: AttemptStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            strategy,
            started_at,
            elapsed,
            status,
            error,
        }
    }

    /// Whether this attempt resolved the element
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status == AttemptStatus::Resolved
    }
}

impl fmt::Display for ResolutionAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} after {}ms",
            self.strategy,
            self.status.as_str(),
            self.elapsed.as_millis()
        )?;
        if let Some(ref error) = self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// A successfully resolved element
#[derive(Debug)]
pub struct Resolved<H> {
    /// Live handle
    pub handle: H,
    /// Strategy that found it
    pub strategy: LocatorStrategy,
    /// Every attempt made, the last one being the resolving attempt
    pub attempts: Vec<ResolutionAttempt>,
    /// Total time spent in the chain
    pub elapsed: Duration,
    /// Text read by a [`ElementAction::ReadText`] action
    pub text: Option<String>,
}

/// Action run on a resolved element before the chain declares success
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    /// Tap / click
    Click,
    /// Replace the value
    SetValue(String),
    /// Read visible text
    ReadText,
}

impl ElementAction {
    async fn perform<H: ElementHandle>(&self, handle: &H) -> DriverResult<Option<String>> {
        match self {
            Self::Click => handle.click().await.map(|()| None),
            Self::SetValue(value) => handle.set_value(value).await.map(|()| None),
            Self::ReadText => handle.read_text().await.map(Some),
        }
    }
}

impl fmt::Display for ElementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => f.write_str("click"),
            Self::SetValue(_) => f.write_str("set_value"),
            Self::ReadText => f.write_str("read_text"),
        }
    }
}

enum Probe<H> {
    Found(H),
    Empty,
}

/// The fallback chain evaluator
#[derive(Debug, Clone, Default)]
pub struct FallbackChain {
    policy: WaitPolicy,
    budget: BudgetMode,
    cancel: Option<CancellationToken>,
}

impl FallbackChain {
    /// Create a chain using the shared budget mode
    #[must_use]
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            policy,
            budget: BudgetMode::default(),
            cancel: None,
        }
    }

    /// Choose how the timeout is spread over strategies
    #[must_use]
    pub const fn with_budget(mut self, budget: BudgetMode) -> Self {
        self.budget = budget;
        self
    }

    /// Observe a cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Policy of the chain
    #[must_use]
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Budget mode of the chain
    #[must_use]
    pub const fn budget(&self) -> BudgetMode {
        self.budget
    }

    /// Resolve the first strategy that finds an existing element
    pub async fn resolve<R: Resolver>(
        &self,
        resolver: &R,
        strategies: &[LocatorStrategy],
    ) -> AguardarResult<Resolved<R::Handle>> {
        self.run(resolver, strategies, None).await
    }

    /// Resolve and run `action` on the element.
    ///
    /// When the action raises, the attempt is recorded as
    /// [`AttemptStatus::ActionFailed`] and the chain continues with the next
    /// strategy.
    pub async fn resolve_and<R: Resolver>(
        &self,
        resolver: &R,
        strategies: &[LocatorStrategy],
        action: &ElementAction,
    ) -> AguardarResult<Resolved<R::Handle>> {
        self.run(resolver, strategies, Some(action)).await
    }

    async fn run<R: Resolver>(
        &self,
        resolver: &R,
        strategies: &[LocatorStrategy],
        action: Option<&ElementAction>,
    ) -> AguardarResult<Resolved<R::Handle>> {
        if strategies.is_empty() {
            return Err(AguardarError::configuration(
                "fallback chain needs at least one strategy",
            ));
        }

        let start = Instant::now();
        let mut attempts = Vec::with_capacity(strategies.len());

        for (index, strategy) in strategies.iter().enumerate() {
            let Some(policy) = self.policy_for(start.elapsed(), strategies.len() - index) else {
                debug!(
                    strategy = %strategy,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "shared budget spent, remaining strategies skipped"
                );
                break;
            };

            let started_at = start.elapsed();
            let description = strategy.to_string();
            debug!(strategy = %strategy, timeout_ms = policy.timeout_ms(), "trying strategy");

            let polled = Poller::new(policy)
                .with_optional_cancellation(self.cancel.clone())
                .poll(&description, || probe(resolver, strategy))
                .await;

            let record = |status, error| {
                ResolutionAttempt::new(
                    strategy.clone(),
                    started_at,
                    start.elapsed().saturating_sub(started_at),
                    status,
                    error,
                )
            };

            match polled {
                Ok(Waited {
                    value: Probe::Found(handle),
                    ..
                }) => {
                    let text = match action {
                        None => None,
                        Some(action) => match action.perform(&handle).await {
                            Ok(text) => text,
                            Err(err) if policy.is_fail_fast() => {
                                warn!(strategy = %strategy, %action, error = %err, "action failed");
                                return Err(AguardarError::Transport(err));
                            }
                            Err(err) => {
                                warn!(
                                    strategy = %strategy,
                                    %action,
                                    error = %err,
                                    "action failed, trying next strategy"
                                );
                                let reason = Some(err.to_string());
                                attempts.push(record(AttemptStatus::ActionFailed, reason));
                                continue;
                            }
                        },
                    };
                    attempts.push(record(AttemptStatus::Resolved, None));
                    let elapsed = start.elapsed();
                    info!(
                        strategy = %strategy,
                        elapsed_ms = elapsed.as_millis() as u64,
                        attempted = attempts.len(),
                        "element resolved"
                    );
                    return Ok(Resolved {
                        handle,
                        strategy: strategy.clone(),
                        attempts,
                        elapsed,
                        text,
                    });
                }
                Ok(Waited {
                    value: Probe::Empty, ..
                }) => {
                    debug!(strategy = %strategy, "strategy matched no elements");
                    attempts.push(record(AttemptStatus::Empty, None));
                }
                Err(AguardarError::Timeout { last_error, .. }) => {
                    debug!(strategy = %strategy, "strategy budget exhausted");
                    attempts.push(record(AttemptStatus::Exhausted, last_error));
                }
                Err(other) => return Err(other),
            }
        }

        warn!(
            attempted = attempts.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "fallback chain exhausted"
        );
        Err(AguardarError::NotFound { attempts })
    }

    /// Wait policy for the next strategy, `None` once the shared budget is spent
    fn policy_for(&self, spent: Duration, strategies_left: usize) -> Option<WaitPolicy> {
        match self.budget {
            BudgetMode::FullPerStrategy => Some(self.policy),
            BudgetMode::Shared => {
                let remaining = self.policy.timeout().saturating_sub(spent);
                let left = u32::try_from(strategies_left.max(1)).unwrap_or(u32::MAX);
                self.policy.with_budget(remaining / left)
            }
        }
    }
}

async fn probe<R: Resolver>(
    resolver: &R,
    strategy: &LocatorStrategy,
) -> DriverResult<Option<Probe<R::Handle>>> {
    let handles = resolver.find(strategy).await?;
    if handles.is_empty() {
        return Ok(Some(Probe::Empty));
    }
    for handle in handles {
        if handle.exists().await? {
            return Ok(Some(Probe::Found(handle)));
        }
    }
    Ok(None)
}
