//! Outcome classification.
//!
//! After an action such as submitting a login form, exactly one of several
//! mutually exclusive UI states is expected to appear. The [`Classifier`]
//! polls a set of named [`Condition`]s and reports which one occurred.
//!
//! All conditions are evaluated on every tick, in declaration order. When
//! more than one holds on the same tick, [`Precedence`] decides; without a
//! decisive precedence the result is [`Outcome::Ambiguous`], never a silent
//! pick.

use crate::driver::{DriverResult, ElementHandle, Resolver};
use crate::locator::LocatorStrategy;
use crate::result::{AguardarError, AguardarResult};
use crate::wait::{Poller, WaitPolicy, Waited};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// What must hold for a condition to be true
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    /// An element matching the strategy exists
    #[default]
    Present,
    /// An element matching the strategy exists and is displayed
    Visible,
    /// No element matching the strategy exists
    Absent,
}

/// How a condition's outcome is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The scenario succeeded
    Success,
    /// A failure the scenario anticipates (e.g. "invalid credentials")
    ExpectedFailure,
}

/// A named UI state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Unique name within one classification
    pub name: String,
    /// Element the condition is about
    pub strategy: LocatorStrategy,
    /// What must hold
    #[serde(default)]
    pub requirement: Requirement,
    /// Interpretation when this condition wins
    pub expectation: Expectation,
}

impl Condition {
    /// Success condition requiring presence
    #[must_use]
    pub fn success(name: impl Into<String>, strategy: LocatorStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            requirement: Requirement::Present,
            expectation: Expectation::Success,
        }
    }

    /// Expected-failure condition requiring presence
    #[must_use]
    pub fn expected_failure(name: impl Into<String>, strategy: LocatorStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            requirement: Requirement::Present,
            expectation: Expectation::ExpectedFailure,
        }
    }

    /// Require the element to be displayed
    #[must_use]
    pub fn visible(mut self) -> Self {
        self.requirement = Requirement::Visible;
        self
    }

    /// Require the element to be gone
    #[must_use]
    pub fn absent(mut self) -> Self {
        self.requirement = Requirement::Absent;
        self
    }

    /// Require the element to exist
    #[must_use]
    pub fn present(mut self) -> Self {
        self.requirement = Requirement::Present;
        self
    }
}

/// Why a condition won
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    /// Name of the winning condition
    pub condition: String,
    /// Text of the matched element, when one was read
    pub text: Option<String>,
}

/// Result of a classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// A success condition held
    Success(Evidence),
    /// An expected-failure condition held
    ExpectedFailure(Evidence),
    /// Several conditions held on the same tick and none outranked the others
    Ambiguous {
        /// Tied condition names, in declaration order
        conditions: Vec<String>,
    },
    /// No condition held before the deadline
    Timeout {
        /// Names of the polled conditions, in declaration order
        conditions: Vec<String>,
        /// Time spent
        elapsed: Duration,
        /// Number of ticks evaluated
        attempts: usize,
    },
}

impl Outcome {
    /// Whether a condition was decisively identified
    #[must_use]
    pub const fn is_decided(&self) -> bool {
        matches!(self, Self::Success(_) | Self::ExpectedFailure(_))
    }

    /// Evidence of the winning condition
    #[must_use]
    pub const fn evidence(&self) -> Option<&Evidence> {
        match self {
            Self::Success(evidence) | Self::ExpectedFailure(evidence) => Some(evidence),
            Self::Ambiguous { .. } | Self::Timeout { .. } => None,
        }
    }

    /// Short lowercase label
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ExpectedFailure(_) => "expected_failure",
            Self::Ambiguous { .. } => "ambiguous",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// Turn undecided outcomes into errors
    ///
    /// # Errors
    ///
    /// [`AguardarError::Ambiguous`] and [`AguardarError::Timeout`].
    pub fn into_result(self) -> AguardarResult<Self> {
        match self {
            Self::Ambiguous { conditions } => Err(AguardarError::Ambiguous { conditions }),
            Self::Timeout {
                conditions,
                elapsed,
                attempts,
            } => Err(AguardarError::Timeout {
                description: conditions.join(" | "),
                elapsed,
                attempts,
                last_error: None,
            }),
            decided => Ok(decided),
        }
    }
}

/// Ordered list of condition names; earlier names outrank later ones
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Precedence(Vec<String>);

impl Precedence {
    /// Create a precedence from highest to lowest
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// Rank of a condition; unlisted names rank after every listed one
    #[must_use]
    pub fn rank(&self, name: &str) -> usize {
        self.0
            .iter()
            .position(|n| n == name)
            .unwrap_or(usize::MAX)
    }

    /// Names in order
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

enum Decision {
    Winner { index: usize, text: Option<String> },
    Tied(Vec<String>),
}

/// Polls outcome conditions until one wins
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    policy: WaitPolicy,
    precedence: Precedence,
    cancel: Option<CancellationToken>,
}

impl Classifier {
    /// Create a classifier without precedence
    #[must_use]
    pub fn new(policy: WaitPolicy) -> Self {
        Self {
            policy,
            precedence: Precedence::default(),
            cancel: None,
        }
    }

    /// Set the tie-break order
    #[must_use]
    pub fn with_precedence(mut self, precedence: Precedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Observe a cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Policy of the classifier
    #[must_use]
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    /// Classify which condition occurs first
    ///
    /// # Errors
    ///
    /// Configuration errors for an empty or duplicated condition set or a
    /// precedence naming an unknown condition; `Cancelled`, and `Transport`
    /// under a fail-fast policy. Timeouts and ties are reported as
    /// [`Outcome`] values, not errors.
    pub async fn classify<R: Resolver>(
        &self,
        resolver: &R,
        conditions: &[Condition],
    ) -> AguardarResult<Outcome> {
        self.validate(conditions)?;

        let names: Vec<String> = conditions.iter().map(|c| c.name.clone()).collect();
        let description = names.join(" | ");

        let polled = Poller::new(self.policy)
            .with_optional_cancellation(self.cancel.clone())
            .poll(&description, || self.tick(resolver, conditions))
            .await;

        match polled {
            Ok(Waited {
                value: Decision::Winner { index, text },
                elapsed,
                attempts,
            }) => {
                let condition = &conditions[index];
                info!(
                    condition = %condition.name,
                    expectation = ?condition.expectation,
                    elapsed_ms = elapsed.as_millis() as u64,
                    attempts,
                    "outcome classified"
                );
                let evidence = Evidence {
                    condition: condition.name.clone(),
                    text,
                };
                Ok(match condition.expectation {
                    Expectation::Success => Outcome::Success(evidence),
                    Expectation::ExpectedFailure => Outcome::ExpectedFailure(evidence),
                })
            }
            Ok(Waited {
                value: Decision::Tied(conditions),
                ..
            }) => {
                info!(?conditions, "outcome ambiguous");
                Ok(Outcome::Ambiguous { conditions })
            }
            Err(AguardarError::Timeout {
                elapsed, attempts, ..
            }) => {
                info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    attempts,
                    "no outcome condition held"
                );
                Ok(Outcome::Timeout {
                    conditions: names,
                    elapsed,
                    attempts,
                })
            }
            Err(other) => Err(other),
        }
    }

    fn validate(&self, conditions: &[Condition]) -> AguardarResult<()> {
        if conditions.is_empty() {
            return Err(AguardarError::configuration(
                "classification needs at least one condition",
            ));
        }
        let mut seen = HashSet::new();
        for condition in conditions {
            if !seen.insert(condition.name.as_str()) {
                return Err(AguardarError::configuration(format!(
                    "duplicate condition name {:?}",
                    condition.name
                )));
            }
        }
        if let Some(unknown) = self
            .precedence
            .names()
            .iter()
            .find(|name| !seen.contains(name.as_str()))
        {
            return Err(AguardarError::configuration(format!(
                "precedence names unknown condition {unknown:?}"
            )));
        }
        Ok(())
    }

    /// Evaluate every condition once and decide
    async fn tick<R: Resolver>(
        &self,
        resolver: &R,
        conditions: &[Condition],
    ) -> DriverResult<Option<Decision>> {
        let mut held: Vec<(usize, Option<R::Handle>)> = Vec::new();

        for (index, condition) in conditions.iter().enumerate() {
            match evaluate(resolver, condition).await {
                Ok(Some(handle)) => held.push((index, handle)),
                Ok(None) => {}
                Err(err) if self.policy.is_fail_fast() => return Err(err),
                Err(err) => {
                    debug!(
                        condition = %condition.name,
                        error = %err,
                        "condition evaluation failed, counted as false"
                    );
                }
            }
        }

        let Some(top) = held
            .iter()
            .map(|(index, _)| self.precedence.rank(&conditions[*index].name))
            .min()
        else {
            return Ok(None);
        };

        let mut leaders: Vec<(usize, Option<R::Handle>)> = held
            .into_iter()
            .filter(|(index, _)| self.precedence.rank(&conditions[*index].name) == top)
            .collect();

        if leaders.len() > 1 {
            let names = leaders
                .iter()
                .map(|(index, _)| conditions[*index].name.clone())
                .collect();
            return Ok(Some(Decision::Tied(names)));
        }

        let Some((index, handle)) = leaders.pop() else {
            return Ok(None);
        };
        let text = match handle {
            Some(handle) => handle.read_text().await.ok(),
            None => None,
        };
        Ok(Some(Decision::Winner { index, text }))
    }
}

/// `Some(handle)` when the condition holds; the handle is absent for
/// [`Requirement::Absent`].
///
/// Every handle `find` returns is considered: `Present` and `Visible` pick
/// the first handle that qualifies, `Absent` holds when none exists.
async fn evaluate<R: Resolver>(
    resolver: &R,
    condition: &Condition,
) -> DriverResult<Option<Option<R::Handle>>> {
    let handles = resolver.find(&condition.strategy).await?;
    match condition.requirement {
        Requirement::Absent => {
            for handle in &handles {
                if handle.exists().await? {
                    return Ok(None);
                }
            }
            Ok(Some(None))
        }
        Requirement::Present => {
            for handle in handles {
                if handle.exists().await? {
                    return Ok(Some(Some(handle)));
                }
            }
            Ok(None)
        }
        Requirement::Visible => {
            for handle in handles {
                if handle.exists().await? && handle.is_visible().await? {
                    return Ok(Some(Some(handle)));
                }
            }
            Ok(None)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptedElement, ScriptedUi};

    fn login_conditions() -> Vec<Condition> {
        vec![
            Condition::success("logged in", LocatorStrategy::text_contains("You are logged in!")),
            Condition::expected_failure(
                "invalid credentials",
                LocatorStrategy::text_contains("Invalid credentials"),
            ),
        ]
    }

    fn classifier() -> Classifier {
        Classifier::new(WaitPolicy::new(7000, 500).unwrap())
    }

    mod validation_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_empty_conditions_rejected() {
            let err = classifier().classify(&ScriptedUi::new(), &[]).await.unwrap_err();
            assert!(matches!(err, AguardarError::Configuration { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_duplicate_names_rejected() {
            let mut conditions = login_conditions();
            conditions[1].name = "logged in".into();
            let err = classifier()
                .classify(&ScriptedUi::new(), &conditions)
                .await
                .unwrap_err();
            assert!(err.to_string().contains("duplicate"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_unknown_precedence_name_rejected() {
            let err = classifier()
                .with_precedence(Precedence::new(["logged out"]))
                .classify(&ScriptedUi::new(), &login_conditions())
                .await
                .unwrap_err();
            assert!(matches!(err, AguardarError::Configuration { .. }));
        }

        #[test]
        fn test_precedence_rank() {
            let p = Precedence::new(["b", "a"]);
            assert_eq!(p.rank("b"), 0);
            assert_eq!(p.rank("a"), 1);
            assert_eq!(p.rank("c"), usize::MAX);
        }
    }

    mod classify_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_success_with_evidence_text() {
            let ui = ScriptedUi::with_elements([ScriptedElement::new("alert")
                .text("You are logged in!")
                .appears_at(1200)]);
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert_eq!(
                outcome,
                Outcome::Success(Evidence {
                    condition: "logged in".into(),
                    text: Some("You are logged in!".into()),
                })
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_expected_failure() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("error").text("Invalid credentials, please retry")
            ]);
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert!(matches!(
                outcome,
                Outcome::ExpectedFailure(ref e) if e.condition == "invalid credentials"
            ));
            assert!(outcome.is_decided());
        }

        #[tokio::test(start_paused = true)]
        async fn test_simultaneous_conditions_without_precedence_are_ambiguous() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("ok").text("You are logged in!"),
                ScriptedElement::new("err").text("Invalid credentials"),
            ]);
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert_eq!(
                outcome,
                Outcome::Ambiguous {
                    conditions: vec!["logged in".into(), "invalid credentials".into()]
                }
            );
            assert!(matches!(
                outcome.into_result(),
                Err(AguardarError::Ambiguous { .. })
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn test_precedence_breaks_tie() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("ok").text("You are logged in!"),
                ScriptedElement::new("err").text("Invalid credentials"),
            ]);
            let outcome = classifier()
                .with_precedence(Precedence::new(["logged in", "invalid credentials"]))
                .classify(&ui, &login_conditions())
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::Success(_)));
        }

        #[tokio::test(start_paused = true)]
        async fn test_listed_condition_outranks_unlisted() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("ok").text("You are logged in!"),
                ScriptedElement::new("err").text("Invalid credentials"),
            ]);
            let outcome = classifier()
                .with_precedence(Precedence::new(["invalid credentials"]))
                .classify(&ui, &login_conditions())
                .await
                .unwrap();
            assert!(matches!(outcome, Outcome::ExpectedFailure(_)));
        }

        #[tokio::test(start_paused = true)]
        async fn test_first_condition_to_hold_wins() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("ok").text("You are logged in!").appears_at(2000),
                ScriptedElement::new("err").text("Invalid credentials").appears_at(1000),
            ]);
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert!(matches!(outcome, Outcome::ExpectedFailure(_)));
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_when_nothing_holds() {
            let ui = ScriptedUi::new();
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert_eq!(
                outcome,
                Outcome::Timeout {
                    conditions: vec!["logged in".into(), "invalid credentials".into()],
                    elapsed: Duration::from_millis(7000),
                    attempts: 14,
                }
            );
            let err = outcome.into_result().unwrap_err();
            assert!(err.triggers_diagnostics());
            assert!(err.to_string().contains("logged in | invalid credentials"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_absent_and_visible_requirements() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("spinner")
                    .locator(LocatorStrategy::native_id("spinner"))
                    .disappears_at(1500),
                ScriptedElement::new("toast")
                    .locator(LocatorStrategy::native_id("toast"))
                    .hidden(),
            ]);
            let conditions = vec![
                Condition::success("toast shown", LocatorStrategy::native_id("toast")).visible(),
                Condition::success("spinner gone", LocatorStrategy::native_id("spinner")).absent(),
            ];
            let start = tokio::time::Instant::now();
            let outcome = classifier().classify(&ui, &conditions).await.unwrap();
            let evidence = outcome.evidence().unwrap();
            assert_eq!(evidence.condition, "spinner gone");
            assert_eq!(evidence.text, None);
            assert_eq!(start.elapsed(), Duration::from_millis(1500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_transport_error_makes_condition_false_for_tick() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("ok").text("You are logged in!")
            ]);
            ui.fail_next_finds(LocatorStrategy::text_contains("You are logged in!"), 1);
            let start = tokio::time::Instant::now();
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert!(matches!(outcome, Outcome::Success(_)));
            assert_eq!(start.elapsed(), Duration::from_millis(500));
        }

        #[tokio::test(start_paused = true)]
        async fn test_fail_fast_transport_error_propagates() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("ok").text("You are logged in!")
            ]);
            ui.fail_next_finds(LocatorStrategy::text_contains("Invalid credentials"), 1);
            let start = tokio::time::Instant::now();
            let err = Classifier::new(WaitPolicy::new(7000, 500).unwrap().fail_fast(true))
                .classify(&ui, &login_conditions())
                .await
                .unwrap_err();
            assert!(matches!(err, AguardarError::Transport(_)));
            assert_eq!(start.elapsed(), Duration::ZERO);
            assert_eq!(ui.call_count("find:"), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_any_matching_handle_satisfies_condition() {
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("stale-banner")
                    .text("You are logged in!")
                    .appears_at(60_000),
                ScriptedElement::new("banner").text("You are logged in! Welcome"),
            ]);
            let outcome = classifier().classify(&ui, &login_conditions()).await.unwrap();
            assert_eq!(
                outcome.evidence().unwrap().text.as_deref(),
                Some("You are logged in! Welcome")
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_absent_requires_every_handle_gone() {
            let spinner = LocatorStrategy::native_id("spinner");
            let ui = ScriptedUi::with_elements([
                ScriptedElement::new("spinner-a")
                    .locator(spinner.clone())
                    .appears_at(60_000),
                ScriptedElement::new("spinner-b")
                    .locator(spinner.clone())
                    .disappears_at(1000),
            ]);
            let conditions = vec![Condition::success("spinners gone", spinner).absent()];
            let start = tokio::time::Instant::now();
            let outcome = classifier().classify(&ui, &conditions).await.unwrap();
            assert!(matches!(outcome, Outcome::Success(_)));
            assert_eq!(start.elapsed(), Duration::from_millis(1000));
        }

        #[test]
        fn test_condition_serde() {
            let yaml = "name: logged in\n\
                        strategy: { kind: text_contains, expression: logged in }\n\
                        expectation: success\n";
            let condition: Condition = serde_yaml_ng::from_str(yaml).unwrap();
            assert_eq!(condition.requirement, Requirement::Present);
            assert_eq!(condition.expectation, Expectation::Success);
        }
    }
}
