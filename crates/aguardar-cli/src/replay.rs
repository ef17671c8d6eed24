//! Timeline replay.
//!
//! A timeline describes a scripted UI (elements, when they appear, which
//! lookups fail) and a list of steps to run against it through an
//! [`aguardar::Session`]. Replays run in real time, so timelines meant for
//! quick dry runs should pair with a short-policy engine config.
//!
//! ```yaml
//! name: login
//! elements:
//!   - id: alert
//!     text: You are logged in!
//!     appears_at_ms: 1200
//! steps:
//!   - action: classify
//!     name: result
//!     conditions:
//!       - name: logged in
//!         strategy: { kind: text_contains, expression: logged in }
//!         expectation: success
//! ```

use crate::error::{CliError, CliResult};
use aguardar::{
    AguardarError, Condition, DiagnosticsTarget, EngineConfig, Expectation, FsDiagnosticSink,
    LocatorStrategy, Outcome, Precedence, ScriptedElement, ScriptedUi, Session, Swipe,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::info;

/// Transport failures injected for one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindFailure {
    /// Strategy whose lookups fail
    pub strategy: LocatorStrategy,
    /// Number of failing lookups
    pub count: usize,
}

/// One replay step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Resolve an element
    Resolve {
        /// Step name
        name: String,
        /// Fallback chain
        strategies: Vec<LocatorStrategy>,
    },
    /// Resolve and click
    Click {
        /// Step name
        name: String,
        /// Fallback chain
        strategies: Vec<LocatorStrategy>,
    },
    /// Resolve and set a value
    SetValue {
        /// Step name
        name: String,
        /// Fallback chain
        strategies: Vec<LocatorStrategy>,
        /// New value
        value: String,
    },
    /// Resolve and read text, optionally checking it
    ReadText {
        /// Step name
        name: String,
        /// Fallback chain
        strategies: Vec<LocatorStrategy>,
        /// Expected text
        #[serde(default)]
        expect: Option<String>,
    },
    /// Classify the outcome, optionally checking its expectation
    Classify {
        /// Step name
        name: String,
        /// Candidate conditions
        conditions: Vec<Condition>,
        /// Tie-break order
        #[serde(default)]
        precedence: Option<Precedence>,
        /// Expected interpretation of the winner
        #[serde(default)]
        expect: Option<Expectation>,
    },
    /// Swipe, then resolve what it revealed when strategies are given
    Swipe {
        /// Step name
        name: String,
        /// Gesture
        swipe: Swipe,
        /// Fallback chain to resolve afterwards
        #[serde(default)]
        strategies: Vec<LocatorStrategy>,
    },
}

impl Step {
    /// Step name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Resolve { name, .. }
            | Self::Click { name, .. }
            | Self::SetValue { name, .. }
            | Self::ReadText { name, .. }
            | Self::Classify { name, .. }
            | Self::Swipe { name, .. } => name,
        }
    }

    /// Action keyword
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Resolve { .. } => "resolve",
            Self::Click { .. } => "click",
            Self::SetValue { .. } => "set_value",
            Self::ReadText { .. } => "read_text",
            Self::Classify { .. } => "classify",
            Self::Swipe { .. } => "swipe",
        }
    }
}

/// A scripted scene and the steps to replay against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timeline {
    /// Scenario name, used in diagnostic labels
    pub name: String,
    /// Elements of the scripted UI
    #[serde(default)]
    pub elements: Vec<ScriptedElement>,
    /// Injected lookup failures
    #[serde(default)]
    pub find_failures: Vec<FindFailure>,
    /// Steps in order
    pub steps: Vec<Step>,
}

impl Timeline {
    /// Parse a timeline from YAML
    pub fn from_yaml(yaml: &str) -> CliResult<Self> {
        let timeline: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| CliError::timeline(e.to_string()))?;
        timeline.validate()?;
        Ok(timeline)
    }

    /// Load a timeline file
    pub async fn load(path: &std::path::Path) -> CliResult<Self> {
        let yaml = tokio::fs::read_to_string(path).await?;
        Self::from_yaml(&yaml)
    }

    fn validate(&self) -> CliResult<()> {
        if self.name.trim().is_empty() {
            return Err(CliError::timeline("name must not be empty"));
        }
        if self.steps.is_empty() {
            return Err(CliError::timeline("at least one step is required"));
        }
        let mut ids = std::collections::HashSet::new();
        for element in &self.elements {
            if !ids.insert(element.id.as_str()) {
                return Err(CliError::timeline(format!(
                    "duplicate element id {:?}",
                    element.id
                )));
            }
        }
        Ok(())
    }
}

/// Final state of a replayed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Step succeeded
    Passed,
    /// Step failed
    Failed,
    /// Not run because an earlier step failed
    Skipped,
}

/// Report line for one step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Step name
    pub name: String,
    /// Action keyword
    pub action: &'static str,
    /// Final state
    pub outcome: StepOutcome,
    /// What happened
    pub detail: String,
    /// Time spent in milliseconds
    pub elapsed_ms: u64,
    /// Structural snapshot path, when a capture was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// Report of one replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Timeline name
    pub timeline: String,
    /// Step reports, in order
    pub steps: Vec<StepReport>,
}

impl ReplayReport {
    /// Number of steps in a given state
    #[must_use]
    pub fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }

    /// Whether every step passed
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.count(StepOutcome::Passed) == self.steps.len()
    }
}

/// Replay `timeline` with `config`; stops at the first failing step
pub async fn replay(timeline: &Timeline, config: EngineConfig) -> ReplayReport {
    let ui = ScriptedUi::with_elements(timeline.elements.iter().cloned());
    for failure in &timeline.find_failures {
        ui.fail_next_finds(failure.strategy.clone(), failure.count);
    }

    let sink = FsDiagnosticSink::new(config.diagnostics_dir.clone());
    let mut session = Session::new(timeline.name.clone(), ui.clone())
        .with_config(config)
        .with_diagnostics(DiagnosticsTarget::new(
            Arc::new(ui.clone()),
            Arc::new(sink.clone()),
        ));

    let mut steps = Vec::with_capacity(timeline.steps.len());
    let mut failed = false;

    for step in &timeline.steps {
        if failed {
            steps.push(StepReport {
                name: step.name().to_string(),
                action: step.action(),
                outcome: StepOutcome::Skipped,
                detail: "skipped after earlier failure".to_string(),
                elapsed_ms: 0,
                diagnostics: None,
            });
            continue;
        }

        let captures_before = session.captures().len();
        let start = Instant::now();
        let result = run_step(&mut session, &ui, step).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let diagnostics = session
            .captures()
            .get(captures_before)
            .map(|report| sink.path_for(&report.label, "xml").display().to_string());

        let (outcome, detail) = match result {
            Ok(detail) => (StepOutcome::Passed, detail),
            Err(detail) => {
                failed = true;
                (StepOutcome::Failed, detail)
            }
        };
        info!(step = step.name(), action = step.action(), ?outcome, elapsed_ms, "step replayed");
        steps.push(StepReport {
            name: step.name().to_string(),
            action: step.action(),
            outcome,
            detail,
            elapsed_ms,
            diagnostics,
        });
    }

    ReplayReport {
        timeline: timeline.name.clone(),
        steps,
    }
}

async fn run_step(
    session: &mut Session<ScriptedUi>,
    ui: &ScriptedUi,
    step: &Step,
) -> Result<String, String> {
    let name = step.name();
    match step {
        Step::Resolve { strategies, .. } => session
            .resolve(name, strategies)
            .await
            .map(|r| format!("resolved via {}", r.strategy))
            .map_err(describe),
        Step::Click { strategies, .. } => session
            .click(name, strategies)
            .await
            .map(|r| format!("clicked {} via {}", r.handle.id(), r.strategy))
            .map_err(describe),
        Step::SetValue {
            strategies, value, ..
        } => session
            .set_value(name, strategies, value)
            .await
            .map(|r| format!("set {} via {}", r.handle.id(), r.strategy))
            .map_err(describe),
        Step::ReadText {
            strategies, expect, ..
        } => {
            let text = session.read_text(name, strategies).await.map_err(describe)?;
            match expect {
                Some(expected) if *expected != text => {
                    Err(format!("expected text {expected:?}, read {text:?}"))
                }
                _ => Ok(format!("read {text:?}")),
            }
        }
        Step::Classify {
            conditions,
            precedence,
            expect,
            ..
        } => {
            let outcome = session
                .classify(name, conditions, precedence.clone())
                .await
                .map_err(describe)?;
            let detail = describe_outcome(&outcome);
            let matches = match (expect, &outcome) {
                (None, _)
                | (Some(Expectation::Success), Outcome::Success(_))
                | (Some(Expectation::ExpectedFailure), Outcome::ExpectedFailure(_)) => true,
                _ => false,
            };
            if matches {
                Ok(detail)
            } else {
                Err(format!("{detail}, expected {expect:?}"))
            }
        }
        Step::Swipe {
            swipe, strategies, ..
        } => {
            if strategies.is_empty() {
                swipe.perform(ui).await.map_err(describe)?;
                Ok(format!("swiped {} x{}", swipe.direction, swipe.repeat))
            } else {
                session
                    .swipe_then_resolve(name, ui, swipe, strategies)
                    .await
                    .map(|r| format!("swiped {}, resolved via {}", swipe.direction, r.strategy))
                    .map_err(describe)
            }
        }
    }
}

fn describe(err: AguardarError) -> String {
    err.to_string()
}

fn describe_outcome(outcome: &Outcome) -> String {
    match outcome.evidence() {
        Some(evidence) => match evidence.text {
            Some(ref text) => format!("{} ({}: {text:?})", outcome.kind(), evidence.condition),
            None => format!("{} ({})", outcome.kind(), evidence.condition),
        },
        None => outcome.kind().to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use aguardar::WaitPolicy;

    const LOGIN: &str = r"
name: login
elements:
  - id: email
    locators: [{ kind: accessibility_id, expression: input-email }]
  - id: alert
    text: You are logged in!
    appears_at_ms: 300
  - id: ok
    text: OK
    appears_at_ms: 300
steps:
  - action: set_value
    name: email
    strategies: [{ kind: accessibility_id, expression: input-email }]
    value: test@webdriver.io
  - action: classify
    name: result
    expect: success
    conditions:
      - name: logged in
        strategy: { kind: text_contains, expression: logged in }
        expectation: success
      - name: invalid credentials
        strategy: { kind: text_contains, expression: Invalid credentials }
        expectation: expected_failure
  - action: click
    name: dismiss
    strategies:
      - { kind: accessibility_id, expression: OK }
      - { kind: text, expression: OK }
";

    fn fast_config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig {
            wait: WaitPolicy::new(1000, 100).unwrap(),
            classify_wait: WaitPolicy::new(1000, 100).unwrap(),
            diagnostics_dir: dir.to_path_buf(),
            ..EngineConfig::default()
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_login_timeline() {
            let timeline = Timeline::from_yaml(LOGIN).unwrap();
            assert_eq!(timeline.elements.len(), 3);
            assert_eq!(timeline.steps.len(), 3);
            assert_eq!(timeline.steps[1].action(), "classify");
            assert_eq!(timeline.steps[2].name(), "dismiss");
        }

        #[test]
        fn test_empty_steps_rejected() {
            let err = Timeline::from_yaml("name: x\nsteps: []\n").unwrap_err();
            assert!(err.to_string().contains("at least one step"));
        }

        #[test]
        fn test_duplicate_element_ids_rejected() {
            let yaml = "name: x\n\
                        elements: [{ id: a }, { id: a }]\n\
                        steps: [{ action: resolve, name: s, strategies: [] }]\n";
            assert!(Timeline::from_yaml(yaml).is_err());
        }

        #[test]
        fn test_unknown_action_rejected() {
            let yaml = "name: x\nsteps:\n  - { action: hover, name: s }\n";
            assert!(matches!(
                Timeline::from_yaml(yaml),
                Err(CliError::Timeline { .. })
            ));
        }
    }

    mod replay_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_login_replay_passes() {
            let dir = tempfile::tempdir().unwrap();
            let timeline = Timeline::from_yaml(LOGIN).unwrap();
            let report = replay(&timeline, fast_config(dir.path())).await;
            assert!(report.is_success(), "{report:?}");
            assert!(report.steps[1].detail.starts_with("success (logged in"));
            assert!(report.steps.iter().all(|s| s.diagnostics.is_none()));
        }

        #[tokio::test(start_paused = true)]
        async fn test_failure_captures_and_skips_rest() {
            let dir = tempfile::tempdir().unwrap();
            let yaml = LOGIN.replace(
                "appears_at_ms: 300\n  - id: ok",
                "appears_at_ms: 99000\n  - id: ok",
            );
            let timeline = Timeline::from_yaml(&yaml).unwrap();
            let report = replay(&timeline, fast_config(dir.path())).await;

            assert_eq!(report.steps[0].outcome, StepOutcome::Passed);
            assert_eq!(report.steps[1].outcome, StepOutcome::Failed);
            assert_eq!(report.steps[2].outcome, StepOutcome::Skipped);
            assert_eq!(report.count(StepOutcome::Failed), 1);

            let xml = report.steps[1].diagnostics.as_ref().unwrap();
            assert!(std::path::Path::new(xml).exists());
            assert!(xml.contains("login-result-"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_classify_expectation_mismatch_fails_without_capture() {
            let dir = tempfile::tempdir().unwrap();
            let yaml = LOGIN.replace("expect: success", "expect: expected_failure");
            let timeline = Timeline::from_yaml(&yaml).unwrap();
            let report = replay(&timeline, fast_config(dir.path())).await;
            assert_eq!(report.steps[1].outcome, StepOutcome::Failed);
            assert!(report.steps[1].detail.contains("expected Some(ExpectedFailure)"));
            assert!(report.steps[1].diagnostics.is_none());
        }

        #[tokio::test(start_paused = true)]
        async fn test_swipe_step() {
            let dir = tempfile::tempdir().unwrap();
            let yaml = r"
name: carousel
elements:
  - { id: card-3, text: Fully compatible, after_swipes: 2 }
steps:
  - action: swipe
    name: next cards
    swipe:
      region: { left: 108, top: 860, width: 864, height: 200 }
      direction: left
      repeat: 2
    strategies: [{ kind: text_matches, expression: '(?i).*compatible.*' }]
";
            let report = replay(&Timeline::from_yaml(yaml).unwrap(), fast_config(dir.path())).await;
            assert!(report.is_success(), "{report:?}");
            assert!(report.steps[0].detail.contains("swiped left"));
        }
    }
}
