//! Per-scenario facade.
//!
//! A [`Session`] ties one resolver to an [`EngineConfig`] and, optionally, a
//! snapshot source and diagnostic sink. Every operation that ends in an
//! unresolved outcome (timeout, element not found, ambiguous classification)
//! captures diagnostics exactly once before the error is returned.

use crate::config::EngineConfig;
use crate::diagnostics::{CaptureReport, Capturer, DiagnosticLabel, DiagnosticSink};
use crate::driver::{GestureDriver, Resolver, SnapshotSource};
use crate::fallback::{ElementAction, Resolved};
use crate::gesture::{self, Swipe};
use crate::locator::LocatorStrategy;
use crate::outcome::{Condition, Outcome, Precedence};
use crate::result::AguardarResult;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Snapshot source and sink pair used for failure captures
#[derive(Clone)]
pub struct DiagnosticsTarget {
    source: Arc<dyn SnapshotSource>,
    sink: Arc<dyn DiagnosticSink>,
}

impl DiagnosticsTarget {
    /// Pair a snapshot source with a sink
    #[must_use]
    pub fn new(source: Arc<dyn SnapshotSource>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { source, sink }
    }
}

impl std::fmt::Debug for DiagnosticsTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticsTarget").finish_non_exhaustive()
    }
}

/// One scenario's view of the engine
#[derive(Debug)]
pub struct Session<R> {
    scenario: String,
    resolver: R,
    config: EngineConfig,
    diagnostics: Option<DiagnosticsTarget>,
    cancel: Option<CancellationToken>,
    captures: Vec<CaptureReport>,
}

impl<R: Resolver> Session<R> {
    /// Create a session with the default configuration
    #[must_use]
    pub fn new(scenario: impl Into<String>, resolver: R) -> Self {
        Self {
            scenario: scenario.into(),
            resolver,
            config: EngineConfig::default(),
            diagnostics: None,
            cancel: None,
            captures: Vec::new(),
        }
    }

    /// Use `config` for every wait
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Capture failures through `target`
    #[must_use]
    pub fn with_diagnostics(mut self, target: DiagnosticsTarget) -> Self {
        self.diagnostics = Some(target);
        self
    }

    /// Abandon waits when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Scenario name
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying resolver
    #[must_use]
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Diagnostic captures made so far
    #[must_use]
    pub fn captures(&self) -> &[CaptureReport] {
        &self.captures
    }

    /// Resolve the first matching strategy
    pub async fn resolve(
        &mut self,
        step: &str,
        strategies: &[LocatorStrategy],
    ) -> AguardarResult<Resolved<R::Handle>> {
        let result = self
            .config
            .chain(self.cancel.clone())
            .resolve(&self.resolver, strategies)
            .await;
        self.settle(step, result).await
    }

    /// Resolve and click, falling through to the next strategy when the click fails
    pub async fn click(
        &mut self,
        step: &str,
        strategies: &[LocatorStrategy],
    ) -> AguardarResult<Resolved<R::Handle>> {
        self.act(step, strategies, &ElementAction::Click).await
    }

    /// Resolve and replace the element's value
    pub async fn set_value(
        &mut self,
        step: &str,
        strategies: &[LocatorStrategy],
        value: &str,
    ) -> AguardarResult<Resolved<R::Handle>> {
        self.act(step, strategies, &ElementAction::SetValue(value.to_string()))
            .await
    }

    /// Resolve and read the element's visible text
    pub async fn read_text(
        &mut self,
        step: &str,
        strategies: &[LocatorStrategy],
    ) -> AguardarResult<String> {
        let resolved = self.act(step, strategies, &ElementAction::ReadText).await?;
        Ok(resolved.text.unwrap_or_default())
    }

    /// Classify which outcome occurred; ambiguity and timeout are errors here
    pub async fn classify(
        &mut self,
        step: &str,
        conditions: &[Condition],
        precedence: Option<Precedence>,
    ) -> AguardarResult<Outcome> {
        let mut classifier = self.config.classifier(self.cancel.clone());
        if let Some(precedence) = precedence {
            classifier = classifier.with_precedence(precedence);
        }
        let result = classifier
            .classify(&self.resolver, conditions)
            .await
            .and_then(Outcome::into_result);
        self.settle(step, result).await
    }

    /// Swipe, then resolve what the swipe revealed
    pub async fn swipe_then_resolve<G: GestureDriver>(
        &mut self,
        step: &str,
        gesture: &G,
        swipe: &Swipe,
        strategies: &[LocatorStrategy],
    ) -> AguardarResult<Resolved<R::Handle>> {
        let chain = self.config.chain(self.cancel.clone());
        let result =
            gesture::swipe_then_resolve(gesture, swipe, &chain, &self.resolver, strategies).await;
        self.settle(step, result).await
    }

    async fn act(
        &mut self,
        step: &str,
        strategies: &[LocatorStrategy],
        action: &ElementAction,
    ) -> AguardarResult<Resolved<R::Handle>> {
        let result = self
            .config
            .chain(self.cancel.clone())
            .resolve_and(&self.resolver, strategies, action)
            .await;
        self.settle(step, result).await
    }

    /// Capture diagnostics for unresolved outcomes, then pass the result on
    async fn settle<T>(&mut self, step: &str, result: AguardarResult<T>) -> AguardarResult<T> {
        let err = match result {
            Ok(value) => {
                debug!(scenario = %self.scenario, step, "step succeeded");
                return Ok(value);
            }
            Err(err) => err,
        };
        warn!(scenario = %self.scenario, step, error = %err, "step failed");

        if err.triggers_diagnostics() && self.config.capture_diagnostics {
            if let Some(ref target) = self.diagnostics {
                let label = DiagnosticLabel::new(&self.scenario, step);
                let report = Capturer::new(target.source.as_ref(), target.sink.as_ref())
                    .capture(label)
                    .await;
                self.captures.push(report);
            }
        }
        Err(err)
    }
}
