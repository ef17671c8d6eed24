//! Failure diagnostics: structural and visual snapshots written to a sink.
//!
//! The [`Capturer`] never fails. Each sub-step (page source, screenshot,
//! structural write, visual write) runs in isolation; a failing step is
//! logged, recorded in the [`CaptureReport`], and the remaining steps run
//! anyway. A diagnostic capture must never mask the error it documents.

use crate::driver::SnapshotSource;
use crate::result::{AguardarError, AguardarResult};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

// =============================================================================
// LABEL & BUNDLE
// =============================================================================

/// Unique, filesystem-safe name of one capture
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagnosticLabel(String);

impl DiagnosticLabel {
    /// `<scenario>-<step>-<UTC timestamp>-<8 hex>`
    #[must_use]
    pub fn new(scenario: &str, step: &str) -> Self {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%3f");
        let nonce = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}-{timestamp}-{}",
            sanitize(scenario),
            sanitize(step),
            &nonce[..8]
        ))
    }

    /// Label text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagnosticLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn sanitize(part: &str) -> String {
    let cleaned: String = part
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Snapshots taken for one capture
#[derive(Debug, Clone)]
pub struct DiagnosticBundle {
    /// Capture label
    pub label: DiagnosticLabel,
    /// Page source / view hierarchy
    pub structural: Option<String>,
    /// PNG screenshot
    pub visual: Option<Vec<u8>>,
}

// =============================================================================
// SINKS
// =============================================================================

/// Destination of diagnostic bundles
#[async_trait]
pub trait DiagnosticSink: Send + Sync {
    /// Persist the structural snapshot
    async fn write_structural(&self, label: &DiagnosticLabel, source: &str) -> AguardarResult<()>;

    /// Persist the visual snapshot
    async fn write_visual(&self, label: &DiagnosticLabel, png: &[u8]) -> AguardarResult<()>;
}

/// Writes `<dir>/<label>.xml` and `<dir>/<label>.png`
#[derive(Debug, Clone)]
pub struct FsDiagnosticSink {
    dir: PathBuf,
}

impl FsDiagnosticSink {
    /// Create a sink writing under `dir`; the directory is created on first write
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file written for `label` with `extension`
    #[must_use]
    pub fn path_for(&self, label: &DiagnosticLabel, extension: &str) -> PathBuf {
        self.dir.join(format!("{label}.{extension}"))
    }

    async fn write(&self, path: PathBuf, bytes: &[u8]) -> AguardarResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "diagnostic written");
        Ok(())
    }
}

#[async_trait]
impl DiagnosticSink for FsDiagnosticSink {
    async fn write_structural(&self, label: &DiagnosticLabel, source: &str) -> AguardarResult<()> {
        self.write(self.path_for(label, "xml"), source.as_bytes()).await
    }

    async fn write_visual(&self, label: &DiagnosticLabel, png: &[u8]) -> AguardarResult<()> {
        self.write(self.path_for(label, "png"), png).await
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    structural: Vec<(DiagnosticLabel, String)>,
    visual: Vec<(DiagnosticLabel, Vec<u8>)>,
    fail_structural: bool,
    fail_visual: bool,
}

/// In-memory sink with failure injection
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make structural writes fail
    pub fn fail_structural(&self, fail: bool) {
        self.lock().fail_structural = fail;
    }

    /// Make visual writes fail
    pub fn fail_visual(&self, fail: bool) {
        self.lock().fail_visual = fail;
    }

    /// Structural snapshots written so far
    #[must_use]
    pub fn structural(&self) -> Vec<(DiagnosticLabel, String)> {
        self.lock().structural.clone()
    }

    /// Visual snapshots written so far
    #[must_use]
    pub fn visual(&self) -> Vec<(DiagnosticLabel, Vec<u8>)> {
        self.lock().visual.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DiagnosticSink for MemorySink {
    async fn write_structural(&self, label: &DiagnosticLabel, source: &str) -> AguardarResult<()> {
        let mut state = self.lock();
        if state.fail_structural {
            return Err(std::io::Error::other("structural sink unavailable").into());
        }
        state.structural.push((label.clone(), source.to_string()));
        Ok(())
    }

    async fn write_visual(&self, label: &DiagnosticLabel, png: &[u8]) -> AguardarResult<()> {
        let mut state = self.lock();
        if state.fail_visual {
            return Err(std::io::Error::other("visual sink unavailable").into());
        }
        state.visual.push((label.clone(), png.to_vec()));
        Ok(())
    }
}

// =============================================================================
// CAPTURER
// =============================================================================

/// Result of one capture sub-step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepStatus {
    /// Step succeeded
    Ok,
    /// Step not run because its input was unavailable
    Skipped,
    /// Step failed
    Failed(String),
}

impl StepStatus {
    /// Whether the step succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// What happened during one capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureReport {
    /// Capture label
    pub label: DiagnosticLabel,
    /// Structural snapshot
    pub page_source: StepStatus,
    /// Visual snapshot
    pub screenshot: StepStatus,
    /// Structural write
    pub structural_write: StepStatus,
    /// Visual write
    pub visual_write: StepStatus,
}

impl CaptureReport {
    /// Whether every sub-step succeeded
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.page_source.is_ok()
            && self.screenshot.is_ok()
            && self.structural_write.is_ok()
            && self.visual_write.is_ok()
    }
}

/// Takes snapshots from a source and hands them to a sink
#[derive(Debug)]
pub struct Capturer<'a, S: ?Sized, K: ?Sized> {
    source: &'a S,
    sink: &'a K,
}

impl<'a, S, K> Capturer<'a, S, K>
where
    S: SnapshotSource + ?Sized,
    K: DiagnosticSink + ?Sized,
{
    /// Create a capturer
    #[must_use]
    pub const fn new(source: &'a S, sink: &'a K) -> Self {
        Self { source, sink }
    }

    /// Capture both snapshots under `label`; never fails
    pub async fn capture(&self, label: DiagnosticLabel) -> CaptureReport {
        let (structural, page_source) = match self.source.page_source().await {
            Ok(xml) => (Some(xml), StepStatus::Ok),
            Err(err) => {
                warn!(%label, error = %err, "page source capture failed");
                (None, StepStatus::Failed(err.to_string()))
            }
        };
        let (visual, screenshot) = match self.source.screenshot().await {
            Ok(shot) => (Some(shot.data), StepStatus::Ok),
            Err(err) => {
                warn!(%label, error = %err, "screenshot capture failed");
                (None, StepStatus::Failed(err.to_string()))
            }
        };

        let bundle = DiagnosticBundle {
            label,
            structural,
            visual,
        };

        let structural_write = match bundle.structural {
            Some(ref xml) => step(
                "structural write",
                &bundle.label,
                self.sink.write_structural(&bundle.label, xml).await,
            ),
            None => StepStatus::Skipped,
        };
        let visual_write = match bundle.visual {
            Some(ref png) => step(
                "visual write",
                &bundle.label,
                self.sink.write_visual(&bundle.label, png).await,
            ),
            None => StepStatus::Skipped,
        };

        let report = CaptureReport {
            label: bundle.label,
            page_source,
            screenshot,
            structural_write,
            visual_write,
        };
        info!(label = %report.label, complete = report.is_complete(), "diagnostics captured");
        report
    }

    /// Capture when `error` is an unresolved outcome, then hand it back
    pub async fn capture_on_error(
        &self,
        scenario: &str,
        step: &str,
        error: AguardarError,
    ) -> AguardarError {
        if error.triggers_diagnostics() {
            self.capture(DiagnosticLabel::new(scenario, step)).await;
        }
        error
    }
}

fn step(what: &str, label: &DiagnosticLabel, result: AguardarResult<()>) -> StepStatus {
    match result {
        Ok(()) => StepStatus::Ok,
        Err(err) => {
            warn!(%label, error = %err, "diagnostic {what} failed");
            StepStatus::Failed(err.to_string())
        }
    }
}
