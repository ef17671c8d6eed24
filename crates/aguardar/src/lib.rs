//! Aguardar: resilient UI element resolution and outcome verification
//!
//! Aguardar (Portuguese: "to wait for") finds UI elements whose selectors
//! are unstable, waits for them with bounded polling, falls back across
//! several locator strategies, decides which of several mutually exclusive
//! UI states occurred, and captures diagnostics when it cannot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    AGUARDAR Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Session    │───►│ Fallback   │───►│ Poller     │            │
//! │   │ (scenario) │    │ Chain      │    │ (tokio)    │            │
//! │   └─────┬──────┘    └────────────┘    └─────┬──────┘            │
//! │         │           ┌────────────┐          │                   │
//! │         ├──────────►│ Classifier │──────────┤                   │
//! │         │           └────────────┘          ▼                   │
//! │   ┌─────▼──────┐                    ┌────────────┐              │
//! │   │ Capturer   │◄── failures ───────│ Resolver   │ (injected)   │
//! │   │ + Sink     │                    │ driver     │              │
//! │   └────────────┘                    └────────────┘              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use aguardar::{FallbackChain, LocatorStrategy, ScriptedElement, ScriptedUi, WaitPolicy};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> aguardar::AguardarResult<()> {
//! let ui = ScriptedUi::with_elements([ScriptedElement::new("ok").text("OK")]);
//! let chain = FallbackChain::new(WaitPolicy::new(5000, 500)?);
//! let resolved = chain
//!     .resolve(
//!         &ui,
//!         &[LocatorStrategy::accessibility_id("OK"), LocatorStrategy::text("OK")],
//!     )
//!     .await?;
//! assert_eq!(resolved.strategy, LocatorStrategy::text("OK"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod driver;
mod locator;
mod result;

/// Engine configuration loaded from YAML
#[allow(clippy::missing_errors_doc)]
pub mod config;

/// Failure diagnostics: snapshot capture and sinks
#[allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
pub mod diagnostics;

/// Fallback chains across locator strategies
#[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation)]
pub mod fallback;

/// Swipe gestures followed by verification
pub mod gesture;

/// Outcome classification with explicit tie-breaks
#[allow(clippy::missing_errors_doc, clippy::cast_possible_truncation)]
pub mod outcome;

/// In-memory scripted UI driver for tests and dry runs
#[allow(clippy::missing_errors_doc)]
pub mod scripted;

/// Per-scenario facade
#[allow(clippy::missing_errors_doc)]
pub mod session;

/// Wait policies and the polling scheduler
#[allow(clippy::missing_errors_doc)]
pub mod wait;

pub use config::EngineConfig;
pub use diagnostics::{
    CaptureReport, Capturer, DiagnosticBundle, DiagnosticLabel, DiagnosticSink,
    FsDiagnosticSink, MemorySink, StepStatus,
};
pub use driver::{
    DriverError, DriverResult, ElementHandle, GestureDriver, Resolver, Screenshot, SnapshotSource,
};
pub use fallback::{
    AttemptStatus, BudgetMode, ElementAction, FallbackChain, ResolutionAttempt, Resolved,
};
pub use gesture::{swipe_then_resolve, Swipe, SwipeDirection, SwipeRegion};
pub use locator::{LocatorKind, LocatorStrategy};
pub use outcome::{
    Classifier, Condition, Evidence, Expectation, Outcome, Precedence, Requirement,
};
pub use result::{AguardarError, AguardarResult};
pub use scripted::{RecordedSwipe, ScriptedElement, ScriptedHandle, ScriptedUi};
pub use session::{DiagnosticsTarget, Session};
pub use wait::{Poller, WaitPolicy, Waited, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        AguardarError, AguardarResult, Condition, ElementHandle, EngineConfig, FallbackChain,
        LocatorStrategy, Outcome, Precedence, Resolver, Session, WaitPolicy,
    };
}
