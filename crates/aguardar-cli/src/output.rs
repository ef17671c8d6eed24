//! Output formatting for replay reports

use crate::error::{CliError, CliResult};
use crate::replay::{ReplayReport, StepOutcome, StepReport};
use console::{style, Style, Term};

/// Prints replay results one line per step
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a new reporter writing to stdout
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stdout(),
            use_color,
            quiet,
        }
    }

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.quiet {
            return;
        }

        let styled = if self.use_color {
            style(title).bold().underlined().to_string()
        } else {
            format!("=== {title} ===")
        };

        let _ = self.term.write_line(&styled);
    }

    /// Print one step; failures are printed even in quiet mode
    pub fn step(&self, step: &StepReport) {
        if self.quiet && step.outcome != StepOutcome::Failed {
            return;
        }
        let _ = self.term.write_line(&render_step(step, self.use_color));
        if let Some(ref path) = step.diagnostics {
            let _ = self.term.write_line(&format!("    diagnostics: {path}"));
        }
    }

    /// Print the closing summary
    pub fn summary(&self, report: &ReplayReport) {
        let failed = report.count(StepOutcome::Failed);
        if self.quiet && failed == 0 {
            return;
        }
        let passed = report.count(StepOutcome::Passed);
        let skipped = report.count(StepOutcome::Skipped);
        let total = report.steps.len();

        let _ = self.term.write_line("");
        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();

            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };
            let _ = self.term.write_line(&format!(
                "{status} {total} steps ({} passed, {} failed, {} skipped)",
                passed_style.apply_to(passed),
                if failed > 0 {
                    failed_style.apply_to(failed).to_string()
                } else {
                    failed.to_string()
                },
                Style::new().yellow().apply_to(skipped)
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} steps ({passed} passed, {failed} failed, {skipped} skipped)"
            ));
        }
    }
}

/// Render one step line
#[must_use]
pub fn render_step(step: &StepReport, use_color: bool) -> String {
    let prefix = match (step.outcome, use_color) {
        (StepOutcome::Passed, true) => style("✓").green().bold().to_string(),
        (StepOutcome::Failed, true) => style("✗").red().bold().to_string(),
        (StepOutcome::Skipped, true) => style("-").yellow().to_string(),
        (StepOutcome::Passed, false) => "PASS".to_string(),
        (StepOutcome::Failed, false) => "FAIL".to_string(),
        (StepOutcome::Skipped, false) => "SKIP".to_string(),
    };
    format!(
        "{prefix} {} [{}] {}ms: {}",
        step.name, step.action, step.elapsed_ms, step.detail
    )
}

/// Render the full report as pretty JSON
pub fn render_json(report: &ReplayReport) -> CliResult<String> {
    serde_json::to_string_pretty(report).map_err(|e| CliError::report_generation(e.to_string()))
}
