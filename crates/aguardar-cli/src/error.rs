//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Timeline file could not be parsed or is inconsistent
    #[error("Invalid timeline: {message}")]
    Timeline {
        /// Error message
        message: String,
    },

    /// One or more replayed steps failed
    #[error("{failed} of {total} step(s) failed")]
    StepsFailed {
        /// Failed step count
        failed: usize,
        /// Total step count
        total: usize,
    },

    /// Report serialization error
    #[error("Report generation failed: {message}")]
    ReportGeneration {
        /// Error message
        message: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Aguardar library error
    #[error("Aguardar error: {0}")]
    Aguardar(#[from] aguardar::AguardarError),
}

impl CliError {
    /// Create a timeline error
    #[must_use]
    pub fn timeline(message: impl Into<String>) -> Self {
        Self::Timeline {
            message: message.into(),
        }
    }

    /// Create a report generation error
    #[must_use]
    pub fn report_generation(message: impl Into<String>) -> Self {
        Self::ReportGeneration {
            message: message.into(),
        }
    }
}
