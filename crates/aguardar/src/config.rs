//! Engine configuration.
//!
//! ```yaml
//! wait: { timeout_ms: 5000, interval_ms: 500 }
//! classify_wait: { timeout_ms: 7000, interval_ms: 500 }
//! budget: shared
//! diagnostics_dir: target/aguardar/diagnostics
//! capture_diagnostics: true
//! ```
//!
//! Every key is optional. Malformed YAML is a [`AguardarError::Yaml`];
//! well-formed YAML carrying an invalid wait policy is a
//! [`AguardarError::Configuration`].

use crate::fallback::{BudgetMode, FallbackChain};
use crate::outcome::Classifier;
use crate::result::{AguardarError, AguardarResult};
use crate::wait::{RawWaitPolicy, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Default diagnostics output directory
pub const DEFAULT_DIAGNOSTICS_DIR: &str = "target/aguardar/diagnostics";

/// Settings shared by every component of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    /// Policy for element resolution
    pub wait: WaitPolicy,
    /// Policy for outcome classification
    pub classify_wait: WaitPolicy,
    /// Budget mode of fallback chains
    pub budget: BudgetMode,
    /// Where the filesystem sink writes
    pub diagnostics_dir: PathBuf,
    /// Whether failures trigger a diagnostic capture
    pub capture_diagnostics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wait: WaitPolicy::default(),
            classify_wait: WaitPolicy::classification(),
            budget: BudgetMode::default(),
            diagnostics_dir: PathBuf::from(DEFAULT_DIAGNOSTICS_DIR),
            capture_diagnostics: true,
        }
    }
}

/// File form; wait policies are validated after parsing
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    wait: Option<RawWaitPolicy>,
    classify_wait: Option<RawWaitPolicy>,
    budget: Option<BudgetMode>,
    diagnostics_dir: Option<PathBuf>,
    capture_diagnostics: Option<bool>,
}

impl EngineConfig {
    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    /// Returns error if YAML is invalid or a wait policy is rejected.
    pub fn from_yaml(yaml: &str) -> AguardarResult<Self> {
        let file: ConfigFile = if yaml.trim().is_empty() {
            ConfigFile::default()
        } else {
            serde_yaml_ng::from_str(yaml).map_err(|e| AguardarError::Yaml {
                message: e.to_string(),
            })?
        };

        let defaults = Self::default();
        Ok(Self {
            wait: file
                .wait
                .map(WaitPolicy::try_from)
                .transpose()?
                .unwrap_or(defaults.wait),
            classify_wait: file
                .classify_wait
                .map(WaitPolicy::try_from)
                .transpose()?
                .unwrap_or(defaults.classify_wait),
            budget: file.budget.unwrap_or(defaults.budget),
            diagnostics_dir: file.diagnostics_dir.unwrap_or(defaults.diagnostics_dir),
            capture_diagnostics: file
                .capture_diagnostics
                .unwrap_or(defaults.capture_diagnostics),
        })
    }

    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// I/O errors reading the file, plus those of [`EngineConfig::from_yaml`].
    pub async fn load(path: impl AsRef<Path>) -> AguardarResult<Self> {
        let yaml = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_yaml(&yaml)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> AguardarResult<String> {
        serde_yaml_ng::to_string(self).map_err(|e| AguardarError::Yaml {
            message: e.to_string(),
        })
    }

    /// Fallback chain using the resolution policy and budget mode
    #[must_use]
    pub fn chain(&self, cancel: Option<CancellationToken>) -> FallbackChain {
        FallbackChain::new(self.wait)
            .with_budget(self.budget)
            .with_cancellation(cancel)
    }

    /// Classifier using the classification policy
    #[must_use]
    pub fn classifier(&self, cancel: Option<CancellationToken>) -> Classifier {
        Classifier::new(self.classify_wait).with_cancellation(cancel)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = EngineConfig::default();
            assert_eq!(config.wait.timeout_ms(), 5000);
            assert_eq!(config.wait.interval_ms(), 500);
            assert_eq!(config.classify_wait.timeout_ms(), 7000);
            assert_eq!(config.budget, BudgetMode::Shared);
            assert!(config.capture_diagnostics);
            assert_eq!(config.diagnostics_dir, PathBuf::from(DEFAULT_DIAGNOSTICS_DIR));
        }

        #[test]
        fn test_empty_yaml_is_default() {
            assert_eq!(EngineConfig::from_yaml("").unwrap(), EngineConfig::default());
            assert_eq!(EngineConfig::from_yaml("{}").unwrap(), EngineConfig::default());
        }

        #[test]
        fn test_partial_override() {
            let config = EngineConfig::from_yaml(
                "wait: { timeout_ms: 2000, interval_ms: 250, fail_fast: true }\n\
                 budget: full_per_strategy\n",
            )
            .unwrap();
            assert_eq!(config.wait.timeout_ms(), 2000);
            assert!(config.wait.is_fail_fast());
            assert_eq!(config.budget, BudgetMode::FullPerStrategy);
            assert_eq!(config.classify_wait, WaitPolicy::classification());
        }

        #[test]
        fn test_invalid_policy_is_configuration_error() {
            let err =
                EngineConfig::from_yaml("wait: { timeout_ms: 100, interval_ms: 500 }").unwrap_err();
            assert!(matches!(err, AguardarError::Configuration { .. }));
        }

        #[test]
        fn test_malformed_yaml_is_yaml_error() {
            let err = EngineConfig::from_yaml("wait: [").unwrap_err();
            assert!(matches!(err, AguardarError::Yaml { .. }));
            let err = EngineConfig::from_yaml("retries: 3").unwrap_err();
            assert!(matches!(err, AguardarError::Yaml { .. }));
        }

        #[test]
        fn test_yaml_roundtrip() {
            let config = EngineConfig {
                capture_diagnostics: false,
                ..EngineConfig::default()
            };
            let yaml = config.to_yaml().unwrap();
            assert!(yaml.contains("capture_diagnostics: false"));
            assert_eq!(EngineConfig::from_yaml(&yaml).unwrap(), config);
        }
    }

    mod load_tests {
        use super::*;

        #[tokio::test]
        async fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("engine.yaml");
            std::fs::write(
                &path,
                "diagnostics_dir: /tmp/diag\ncapture_diagnostics: false\n",
            )
            .unwrap();
            let config = EngineConfig::load(&path).await.unwrap();
            assert_eq!(config.diagnostics_dir, PathBuf::from("/tmp/diag"));
            assert!(!config.capture_diagnostics);
        }

        #[tokio::test]
        async fn test_load_missing_file_is_io_error() {
            let err = EngineConfig::load("/nonexistent/engine.yaml").await.unwrap_err();
            assert!(matches!(err, AguardarError::Io(_)));
        }

        #[test]
        fn test_builders_use_policies() {
            let config =
                EngineConfig::from_yaml("classify_wait: { timeout_ms: 3000, interval_ms: 300 }")
                    .unwrap();
            assert_eq!(config.classifier(None).policy().timeout_ms(), 3000);
            assert_eq!(config.chain(None).policy().timeout_ms(), 5000);
            assert_eq!(config.chain(None).policy().interval_ms(), 500);
        }
    }
}
