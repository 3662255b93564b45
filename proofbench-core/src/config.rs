//! Harness configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lean::LeanReplConfig;
use crate::logger::OutputMode;
use crate::partition::PartitionPolicy;
use crate::theorem::ProofDialect;

/// Retry budgets of the interaction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Verification attempts per theorem when the checker reports an
    /// internal failure.
    pub transient_retry_limit: u32,
    /// Attempts per model fetch.
    pub model_retry_limit: u32,
    /// Cap on checker restarts after unexpected errors. `None` means no cap.
    pub max_session_restarts: Option<u32>,
    /// Deadline for a single model call, in milliseconds.
    pub model_timeout_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            transient_retry_limit: 3,
            model_retry_limit: 3,
            max_session_restarts: None,
            model_timeout_ms: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_transient_retry_limit(mut self, limit: u32) -> Self {
        self.transient_retry_limit = limit;
        self
    }

    pub fn with_model_retry_limit(mut self, limit: u32) -> Self {
        self.model_retry_limit = limit;
        self
    }

    pub fn with_max_session_restarts(mut self, limit: u32) -> Self {
        self.max_session_restarts = Some(limit);
        self
    }

    pub fn with_model_timeout(mut self, timeout_ms: u64) -> Self {
        self.model_timeout_ms = Some(timeout_ms);
        self
    }
}

/// Settings for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Candidate proofs requested per theorem.
    pub shots: usize,
    pub mode: OutputMode,
    pub retry: RetryPolicy,
    /// Seed for partitioning. Entropy when unset.
    pub seed: Option<u64>,
    /// Directory for log artifacts. `~` is expanded.
    pub log_dir: PathBuf,
    pub dialect: ProofDialect,
    pub partition: PartitionPolicy,
    /// Show goals above every step of the example proofs.
    pub annotate_examples: bool,
    pub checker: LeanReplConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            shots: 1,
            mode: OutputMode::Log,
            retry: RetryPolicy::default(),
            seed: None,
            log_dir: PathBuf::from("logs"),
            dialect: ProofDialect::lean4(),
            partition: PartitionPolicy::All,
            annotate_examples: false,
            checker: LeanReplConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shots == 0 {
            return Err(Error::config("shots must be at least 1"));
        }
        if self.retry.transient_retry_limit == 0 {
            return Err(Error::config("transient_retry_limit must be at least 1"));
        }
        if self.retry.model_retry_limit == 0 {
            return Err(Error::config("model_retry_limit must be at least 1"));
        }
        self.partition.validate()
    }

    pub fn with_shots(mut self, shots: usize) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_dialect(mut self, dialect: ProofDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_partition(mut self, policy: PartitionPolicy) -> Self {
        self.partition = policy;
        self
    }

    pub fn with_annotated_examples(mut self) -> Self {
        self.annotate_examples = true;
        self
    }

    pub fn with_checker(mut self, checker: LeanReplConfig) -> Self {
        self.checker = checker;
        self
    }
}
