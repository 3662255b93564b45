//! Error types for proofbench-core.

use thiserror::Error;

use crate::theorem::Position;

/// Result type alias using proofbench-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running an evaluation.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid partition or harness parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Result logger lifecycle misuse
    #[error("Sequencing error: {0}")]
    Sequencing(String),

    /// The checker reported an internal failure unrelated to the candidate proofs
    #[error("Checker internal error: {0}")]
    CheckerTransient(String),

    /// Verification requested for a statement outside the evaluation set
    #[error("Unknown statement: {statement}")]
    Lookup { statement: String },

    /// Replacement ranges handed to the merge overlap
    #[error("Overlapping ranges: {first} and {second}")]
    OverlappingRanges { first: Position, second: Position },

    /// Model or checker adapter failure
    #[error("Adapter error: {adapter} - {message}")]
    Adapter { adapter: String, message: String },

    /// LLM API error
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// Subprocess communication error
    #[error("Subprocess communication error: {0}")]
    SubprocessComm(String),

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a sequencing error.
    pub fn sequencing(message: impl Into<String>) -> Self {
        Self::Sequencing(message.into())
    }

    /// Create a transient checker error.
    pub fn checker_transient(message: impl Into<String>) -> Self {
        Self::CheckerTransient(message.into())
    }

    /// Create a lookup error for an unknown statement.
    pub fn lookup(statement: impl Into<String>) -> Self {
        Self::Lookup {
            statement: statement.into(),
        }
    }

    /// Create an adapter error.
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create an LLM API error.
    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Caller bugs and bad parameters. These are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Sequencing(_)
                | Self::Lookup { .. }
                | Self::OverlappingRanges { .. }
        )
    }

    /// Whether the checker flagged its own failure rather than the proof.
    pub fn is_checker_transient(&self) -> bool {
        matches!(self, Self::CheckerTransient(_))
    }
}
