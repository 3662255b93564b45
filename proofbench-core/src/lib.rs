//! # proofbench-core
//!
//! Evaluation harness measuring how well a language model writes
//! machine-checked proofs for the theorems of a proof-script file.
//!
//! ## Core Components
//!
//! - **Partition**: which theorems are shown as examples and which are evaluated
//! - **Prompt**: system instruction, few-shot history and proof verification
//! - **Checker**: adapter trait over a proof assistant, scoped session handle
//! - **Lean**: Lean 4 REPL adapter and source scanner
//! - **Interactor**: fetch → verify → record loop with two retry domains
//! - **Logger**: per-theorem attempt log, histogram and range-substitution merge
//!
//! ## Example
//!
//! ```rust,ignore
//! use proofbench_core::{harness, HarnessConfig};
//!
//! let config = HarnessConfig::from_json_file("harness.json")?;
//! let mut ctx = harness::run_context(&config);
//! let report = harness::run_lean_evaluation(&config, "Basic.lean", model, &mut ctx).await?;
//! println!("solved {}/{}", report.solved, report.evaluated);
//! ```

pub mod checker;
pub mod config;
pub mod error;
pub mod harness;
pub mod interactor;
pub mod lean;
pub mod logger;
pub mod model;
pub mod partition;
pub mod prompt;
pub mod run_context;
pub mod theorem;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use checker::{CheckerAdapter, CheckerFactory, CheckerSession, Verdict};
pub use config::{HarnessConfig, RetryPolicy};
pub use error::{Error, Result};
pub use interactor::{Interactor, RunReport, TheoremPhase};
pub use lean::{LeanReplChecker, LeanReplConfig, LeanReplFactory, LeanScanner};
pub use logger::{
    splice, AttemptHistogram, EvaluationOutput, OutputMode, PieConfig, ProofLogBlock,
    ResultLogger,
};
pub use model::{ChatHistory, ChatMessage, ChatRole, ModelAdapter};
pub use partition::{Partition, PartitionPolicy};
pub use prompt::{PromptStrategy, TheoremPrompt};
pub use run_context::{Clock, DirectorySink, FixedClock, MemorySink, OutputSink, RunContext, SystemClock};
pub use theorem::{
    Position, ProofBody, ProofDialect, ProofStep, Range, SourceDocument, StatementRanges, Theorem,
};
