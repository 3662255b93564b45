//! Prompt strategies.
//!
//! A strategy decides what the model sees (system instruction and few-shot
//! examples), which statements it is asked to prove, and how a candidate
//! proof is checked against the source file.

mod strategy;

pub use strategy::TheoremPrompt;

use std::sync::Arc;

use crate::checker::Verdict;
use crate::error::Result;
use crate::model::ChatMessage;
use crate::theorem::{ProofDialect, SourceDocument, StatementRanges};

/// Everything the interaction loop needs from a prompt strategy.
pub trait PromptStrategy {
    /// Name written to the log header.
    fn strategy_name(&self) -> String;

    /// Fixed instruction sent as the system message.
    fn system_instruction(&self) -> String;

    /// Example exchanges shown before every request.
    fn few_shot_history(&self) -> Vec<ChatMessage>;

    /// Statements to evaluate, in source order.
    ///
    /// Also rebuilds the statement → range map, so it must be called before
    /// [`verify`](Self::verify).
    fn evaluation_statements(&mut self) -> Result<Vec<String>>;

    /// Check one candidate proof of an evaluation statement.
    fn verify(&mut self, statement: &str, proof: &str) -> Result<Verdict>;

    /// Check several candidates in one checker round-trip.
    fn verify_batch(&mut self, statement: &str, proofs: &[String]) -> Result<Vec<Verdict>>;

    /// Replace the checker session with a fresh one.
    fn restart_checker_session(&mut self) -> Result<()>;

    /// Mark the checker session as broken.
    fn poison_checker(&mut self, reason: &str);

    /// Shut the checker down. Idempotent.
    fn release_checker(&mut self) -> Result<()>;

    /// Shared, read-only statement → range map.
    fn statement_ranges(&self) -> Arc<StatementRanges>;

    /// Proof the source file gives for `statement`, if any.
    fn reference_proof(&self, statement: &str) -> Option<String>;

    /// The original source file.
    fn source(&self) -> Arc<SourceDocument>;

    fn dialect(&self) -> &ProofDialect;
}
