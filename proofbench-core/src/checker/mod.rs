//! Proof checker interface and session handle.
//!
//! A checker adapter wraps an external proof assistant. The harness only asks
//! it three things: which theorems a file contains, whether a candidate proof
//! closes a statement, and to shut down.

mod session;

pub use session::CheckerSession;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::theorem::Theorem;

/// Outcome of checking one candidate proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub accepted: bool,
    /// Checker diagnostic; empty when accepted without remarks.
    pub message: String,
}

impl Verdict {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: message.into(),
        }
    }
}

/// Adapter over a proof checker.
///
/// Errors flagged with [`Error::CheckerTransient`](crate::Error::CheckerTransient)
/// mean the checker failed on its own and the same request may succeed later.
/// Any other error is treated as a broken session.
pub trait CheckerAdapter: Send {
    /// Parse the source file into theorem records, in source order.
    fn parse_file(&mut self) -> Result<Vec<Theorem>>;

    /// Check a single candidate proof of `statement` after `context`.
    fn check_proof(&mut self, statement: &str, proof: &str, context: &str) -> Result<Verdict>;

    /// Check several candidates in one round-trip, one verdict per proof in
    /// input order.
    fn check_proofs(
        &mut self,
        context: &str,
        statement: &str,
        proofs: &[String],
    ) -> Result<Vec<Verdict>> {
        proofs
            .iter()
            .map(|proof| self.check_proof(statement, proof, context))
            .collect()
    }

    /// Names of every theorem in the source file.
    fn all_theorem_names(&mut self) -> Result<BTreeSet<String>> {
        Ok(self.parse_file()?.into_iter().map(|t| t.name).collect())
    }

    /// Shut the checker down. Calling it twice is harmless.
    fn exit(&mut self) -> Result<()>;
}

/// Opens fresh checker adapters; used at acquisition and on every restart.
pub trait CheckerFactory {
    type Adapter: CheckerAdapter;

    fn open(&self) -> Result<Self::Adapter>;
}
