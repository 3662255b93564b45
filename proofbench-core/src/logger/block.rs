//! Text of the per-theorem attempt log.

use crate::theorem::ProofDialect;

pub const BLOCK_START: &str = "{THEOREM PROOF LOG START}";
pub const BLOCK_END: &str = "{THEOREM PROOF LOG END}";

/// Annotated record of every attempt on one theorem.
///
/// Only the first accepted proof is left as live code; everything else is
/// commented out so the merged file still checks.
#[derive(Debug, Clone)]
pub struct ProofLogBlock {
    text: String,
}

impl ProofLogBlock {
    pub fn open(dialect: &ProofDialect) -> Self {
        Self {
            text: format!("{}\n", dialect.comment(BLOCK_START)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    pub fn success(
        &mut self,
        dialect: &ProofDialect,
        attempt: usize,
        theorem: usize,
        statement: &str,
        proof: &str,
        live: bool,
    ) {
        self.line(&dialect.comment(&format!(
            "Attempt {} for theorem {}",
            attempt, theorem
        )));
        if live {
            self.line(&format!("{}\n{}", statement, proof));
        } else {
            self.line(&dialect.block_comment(&format!("{}\n{}", statement, proof)));
        }
        self.line(&dialect.comment(&format!(
            "Attempt {} for theorem {} successful",
            attempt, theorem
        )));
        self.text.push('\n');
    }

    pub fn failure(
        &mut self,
        dialect: &ProofDialect,
        attempt: usize,
        theorem: usize,
        statement: &str,
        proof: &str,
        error: &str,
    ) {
        self.line(&dialect.comment(&format!(
            "Attempt {} for theorem {}",
            attempt, theorem
        )));
        self.line(&dialect.block_comment(&format!("{}\n{}", statement, proof)));
        self.line(&dialect.comment(&format!(
            "Attempt {} for theorem {} unsuccessful",
            attempt, theorem
        )));
        self.line(&dialect.comment(&format!("ERROR message: {}", error)));
        self.text.push('\n');
    }

    pub fn exception(&mut self, dialect: &ProofDialect, attempt: usize, theorem: usize, error: &str) {
        self.line(&dialect.comment(&format!(
            "Attempt {} for theorem {} failed with an exception",
            attempt, theorem
        )));
        self.line(&dialect.comment(&format!("EXCEPTION message: {}", error)));
        self.text.push('\n');
    }

    pub fn check_failure(&mut self, dialect: &ProofDialect, error: &str) {
        self.line(&dialect.comment(&format!("Checker responded with an error: {}", error)));
    }

    /// Restore the proof from the source file after every attempt failed.
    pub fn fallback(&mut self, dialect: &ProofDialect, statement: &str, proof: &str) {
        self.line(&dialect.comment(
            "Correct proof was not found. Here is the one from original file.",
        ));
        self.line(&format!("{}\n{}", statement, proof));
    }

    pub fn close(mut self, dialect: &ProofDialect) -> String {
        self.text.push_str(&dialect.comment(BLOCK_END));
        self.text
    }
}
