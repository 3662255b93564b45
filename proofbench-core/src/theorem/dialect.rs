//! Surface syntax of the proof language being evaluated.

use serde::{Deserialize, Serialize};

/// Markers and comment syntax of a proof language.
///
/// The harness never interprets proofs itself; the dialect only drives the
/// model instruction, give-up detection and the comments written to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDialect {
    /// Human-readable language name used in the instruction.
    pub language: String,
    /// Extension of the log artifact.
    pub file_extension: String,
    /// Token that opens a proof.
    pub proof_start: String,
    /// Token that closes a proof, if the language has one.
    pub proof_end: Option<String>,
    /// Token that abandons a proof.
    pub give_up: String,
    pub comment_open: String,
    pub comment_close: String,
}

impl ProofDialect {
    /// Lean 4 tactic proofs.
    pub fn lean4() -> Self {
        Self {
            language: "Lean 4".to_string(),
            file_extension: "lean".to_string(),
            proof_start: ":= by".to_string(),
            proof_end: None,
            give_up: "sorry".to_string(),
            comment_open: "/-".to_string(),
            comment_close: "-/".to_string(),
        }
    }

    /// Coq vernacular proofs.
    pub fn coq() -> Self {
        Self {
            language: "Coq".to_string(),
            file_extension: "v".to_string(),
            proof_start: "Proof.".to_string(),
            proof_end: Some("Qed.".to_string()),
            give_up: "Admitted.".to_string(),
            comment_open: "(*".to_string(),
            comment_close: "*)".to_string(),
        }
    }

    /// Single-line comment. Comment markers inside `text` are broken up.
    pub fn comment(&self, text: &str) -> String {
        format!(
            "{} {} {}",
            self.comment_open,
            self.escape(text),
            self.comment_close
        )
    }

    /// Comment spanning several lines, markers on their own lines.
    pub fn block_comment(&self, text: &str) -> String {
        format!(
            "{}\n{}\n{}",
            self.comment_open,
            self.escape(text),
            self.comment_close
        )
    }

    /// Proof that gives up immediately; used when a theorem has no proof.
    pub fn give_up_proof(&self) -> String {
        format!("{}\n  {}", self.proof_start, self.give_up)
    }

    /// Whether `text` uses the give-up marker as a standalone token.
    pub fn contains_give_up(&self, text: &str) -> bool {
        let is_ident = |c: char| c.is_alphanumeric() || c == '_' || c == '\'';
        text.match_indices(&self.give_up).any(|(idx, marker)| {
            let before = text[..idx].chars().next_back();
            let after = text[idx + marker.len()..].chars().next();
            let starts_word = marker.starts_with(is_ident);
            let ends_word = marker.ends_with(is_ident);
            !(starts_word && before.is_some_and(is_ident))
                && !(ends_word && after.is_some_and(is_ident))
        })
    }

    /// Comments nest in both languages, so open markers are broken as well.
    fn escape(&self, text: &str) -> String {
        let broken = |marker: &str| {
            let mut broken = marker.to_string();
            broken.insert(1, ' ');
            broken
        };
        text.replace(&self.comment_close, &broken(&self.comment_close))
            .replace(&self.comment_open, &broken(&self.comment_open))
    }
}

impl Default for ProofDialect {
    fn default() -> Self {
        Self::lean4()
    }
}
