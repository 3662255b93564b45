//! JSON protocol of the Lean 4 REPL.
//!
//! See: https://github.com/leanprover-community/repl

use serde::{Deserialize, Serialize};

/// Request sent to the REPL, one JSON object per line.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum LeanCommand {
    /// Elaborate Lean source.
    Command {
        cmd: String,
        /// Environment to build upon; a fresh one when omitted.
        #[serde(skip_serializing_if = "Option::is_none")]
        env: Option<u64>,
        /// Ask for every tactic with the goals it ran on.
        #[serde(rename = "allTactics", skip_serializing_if = "Option::is_none")]
        all_tactics: Option<bool>,
    },
}

impl LeanCommand {
    pub fn command(cmd: impl Into<String>) -> Self {
        Self::Command {
            cmd: cmd.into(),
            env: None,
            all_tactics: None,
        }
    }

    pub fn command_with_env(cmd: impl Into<String>, env: u64) -> Self {
        Self::Command {
            cmd: cmd.into(),
            env: Some(env),
            all_tactics: None,
        }
    }

    /// Elaborate a whole file and report its tactics.
    pub fn with_all_tactics(cmd: impl Into<String>) -> Self {
        Self::Command {
            cmd: cmd.into(),
            env: None,
            all_tactics: Some(true),
        }
    }
}

/// Reply from the REPL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeanResponse {
    /// Environment produced by the command.
    #[serde(default)]
    pub env: Option<u64>,

    #[serde(default)]
    pub messages: Vec<LeanMessage>,

    #[serde(default)]
    pub sorries: Vec<Sorry>,

    /// Present when requested with `allTactics`.
    #[serde(default)]
    pub tactics: Vec<TacticInfo>,

    /// Set when the REPL itself failed to process the request.
    #[serde(default)]
    pub message: Option<String>,
}

impl LeanResponse {
    /// No errors and no open goals.
    pub fn is_success(&self) -> bool {
        self.message.is_none() && !self.has_errors() && self.sorries.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.severity == MessageSeverity::Error)
    }

    pub fn errors(&self) -> Vec<&LeanMessage> {
        self.messages
            .iter()
            .filter(|m| m.severity == MessageSeverity::Error)
            .collect()
    }

    /// Errors and remaining goals, one per line.
    pub fn format_errors(&self) -> String {
        let errors = self.errors().into_iter().map(|msg| {
            let at = match (&msg.pos, &msg.end_pos) {
                (Some(s), Some(e)) => format!("{}:{}-{}:{}: ", s.line, s.column, e.line, e.column),
                (Some(s), None) => format!("{}:{}: ", s.line, s.column),
                _ => String::new(),
            };
            format!("{}error: {}", at, msg.data)
        });
        let goals = self.sorries.iter().map(|s| format!("sorry: {}", s.goal));
        errors.chain(goals).collect::<Vec<_>>().join("\n")
    }
}

/// A compiler message.
#[derive(Debug, Clone, Deserialize)]
pub struct LeanMessage {
    pub severity: MessageSeverity,
    pub pos: Option<LeanPosition>,
    #[serde(rename = "endPos")]
    pub end_pos: Option<LeanPosition>,
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSeverity {
    Error,
    Warning,
    Info,
}

/// REPL source position: 1-indexed line, 0-indexed column.
#[derive(Debug, Clone, Deserialize)]
pub struct LeanPosition {
    pub line: u32,
    pub column: u32,
}

/// An open goal left by `sorry`.
#[derive(Debug, Clone, Deserialize)]
pub struct Sorry {
    pub goal: String,
    pub pos: Option<LeanPosition>,
    #[serde(rename = "endPos")]
    pub end_pos: Option<LeanPosition>,
    #[serde(rename = "proofState")]
    pub proof_state: Option<u64>,
}

/// A tactic invocation and the goals before it ran.
#[derive(Debug, Clone, Deserialize)]
pub struct TacticInfo {
    pub tactic: String,
    pub goals: String,
    pub pos: LeanPosition,
    #[serde(rename = "endPos")]
    pub end_pos: Option<LeanPosition>,
}
