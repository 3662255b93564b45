//! Theorem records and source positions.
//!
//! Positions follow the checker convention: zero-based lines, and columns
//! counted in UTF-16 code units.

use serde::{Deserialize, Serialize};

use super::dialect::ProofDialect;

/// Position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// 0-indexed line number.
    pub line: u32,
    /// 0-indexed column, in UTF-16 code units.
    pub character: u32,
}

impl Position {
    /// Create a new position.
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }

    /// Start of the document.
    pub fn origin() -> Self {
        Self::new(0, 0)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

/// Half-open span of source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    /// Create a new range.
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether two ranges share any text.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A single tactic step of a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Step text as written in the source.
    pub text: String,
    /// Goal the step acts on, when the checker reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
}

impl ProofStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            goal: None,
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = Some(goal.into());
        self
    }
}

/// The proof attached to a theorem in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBody {
    /// Full proof text, from the proof start marker to the end of the block.
    pub text: String,
    /// Individual steps.
    #[serde(default)]
    pub steps: Vec<ProofStep>,
    /// Whether the proof gives up (`sorry`, `Admitted.`).
    pub incomplete: bool,
}

impl ProofBody {
    /// Create a proof body, detecting the give-up marker with the dialect.
    pub fn new(text: impl Into<String>, dialect: &ProofDialect) -> Self {
        let text = text.into();
        let incomplete = dialect.contains_give_up(&text);
        Self {
            text,
            steps: Vec::new(),
            incomplete,
        }
    }

    pub fn with_steps(mut self, steps: Vec<ProofStep>) -> Self {
        self.steps = steps;
        self
    }

    /// Render the proof with a goal comment above every step that has one.
    ///
    /// Falls back to the verbatim text when no step carries a goal.
    pub fn annotated(&self, dialect: &ProofDialect) -> String {
        if self.steps.iter().all(|s| s.goal.is_none()) {
            return self.text.clone();
        }

        let mut out = dialect.proof_start.clone();
        for step in &self.steps {
            out.push('\n');
            if let Some(ref goal) = step.goal {
                out.push_str("  ");
                out.push_str(&dialect.comment(&format!("goal: {}", goal)));
                out.push('\n');
            }
            out.push_str("  ");
            out.push_str(step.text.trim());
        }
        if let Some(ref end) = dialect.proof_end {
            out.push('\n');
            out.push_str(end);
        }
        out
    }
}

/// A named theorem discovered in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theorem {
    pub name: String,
    /// Statement text, up to (not including) the proof.
    pub statement: String,
    /// `None` when the theorem is stated without any proof.
    pub proof: Option<ProofBody>,
    /// Span of the whole statement + proof block.
    pub source_range: Option<Range>,
}

impl Theorem {
    pub fn new(name: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            statement: statement.into(),
            proof: None,
            source_range: None,
        }
    }

    pub fn with_proof(mut self, proof: ProofBody) -> Self {
        self.proof = Some(proof);
        self
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.source_range = Some(range);
        self
    }

    /// A finished proof with no give-up marker.
    pub fn is_proved(&self) -> bool {
        self.proof.as_ref().is_some_and(|p| !p.incomplete)
    }

    pub fn proof_text(&self) -> Option<&str> {
        self.proof.as_ref().map(|p| p.text.as_str())
    }
}
