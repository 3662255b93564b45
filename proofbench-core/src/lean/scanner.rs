//! Line-oriented scanner for theorems in Lean 4 source.
//!
//! A declaration block starts at a `theorem`/`lemma` line (attributes and
//! modifiers allowed) and runs until the next top-level command. Blank lines
//! end it only when no indented continuation follows them. Everything before the first `:=` is the statement, the rest is
//! the proof.

use regex::Regex;

use crate::error::{Error, Result};
use crate::theorem::{utf16_len, Position, ProofBody, ProofDialect, ProofStep, Range, SourceDocument, Theorem};

/// Scanner for theorem declarations in Lean files.
pub struct LeanScanner {
    theorem_re: Regex,
    command_re: Regex,
    dialect: ProofDialect,
}

impl LeanScanner {
    pub fn new() -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|e| Error::Internal(format!("invalid scanner pattern: {}", e)))
        };
        Ok(Self {
            theorem_re: compile(
                r"^\s*(?:@\[[^\]]*\]\s*)?(?:(?:private|protected|noncomputable|nonrec)\s+)*(?:theorem|lemma)\s+([^\s:(\[{]+)",
            )?,
            command_re: compile(
                r"^\s*(?:@\[|theorem\b|lemma\b|def\b|example\b|abbrev\b|instance\b|structure\b|inductive\b|class\b|namespace\b|section\b|end\b|open\b|variable\b|universe\b|import\b|set_option\b|#|private\b|protected\b|noncomputable\b)",
            )?,
            dialect: ProofDialect::lean4(),
        })
    }

    /// Scan a document for theorems, in source order.
    pub fn scan(&self, doc: &SourceDocument) -> Vec<Theorem> {
        let lines: Vec<&str> = doc
            .lines()
            .iter()
            .map(|l| l.strip_suffix('\r').unwrap_or(l.as_str()))
            .collect();

        let mut theorems = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let Some(caps) = self.theorem_re.captures(lines[i]) else {
                i += 1;
                continue;
            };
            let name = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();

            let last = self.block_end(&lines, i);
            theorems.push(self.build_theorem(name, &lines, i, last));
            i = last + 1;
        }

        tracing::debug!(count = theorems.len(), "Scanned Lean theorems");
        theorems
    }

    /// Index of the last line of the block starting at `start`.
    fn block_end(&self, lines: &[&str], start: usize) -> usize {
        let indent = indent_of(lines[start]);
        let mut last = start;
        let mut after_blank = false;
        for (idx, line) in lines.iter().enumerate().skip(start + 1) {
            if line.trim().is_empty() {
                after_blank = true;
                continue;
            }
            if self.command_re.is_match(line) || (after_blank && indent_of(line) <= indent) {
                break;
            }
            last = idx;
            after_blank = false;
        }
        last
    }

    fn build_theorem(&self, name: String, lines: &[&str], first: usize, last: usize) -> Theorem {
        let indent = indent_of(lines[first]);
        let mut block = lines[first..=last].join("\n");
        block.replace_range(..indent, "");
        let block = block.trim_end().to_string();

        let start = Position::new(first as u32, utf16_len(&lines[first][..indent]));
        let end = Position::new(last as u32, utf16_len(lines[last].trim_end()));
        let range = Range::new(start, end);

        let theorem = match block.find(":=") {
            Some(split) => {
                let statement = block[..split].trim_end().to_string();
                let proof_text = block[split..].to_string();
                let steps = tactic_steps(&proof_text);
                Theorem::new(name, statement)
                    .with_proof(ProofBody::new(proof_text, &self.dialect).with_steps(steps))
            }
            None => Theorem::new(name, block),
        };
        theorem.with_range(range)
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Tactic lines of a `:= by` proof; empty for term-mode proofs.
fn tactic_steps(proof: &str) -> Vec<ProofStep> {
    let Some(rest) = proof
        .strip_prefix(":=")
        .map(str::trim_start)
        .and_then(|p| p.strip_prefix("by"))
    else {
        return Vec::new();
    };
    if rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return Vec::new();
    }
    rest.split('\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ProofStep::new)
        .collect()
}
