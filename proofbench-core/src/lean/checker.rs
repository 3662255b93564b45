//! Checker adapter backed by the Lean 4 REPL.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::checker::{CheckerAdapter, CheckerFactory, Verdict};
use crate::error::{Error, Result};
use crate::theorem::{ProofDialect, SourceDocument, Theorem};

use super::repl::{LeanRepl, LeanReplConfig};
use super::scanner::LeanScanner;
use super::types::{LeanResponse, TacticInfo};

/// Checks candidate proofs of theorems from one Lean source file.
pub struct LeanReplChecker {
    repl: LeanRepl,
    source_path: PathBuf,
    scanner: LeanScanner,
    dialect: ProofDialect,
    collect_goals: bool,
    /// Last elaborated context and the environment it produced.
    context_env: Option<(String, u64)>,
}

impl LeanReplChecker {
    pub fn spawn(config: LeanReplConfig, source_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            repl: LeanRepl::spawn(config)?,
            source_path: source_path.into(),
            scanner: LeanScanner::new()?,
            dialect: ProofDialect::lean4(),
            collect_goals: false,
            context_env: None,
        })
    }

    /// Attach the goal of every tactic step when parsing.
    pub fn with_goals(mut self, collect_goals: bool) -> Self {
        self.collect_goals = collect_goals;
        self
    }

    /// Environment after elaborating `context`; `None` for an empty context.
    fn environment_for(&mut self, context: &str) -> Result<Option<u64>> {
        if context.trim().is_empty() {
            return Ok(None);
        }
        if let Some((ref cached, env)) = self.context_env {
            if cached == context {
                return Ok(Some(env));
            }
        }

        let response = self.repl.execute_command(context, None)?;
        protocol_error(&response)?;
        let env = response.env.ok_or_else(|| {
            Error::checker_transient(format!(
                "context did not produce an environment: {}",
                response.format_errors()
            ))
        })?;
        if response.has_errors() {
            warn!(errors = %response.format_errors(), "Context elaborated with errors");
        }

        self.context_env = Some((context.to_string(), env));
        Ok(Some(env))
    }

    fn check_in(&mut self, env: Option<u64>, statement: &str, proof: &str) -> Result<Verdict> {
        if self.dialect.contains_give_up(proof) {
            return Ok(Verdict::rejected(format!(
                "proof uses `{}`",
                self.dialect.give_up
            )));
        }

        let code = format!("{}\n{}", statement, proof);
        let response = self.repl.execute_command(&code, env)?;
        protocol_error(&response)?;

        if response.is_success() {
            Ok(Verdict::accepted())
        } else {
            Ok(Verdict::rejected(response.format_errors()))
        }
    }
}

/// A `{"message": ..}` reply means the REPL failed on its own.
fn protocol_error(response: &LeanResponse) -> Result<()> {
    match response.message {
        Some(ref message) => Err(Error::checker_transient(message.clone())),
        None => Ok(()),
    }
}

/// Copy tactic goals onto the matching proof steps.
///
/// A tactic matches a step of a theorem when its (1-indexed) line falls in
/// the theorem's range and its text equals the step text. Each tactic is
/// used at most once.
pub fn attach_goals(theorems: &mut [Theorem], tactics: &[TacticInfo]) {
    let mut used = vec![false; tactics.len()];
    for theorem in theorems.iter_mut() {
        let (Some(range), Some(proof)) = (theorem.source_range, theorem.proof.as_mut()) else {
            continue;
        };
        for step in proof.steps.iter_mut() {
            let found = tactics.iter().enumerate().find(|(idx, info)| {
                let line = info.pos.line.saturating_sub(1);
                !used[*idx]
                    && (range.start.line..=range.end.line).contains(&line)
                    && info.tactic.trim() == step.text
            });
            if let Some((idx, info)) = found {
                used[idx] = true;
                step.goal = Some(info.goals.clone());
            }
        }
    }
}

impl CheckerAdapter for LeanReplChecker {
    fn parse_file(&mut self) -> Result<Vec<Theorem>> {
        let doc = SourceDocument::read(&self.source_path)?;
        let mut theorems = self.scanner.scan(&doc);

        if self.collect_goals {
            let response = self.repl.collect_tactics(&doc.text())?;
            protocol_error(&response)?;
            attach_goals(&mut theorems, &response.tactics);
            debug!(tactics = response.tactics.len(), "Collected proof goals");
        }
        Ok(theorems)
    }

    fn check_proof(&mut self, statement: &str, proof: &str, context: &str) -> Result<Verdict> {
        let env = self.environment_for(context)?;
        self.check_in(env, statement, proof)
    }

    fn check_proofs(
        &mut self,
        context: &str,
        statement: &str,
        proofs: &[String],
    ) -> Result<Vec<Verdict>> {
        let env = self.environment_for(context)?;
        proofs
            .iter()
            .map(|proof| self.check_in(env, statement, proof))
            .collect()
    }

    fn exit(&mut self) -> Result<()> {
        self.context_env = None;
        self.repl.shutdown()
    }
}

/// Spawns a fresh [`LeanReplChecker`] per session or restart.
#[derive(Debug, Clone)]
pub struct LeanReplFactory {
    config: LeanReplConfig,
    source_path: PathBuf,
    collect_goals: bool,
}

impl LeanReplFactory {
    pub fn new(config: LeanReplConfig, source_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            source_path: source_path.into(),
            collect_goals: false,
        }
    }

    pub fn with_goals(mut self, collect_goals: bool) -> Self {
        self.collect_goals = collect_goals;
        self
    }
}

impl CheckerFactory for LeanReplFactory {
    type Adapter = LeanReplChecker;

    fn open(&self) -> Result<LeanReplChecker> {
        Ok(LeanReplChecker::spawn(self.config.clone(), &self.source_path)?
            .with_goals(self.collect_goals))
    }
}
