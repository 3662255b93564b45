//! The one prompt strategy, parameterised by a partition policy.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::checker::{CheckerAdapter, CheckerFactory, CheckerSession, Verdict};
use crate::error::{Error, Result};
use crate::model::ChatMessage;
use crate::partition::{Partition, PartitionPolicy};
use crate::theorem::{ProofDialect, SourceDocument, StatementRanges, Theorem};

use super::PromptStrategy;

/// Prompt strategy over the theorems of one source file.
///
/// The partition policy picks the examples and the evaluation targets; the
/// dialect drives the instruction text. With context annotations enabled,
/// example proofs carry a goal comment above every step.
pub struct TheoremPrompt<F: CheckerFactory> {
    session: CheckerSession<F>,
    document: Arc<SourceDocument>,
    theorems: Vec<Theorem>,
    policy: PartitionPolicy,
    partition: Partition,
    dialect: ProofDialect,
    annotate: bool,
    ranges: Arc<StatementRanges>,
}

impl<F: CheckerFactory> TheoremPrompt<F> {
    /// Parse the file through the checker and partition its theorems.
    pub fn new<R: Rng + ?Sized>(
        mut session: CheckerSession<F>,
        document: SourceDocument,
        policy: PartitionPolicy,
        dialect: ProofDialect,
        rng: &mut R,
    ) -> Result<Self> {
        let theorems = session.adapter_mut()?.parse_file()?;
        let partition = policy.partition(&theorems, rng)?;

        info!(
            strategy = policy.name(),
            theorems = theorems.len(),
            train = partition.train().len(),
            test = partition.test().len(),
            "Prompt strategy ready"
        );

        Ok(Self {
            session,
            document: Arc::new(document),
            theorems,
            policy,
            partition,
            dialect,
            annotate: false,
            ranges: Arc::new(HashMap::new()),
        })
    }

    /// No examples; every proved theorem is a target.
    pub fn basic(
        session: CheckerSession<F>,
        document: SourceDocument,
        dialect: ProofDialect,
    ) -> Result<Self> {
        // Deterministic policy; the generator is never drawn from.
        let mut rng = StdRng::seed_from_u64(0);
        Self::new(session, document, PartitionPolicy::All, dialect, &mut rng)
    }

    /// Caller-chosen examples and targets.
    pub fn k_shot(
        session: CheckerSession<F>,
        document: SourceDocument,
        dialect: ProofDialect,
        train: Vec<String>,
        test: Vec<String>,
    ) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(0);
        Self::new(
            session,
            document,
            PartitionPolicy::Explicit { train, test },
            dialect,
            &mut rng,
        )
    }

    /// Random examples among proved theorems.
    pub fn random_split<R: Rng + ?Sized>(
        session: CheckerSession<F>,
        document: SourceDocument,
        dialect: ProofDialect,
        train_fraction: f64,
        retention: f64,
        rng: &mut R,
    ) -> Result<Self> {
        Self::new(
            session,
            document,
            PartitionPolicy::RandomFraction {
                train_fraction,
                retention,
            },
            dialect,
            rng,
        )
    }

    /// Solved theorems as examples, unfinished ones as targets.
    pub fn solve_admitted<R: Rng + ?Sized>(
        session: CheckerSession<F>,
        document: SourceDocument,
        dialect: ProofDialect,
        token_limit: Option<usize>,
        rng: &mut R,
    ) -> Result<Self> {
        Self::new(
            session,
            document,
            PartitionPolicy::AdmittedVsSolved { token_limit },
            dialect,
            rng,
        )
    }

    /// Show the goal before every step of the example proofs.
    pub fn with_context_annotations(mut self) -> Self {
        self.annotate = true;
        self
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn session(&self) -> &CheckerSession<F> {
        &self.session
    }

    fn theorem_named(&self, name: &str) -> Result<&Theorem> {
        self.theorems
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::config(format!("theorem `{}` is not in the parsed file", name)))
    }

    fn example_proof(&self, theorem: &Theorem) -> String {
        match theorem.proof {
            Some(ref proof) if self.annotate => proof.annotated(&self.dialect),
            Some(ref proof) => proof.text.clone(),
            None => self.dialect.give_up_proof(),
        }
    }
}

impl<F: CheckerFactory> PromptStrategy for TheoremPrompt<F> {
    fn strategy_name(&self) -> String {
        if self.annotate {
            format!("{}_with_context", self.policy.name())
        } else {
            self.policy.name().to_string()
        }
    }

    fn system_instruction(&self) -> String {
        let d = &self.dialect;
        let mut text = format!(
            "Generate proof of the theorem from user input in {lang}. \
             You should only generate proofs in {lang}. \
             Reply with the proof only, starting with `{start}`",
            lang = d.language,
            start = d.proof_start,
        );
        match d.proof_end {
            Some(ref end) => text.push_str(&format!(" and ending with `{}`.", end)),
            None => text.push('.'),
        }
        text.push_str(&format!(
            " Never use `{}`: a proof that gives up is a failure.",
            d.give_up
        ));
        if self.annotate {
            text.push_str(&format!(
                " In the examples, comments like `{}` show the goal before each step. \
                 They are there to help you; do not write them in your proof.",
                d.comment("goal: ...")
            ));
        }
        text
    }

    fn few_shot_history(&self) -> Vec<ChatMessage> {
        let mut history = Vec::with_capacity(self.partition.train().len() * 2);
        for name in self.partition.train() {
            let Ok(theorem) = self.theorem_named(name) else {
                continue;
            };
            history.push(ChatMessage::user(theorem.statement.clone()));
            history.push(ChatMessage::assistant(self.example_proof(theorem)));
        }
        history
    }

    fn evaluation_statements(&mut self) -> Result<Vec<String>> {
        let mut ranges = StatementRanges::new();
        let mut statements = Vec::with_capacity(self.partition.test().len());

        for name in self.partition.test() {
            let theorem = self.theorem_named(name)?;
            let range = theorem.source_range.ok_or_else(|| {
                Error::config(format!("theorem `{}` has no source range", name))
            })?;
            if ranges.insert(theorem.statement.clone(), range).is_some() {
                return Err(Error::config(format!(
                    "statement appears twice in the evaluation set: {}",
                    theorem.statement
                )));
            }
            statements.push(theorem.statement.clone());
        }

        self.ranges = Arc::new(ranges);
        Ok(statements)
    }

    fn verify(&mut self, statement: &str, proof: &str) -> Result<Verdict> {
        let context = self.context_for(statement)?;
        self.session.ensure_healthy()?;
        self.session
            .adapter_mut()?
            .check_proof(statement, proof, &context)
    }

    fn verify_batch(&mut self, statement: &str, proofs: &[String]) -> Result<Vec<Verdict>> {
        let context = self.context_for(statement)?;
        self.session.ensure_healthy()?;
        self.session
            .adapter_mut()?
            .check_proofs(&context, statement, proofs)
    }

    fn restart_checker_session(&mut self) -> Result<()> {
        self.session.restart()
    }

    fn poison_checker(&mut self, reason: &str) {
        self.session.poison(reason);
    }

    fn release_checker(&mut self) -> Result<()> {
        self.session.release()
    }

    fn statement_ranges(&self) -> Arc<StatementRanges> {
        Arc::clone(&self.ranges)
    }

    fn reference_proof(&self, statement: &str) -> Option<String> {
        self.theorems
            .iter()
            .find(|t| t.statement == statement)
            .and_then(|t| t.proof_text())
            .map(str::to_string)
    }

    fn source(&self) -> Arc<SourceDocument> {
        Arc::clone(&self.document)
    }

    fn dialect(&self) -> &ProofDialect {
        &self.dialect
    }
}

impl<F: CheckerFactory> TheoremPrompt<F> {
    /// Source text strictly before the line where `statement` starts.
    fn context_for(&self, statement: &str) -> Result<String> {
        let range = self
            .ranges
            .get(statement)
            .ok_or_else(|| Error::lookup(statement))?;
        Ok(self.document.prefix_before_line(range.start.line))
    }
}
