//! Scripted model and checker doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::checker::{CheckerAdapter, CheckerFactory, Verdict};
use crate::error::{Error, Result};
use crate::lean::LeanScanner;
use crate::model::{ChatMessage, ModelAdapter};
use crate::theorem::{SourceDocument, Theorem};

/// Three Lean theorems; `two` is unfinished.
pub const FIXTURE: &str = "import Mathlib

theorem one : 1 = 1 := by
  rfl

theorem two : 2 = 2 := by
  sorry

theorem three : 3 = 3 := by
  rfl
";

pub fn fixture() -> (SourceDocument, Vec<Theorem>) {
    let doc = SourceDocument::from_text(FIXTURE);
    let theorems = LeanScanner::new().unwrap().scan(&doc);
    (doc, theorems)
}

/// What the mock checker does on its next batch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckBehavior {
    /// Accept proofs containing "good".
    Judge,
    /// Fail with a checker-internal error.
    Transient,
    /// Fail as if the process died.
    Unexpected,
}

#[derive(Debug, Default)]
pub struct CheckerStats {
    pub opened: usize,
    pub exits: usize,
    pub batch_calls: usize,
    pub contexts: Vec<String>,
}

pub struct MockChecker {
    theorems: Vec<Theorem>,
    stats: Arc<Mutex<CheckerStats>>,
    script: Arc<Mutex<VecDeque<CheckBehavior>>>,
    exited: bool,
}

fn judge(proof: &str) -> Verdict {
    if proof.contains("good") {
        Verdict::accepted()
    } else {
        Verdict::rejected(format!("cannot close goal with `{}`", proof))
    }
}

impl CheckerAdapter for MockChecker {
    fn parse_file(&mut self) -> Result<Vec<Theorem>> {
        Ok(self.theorems.clone())
    }

    fn check_proof(&mut self, _statement: &str, proof: &str, _context: &str) -> Result<Verdict> {
        Ok(judge(proof))
    }

    fn check_proofs(
        &mut self,
        context: &str,
        _statement: &str,
        proofs: &[String],
    ) -> Result<Vec<Verdict>> {
        let behavior = {
            let mut stats = self.stats.lock().unwrap();
            stats.batch_calls += 1;
            stats.contexts.push(context.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(CheckBehavior::Judge)
        };
        match behavior {
            CheckBehavior::Judge => Ok(proofs.iter().map(|p| judge(p)).collect()),
            CheckBehavior::Transient => Err(Error::checker_transient("checker restarted itself")),
            CheckBehavior::Unexpected => Err(Error::SubprocessComm("broken pipe".to_string())),
        }
    }

    fn exit(&mut self) -> Result<()> {
        if !self.exited {
            self.exited = true;
            self.stats.lock().unwrap().exits += 1;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCheckerFactory {
    theorems: Vec<Theorem>,
    stats: Arc<Mutex<CheckerStats>>,
    script: Arc<Mutex<VecDeque<CheckBehavior>>>,
}

impl MockCheckerFactory {
    pub fn with_theorems(theorems: Vec<Theorem>) -> Self {
        Self {
            theorems,
            ..Default::default()
        }
    }

    /// Behaviors for the next batch checks, across restarts.
    pub fn with_script(self, script: Vec<CheckBehavior>) -> Self {
        *self.script.lock().unwrap() = script.into();
        self
    }

    pub fn stats(&self) -> Arc<Mutex<CheckerStats>> {
        Arc::clone(&self.stats)
    }
}

impl CheckerFactory for MockCheckerFactory {
    type Adapter = MockChecker;

    fn open(&self) -> Result<MockChecker> {
        self.stats.lock().unwrap().opened += 1;
        Ok(MockChecker {
            theorems: self.theorems.clone(),
            stats: Arc::clone(&self.stats),
            script: Arc::clone(&self.script),
            exited: false,
        })
    }
}

/// Model that replays queued replies, then a fixed fallback.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Vec<String>>>>,
    fallback: String,
    pub history: Option<(String, Vec<ChatMessage>)>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: fallback.into(),
            history: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn then_reply(self, reply: Vec<&str>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.into_iter().map(str::to_string).collect()));
        self
    }

    pub fn then_fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(Error::llm_api("scripted", message)));
        self
    }

    /// Messages sampled so far.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ModelAdapter for ScriptedModel {
    fn init_history(&mut self, system: &str, history: &[ChatMessage]) {
        self.history = Some((system.to_string(), history.to_vec()));
    }

    async fn sample(&self, message: &str, choices: usize) -> Result<Vec<String>> {
        self.calls.lock().unwrap().push(message.to_string());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => Ok(vec![self.fallback.clone(); choices]),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
