//! Interaction loop: fetch candidate proofs, verify them, record the result.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::checker::Verdict;
use crate::config::RetryPolicy;
use crate::error::{Error, Result};
use crate::logger::{AttemptHistogram, EvaluationOutput, OutputMode, ResultLogger};
use crate::model::ModelAdapter;
use crate::prompt::PromptStrategy;
use crate::run_context::RunContext;

/// Where the loop is for the current theorem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TheoremPhase {
    Fetching,
    Verifying,
    RecordingSuccess,
    RecordingFailure,
    Done,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub strategy: String,
    /// Solved over evaluated theorems; `0.0` when nothing was evaluated.
    pub success_ratio: f64,
    pub solved: u64,
    pub evaluated: u64,
    pub histogram: AttemptHistogram,
    pub output: EvaluationOutput,
}

/// Drives a model against a prompt strategy, one theorem at a time.
///
/// Two retry domains are kept apart. Model fetches are retried up to
/// `model_retry_limit` attempts. Verification distinguishes checker-reported
/// internal failures, retried up to `transient_retry_limit` attempts, from
/// every other non-fatal error, which poisons and restarts the checker
/// session. Each retry verifies a freshly fetched batch.
pub struct Interactor<M: ModelAdapter, P: PromptStrategy> {
    model: M,
    prompt: P,
    shots: usize,
    mode: OutputMode,
    retry: RetryPolicy,
}

impl<M: ModelAdapter, P: PromptStrategy> Interactor<M, P> {
    /// Install the strategy's instruction and examples as the model history.
    pub fn new(mut model: M, prompt: P) -> Self {
        let system = prompt.system_instruction();
        let history = prompt.few_shot_history();
        model.init_history(&system, &history);
        debug!(
            model = model.name(),
            examples = history.len() / 2,
            "Model history initialised"
        );
        Self {
            model,
            prompt,
            shots: 1,
            mode: OutputMode::Log,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_shots(mut self, shots: usize) -> Self {
        self.shots = shots;
        self
    }

    pub fn with_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn prompt(&self) -> &P {
        &self.prompt
    }

    /// Evaluate every statement of the strategy.
    ///
    /// The checker session is released before returning, whatever the
    /// outcome.
    pub async fn run(&mut self, ctx: &mut RunContext) -> Result<RunReport> {
        let outcome = self.evaluate(ctx).await;
        if let Err(e) = self.prompt.release_checker() {
            warn!(error = %e, "Failed to release checker session");
        }
        outcome
    }

    #[instrument(skip_all, fields(run_id = %ctx.run_id(), shots = self.shots))]
    async fn evaluate(&mut self, ctx: &mut RunContext) -> Result<RunReport> {
        if self.shots == 0 {
            return Err(Error::config("shots must be at least 1"));
        }

        let statements = self.prompt.evaluation_statements()?;
        let strategy = self.prompt.strategy_name();
        info!(
            strategy = %strategy,
            theorems = statements.len(),
            "Starting evaluation"
        );

        let mut logger = ResultLogger::new(
            self.mode,
            self.prompt.dialect().clone(),
            strategy.clone(),
            self.shots,
            self.prompt.source(),
            self.prompt.statement_ranges(),
        );

        let total = statements.len();
        for (idx, statement) in statements.iter().enumerate() {
            self.evaluate_theorem(&mut logger, idx + 1, total, statement)
                .await?;
        }

        let output = logger.on_evaluation_finish(ctx)?;
        let histogram = logger.histogram().clone();
        let solved = histogram.solved();
        let evaluated = histogram.total();
        let success_ratio = if evaluated == 0 {
            0.0
        } else {
            solved as f64 / evaluated as f64
        };

        info!(solved, evaluated, success_ratio, "Evaluation finished");

        Ok(RunReport {
            run_id: ctx.run_id(),
            strategy,
            success_ratio,
            solved,
            evaluated,
            histogram,
            output,
        })
    }

    async fn evaluate_theorem(
        &mut self,
        logger: &mut ResultLogger,
        theorem: usize,
        total: usize,
        statement: &str,
    ) -> Result<()> {
        enter(theorem, TheoremPhase::Fetching);
        let mut candidates = self.fetch(logger, theorem, total, statement).await?;
        logger.on_theorem_proof_start()?;

        enter(theorem, TheoremPhase::Verifying);
        let verdicts = self
            .verify_with_retries(logger, theorem, total, statement, &mut candidates)
            .await?;

        if verdicts.len() != candidates.len() {
            return Err(Error::Internal(format!(
                "checker returned {} verdicts for {} candidates",
                verdicts.len(),
                candidates.len()
            )));
        }

        let solved = verdicts.iter().any(|v| v.accepted);
        enter(
            theorem,
            if solved {
                TheoremPhase::RecordingSuccess
            } else {
                TheoremPhase::RecordingFailure
            },
        );
        for (idx, (proof, verdict)) in candidates.iter().zip(&verdicts).enumerate() {
            let attempt = idx + 1;
            if verdict.accepted {
                logger.on_success_attempt(attempt, theorem, statement, proof)?;
            } else {
                info!(attempt, theorem, "Attempt unsuccessful");
                logger.on_failed_attempt(attempt, theorem, statement, proof, &verdict.message)?;
            }
        }

        let fallback = self.prompt.reference_proof(statement);
        logger.on_theorem_proof_end(statement, fallback.as_deref())?;
        enter(theorem, TheoremPhase::Done);
        Ok(())
    }

    async fn verify_with_retries(
        &mut self,
        logger: &mut ResultLogger,
        theorem: usize,
        total: usize,
        statement: &str,
        candidates: &mut Vec<String>,
    ) -> Result<Vec<Verdict>> {
        let mut transient_failures = 0u32;
        let mut restarts = 0u32;

        loop {
            let err = match self.prompt.verify_batch(statement, candidates) {
                Ok(verdicts) => return Ok(verdicts),
                Err(e) => e,
            };

            if err.is_fatal() {
                return Err(err);
            }

            if err.is_checker_transient() {
                transient_failures += 1;
                logger.on_proof_check_fail(&err.to_string())?;
                if transient_failures >= self.retry.transient_retry_limit {
                    warn!(
                        theorem,
                        failures = transient_failures,
                        "Checker kept failing, giving up"
                    );
                    return Err(err);
                }
                warn!(theorem, error = %err, "Checker failed internally, retrying");
                *candidates = self.fetch(logger, theorem, total, statement).await?;
                continue;
            }

            logger.on_attempt_exception(0, theorem, &err.to_string())?;
            if let Some(limit) = self.retry.max_session_restarts {
                if restarts >= limit {
                    warn!(theorem, restarts, "Checker restart limit reached");
                    return Err(err);
                }
            }
            restarts += 1;
            warn!(theorem, error = %err, "Unexpected checker error, restarting session");
            self.prompt.poison_checker(&err.to_string());
            *candidates = self.fetch(logger, theorem, total, statement).await?;
            self.prompt.restart_checker_session()?;
        }
    }

    /// One batch of `shots` candidates, with model retries.
    async fn fetch(
        &self,
        logger: &ResultLogger,
        theorem: usize,
        total: usize,
        statement: &str,
    ) -> Result<Vec<String>> {
        logger.on_fetch_start(theorem, total);

        let mut attempt = 0;
        let candidates = loop {
            attempt += 1;
            let reply = self
                .sample_with_deadline(statement)
                .await
                .and_then(|reply| self.check_reply(reply));
            match reply {
                Ok(candidates) => break candidates,
                Err(e) if !e.is_fatal() && attempt < self.retry.model_retry_limit => {
                    warn!(
                        model = self.model.name(),
                        attempt,
                        error = %e,
                        "Model call failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        logger.on_fetch_end();
        Ok(candidates)
    }

    async fn sample_with_deadline(&self, statement: &str) -> Result<Vec<String>> {
        let call = self.model.sample(statement, self.shots);
        match self.retry.model_timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), call)
                .await
                .map_err(|_| Error::timeout(ms))?,
            None => call.await,
        }
    }

    fn check_reply(&self, reply: Vec<String>) -> Result<Vec<String>> {
        if reply.len() != self.shots {
            return Err(Error::adapter(
                self.model.name(),
                format!("expected {} completions, got {}", self.shots, reply.len()),
            ));
        }
        Ok(reply)
    }
}

fn enter(theorem: usize, phase: TheoremPhase) {
    debug!(theorem, phase = ?phase, "Theorem phase");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::checker::CheckerSession;
    use crate::prompt::TheoremPrompt;
    use crate::run_context::MemorySink;
    use crate::test_support::{fixture, CheckBehavior, CheckerStats, MockCheckerFactory, ScriptedModel, FIXTURE};
    use crate::theorem::ProofDialect;

    type Prompt = TheoremPrompt<MockCheckerFactory>;

    fn basic(script: Vec<CheckBehavior>) -> (Prompt, Arc<Mutex<CheckerStats>>) {
        let (doc, theorems) = fixture();
        let factory = MockCheckerFactory::with_theorems(theorems).with_script(script);
        let stats = factory.stats();
        let session = CheckerSession::acquire(factory).unwrap();
        let prompt = TheoremPrompt::basic(session, doc, ProofDialect::lean4()).unwrap();
        (prompt, stats)
    }

    fn ctx() -> RunContext {
        RunContext::seeded(MemorySink::new(), 0)
    }

    #[tokio::test]
    async fn test_all_accepted() {
        let (prompt, stats) = basic(vec![]);
        let model = ScriptedModel::new(":= by good");
        let calls = model.calls();
        let mut interactor = Interactor::new(model, prompt).with_mode(OutputMode::Silent);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 1.0);
        assert_eq!(report.solved, 2);
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.histogram.counts(), &[2, 0]);
        assert_eq!(report.strategy, "basic");

        let (system, history) = interactor.model().history.clone().unwrap();
        assert!(system.starts_with("Generate proof of the theorem from user input in Lean 4."));
        assert!(history.is_empty());
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["theorem one : 1 = 1", "theorem three : 3 = 3"]
        );

        let stats = stats.lock().unwrap();
        assert_eq!(stats.batch_calls, 2);
        assert_eq!(stats.exits, 1);
        assert!(!stats.contexts[0].contains("theorem one"));
        assert!(stats.contexts[1].contains("theorem two"));
        assert!(!stats.contexts[1].contains("theorem three"));
    }

    #[tokio::test]
    async fn test_late_success_lands_in_its_bucket() {
        let (prompt, _) = basic(vec![]);
        let model = ScriptedModel::new(":= by good").then_reply(vec![
            ":= by bad",
            ":= by bad",
            ":= by good",
        ]);
        let mut interactor = Interactor::new(model, prompt).with_shots(3);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 1.0);
        assert_eq!(report.histogram.counts(), &[1, 0, 1, 0]);

        let text = report.output.text();
        assert!(text.contains("Attempt 1 for theorem 1 unsuccessful"));
        assert!(text.contains("Attempt 3 for theorem 1 successful"));
        // Every candidate of the second theorem is recorded.
        assert!(text.contains("Attempt 3 for theorem 2 successful"));
    }

    #[tokio::test]
    async fn test_single_theorem_third_shot() {
        let (doc, theorems) = fixture();
        let session = CheckerSession::acquire(MockCheckerFactory::with_theorems(theorems)).unwrap();
        let prompt = TheoremPrompt::k_shot(
            session,
            doc,
            ProofDialect::lean4(),
            vec![],
            vec!["one".to_string()],
        )
        .unwrap();
        let model = ScriptedModel::new(":= by bad").then_reply(vec!["bad", "bad", "good"]);
        let mut interactor = Interactor::new(model, prompt).with_shots(3);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 1.0);
        assert_eq!(report.evaluated, 1);
        assert_eq!(report.histogram.counts(), &[0, 0, 1, 0]);
    }

    #[tokio::test]
    async fn test_nothing_accepted() {
        let (prompt, _) = basic(vec![]);
        let model = ScriptedModel::new(":= by bad");
        let mut interactor = Interactor::new(model, prompt)
            .with_shots(2)
            .with_mode(OutputMode::Silent);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 0.0);
        assert_eq!(report.histogram.counts(), &[0, 0, 2]);
        assert_eq!(report.histogram.total(), report.evaluated);
        assert_eq!(
            report.output,
            EvaluationOutput::Silent {
                text: FIXTURE.to_string(),
                success: false
            }
        );
    }

    #[tokio::test]
    async fn test_transient_errors_exhaust_after_three_checks() {
        let (prompt, stats) = basic(vec![CheckBehavior::Transient; 5]);
        let model = ScriptedModel::new(":= by good");
        let calls = model.calls();
        let mut interactor = Interactor::new(model, prompt);

        let err = interactor.run(&mut ctx()).await.unwrap_err();
        assert!(err.is_checker_transient());

        let stats = stats.lock().unwrap();
        assert_eq!(stats.batch_calls, 3);
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.exits, 1);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transient_error_recovers_with_fresh_batch() {
        let (prompt, stats) = basic(vec![CheckBehavior::Transient, CheckBehavior::Transient]);
        let model = ScriptedModel::new(":= by good");
        let mut interactor = Interactor::new(model, prompt);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 1.0);
        assert!(report
            .output
            .text()
            .contains("Checker responded with an error: Checker internal error: checker restarted itself"));
        assert_eq!(stats.lock().unwrap().batch_calls, 4);
    }

    #[tokio::test]
    async fn test_unexpected_error_restarts_session() {
        let (prompt, stats) = basic(vec![CheckBehavior::Unexpected]);
        let model = ScriptedModel::new(":= by good");
        let calls = model.calls();
        let mut interactor = Interactor::new(model, prompt);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 1.0);
        assert!(report
            .output
            .text()
            .contains("EXCEPTION message: Subprocess communication error: broken pipe"));

        let stats = stats.lock().unwrap();
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.exits, 2);
        assert_eq!(stats.batch_calls, 3);
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_restart_cap() {
        let (prompt, stats) = basic(vec![CheckBehavior::Unexpected; 2]);
        let model = ScriptedModel::new(":= by good");
        let mut interactor = Interactor::new(model, prompt)
            .with_retry(RetryPolicy::default().with_max_session_restarts(1));

        let err = interactor.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, Error::SubprocessComm(_)));
        let stats = stats.lock().unwrap();
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.batch_calls, 2);
    }

    #[tokio::test]
    async fn test_model_failures_are_retried() {
        let (prompt, _) = basic(vec![]);
        let model = ScriptedModel::new(":= by good")
            .then_fail("overloaded")
            .then_fail("overloaded");
        let mut interactor = Interactor::new(model, prompt);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.solved, 2);
    }

    #[tokio::test]
    async fn test_model_retry_exhaustion() {
        let (prompt, stats) = basic(vec![]);
        let model = ScriptedModel::new(":= by good")
            .then_fail("overloaded")
            .then_fail("overloaded")
            .then_fail("overloaded");
        let mut interactor = Interactor::new(model, prompt);

        let err = interactor.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, Error::LlmApi { .. }));
        let stats = stats.lock().unwrap();
        assert_eq!(stats.batch_calls, 0);
        assert_eq!(stats.exits, 1);
    }

    struct SlowModel;

    #[async_trait::async_trait]
    impl ModelAdapter for SlowModel {
        fn init_history(&mut self, _system: &str, _history: &[crate::model::ChatMessage]) {}

        async fn sample(&self, _message: &str, choices: usize) -> Result<Vec<String>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![":= by good".to_string(); choices])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_timeout() {
        let (prompt, stats) = basic(vec![]);
        let mut interactor = Interactor::new(SlowModel, prompt).with_retry(
            RetryPolicy::default()
                .with_model_timeout(100)
                .with_model_retry_limit(2),
        );

        let err = interactor.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { duration_ms: 100 }));
        assert_eq!(stats.lock().unwrap().batch_calls, 0);
    }

    #[tokio::test]
    async fn test_short_reply_is_a_model_error() {
        let (prompt, _) = basic(vec![]);
        let model = ScriptedModel::new(":= by good").then_reply(vec![":= by good"]);
        let mut interactor = Interactor::new(model, prompt)
            .with_shots(2)
            .with_retry(RetryPolicy::default().with_model_retry_limit(1));

        let err = interactor.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, Error::Adapter { .. }));
    }

    #[tokio::test]
    async fn test_empty_evaluation_set() {
        let (doc, theorems) = fixture();
        let session = CheckerSession::acquire(MockCheckerFactory::with_theorems(theorems)).unwrap();
        let prompt = TheoremPrompt::k_shot(
            session,
            doc,
            ProofDialect::lean4(),
            vec!["one".to_string()],
            vec![],
        )
        .unwrap();
        let mut interactor = Interactor::new(ScriptedModel::new(":= by good"), prompt);

        let report = interactor.run(&mut ctx()).await.unwrap();
        assert_eq!(report.success_ratio, 0.0);
        assert_eq!(report.evaluated, 0);
        assert_eq!(interactor.model().history.as_ref().unwrap().1.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_shots_rejected() {
        let (prompt, stats) = basic(vec![]);
        let mut interactor = Interactor::new(ScriptedModel::new(":= by good"), prompt).with_shots(0);

        let err = interactor.run(&mut ctx()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(stats.lock().unwrap().exits, 1);
    }
}
