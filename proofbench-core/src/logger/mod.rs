//! Result logger.
//!
//! Collects one [`ProofLogBlock`] per evaluated theorem and the attempt
//! histogram, then merges everything back into the source file.
//!
//! The logger is a small state machine:
//!
//! ```text
//! Idle --proof start--> InProof --attempt events--> InProof --proof end--> Idle
//! Idle --finish--> Finished
//! ```
//!
//! Every event goes through [`ResultLogger::transition`]; anything else is a
//! sequencing error and leaves the state untouched.

mod block;
mod histogram;
mod splice;

pub use block::{ProofLogBlock, BLOCK_END, BLOCK_START};
pub use histogram::{AttemptHistogram, PieConfig};
pub use splice::splice;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::run_context::RunContext;
use crate::theorem::{ProofDialect, Range, SourceDocument, StatementRanges};

/// Sentinel line before a silent-mode payload.
pub const SILENT_START: &str = "&start&return&message&";
/// Sentinel line after a silent-mode payload.
pub const SILENT_END: &str = "&end&return&message&";

/// What the run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Annotated log file and chart written through the output sink.
    #[default]
    Log,
    /// Source with solved theorems filled in, returned to the caller.
    Silent,
}

/// Lifecycle events accepted by the logger.
#[derive(Debug, Clone, Copy)]
pub enum LogEvent<'a> {
    ProofStart,
    Success {
        attempt: usize,
        theorem: usize,
        statement: &'a str,
        proof: &'a str,
    },
    Failure {
        attempt: usize,
        theorem: usize,
        statement: &'a str,
        proof: &'a str,
        error: &'a str,
    },
    Exception {
        attempt: usize,
        theorem: usize,
        error: &'a str,
    },
    CheckFail {
        error: &'a str,
    },
    ProofEnd {
        statement: &'a str,
        fallback: Option<&'a str>,
    },
    Finish,
}

impl LogEvent<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::ProofStart => "proof start",
            Self::Success { .. } => "successful attempt",
            Self::Failure { .. } => "failed attempt",
            Self::Exception { .. } => "attempt exception",
            Self::CheckFail { .. } => "checker failure",
            Self::ProofEnd { .. } => "proof end",
            Self::Finish => "evaluation finish",
        }
    }
}

#[derive(Debug)]
enum BlockState {
    Idle,
    InProof { block: ProofLogBlock, complete: bool },
    Finished,
}

impl BlockState {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InProof { .. } => "in proof",
            Self::Finished => "finished",
        }
    }
}

/// Result of [`ResultLogger::on_evaluation_finish`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EvaluationOutput {
    Logged {
        log_artifact: String,
        /// `None` when the chart could not be written.
        chart_artifact: Option<String>,
        text: String,
    },
    Silent {
        text: String,
        success: bool,
    },
}

impl EvaluationOutput {
    pub fn text(&self) -> &str {
        match self {
            Self::Logged { text, .. } | Self::Silent { text, .. } => text,
        }
    }

    /// Silent payload between sentinel lines, ready to print.
    pub fn framed(&self) -> Option<String> {
        match self {
            Self::Silent { text, success } => Some(format!(
                "{}\n{}\n{}\n{}\n",
                SILENT_START,
                text,
                if *success { "success" } else { "failure" },
                SILENT_END
            )),
            Self::Logged { .. } => None,
        }
    }
}

/// Accumulates attempt logs and statistics for one run.
pub struct ResultLogger {
    mode: OutputMode,
    dialect: ProofDialect,
    strategy: String,
    document: Arc<SourceDocument>,
    ranges: Arc<StatementRanges>,
    histogram: AttemptHistogram,
    state: BlockState,
    replacements: BTreeMap<Range, String>,
    pie: PieConfig,
}

impl ResultLogger {
    pub fn new(
        mode: OutputMode,
        dialect: ProofDialect,
        strategy: impl Into<String>,
        shots: usize,
        document: Arc<SourceDocument>,
        ranges: Arc<StatementRanges>,
    ) -> Self {
        Self {
            mode,
            dialect,
            strategy: strategy.into(),
            document,
            ranges,
            histogram: AttemptHistogram::new(shots),
            state: BlockState::Idle,
            replacements: BTreeMap::new(),
            pie: PieConfig::default(),
        }
    }

    pub fn with_pie_config(mut self, pie: PieConfig) -> Self {
        self.pie = pie;
        self
    }

    pub fn histogram(&self) -> &AttemptHistogram {
        &self.histogram
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, BlockState::Idle)
    }

    pub fn on_fetch_start(&self, theorem: usize, total: usize) {
        info!("Fetching potential proofs for theorem {}/{}", theorem, total);
    }

    pub fn on_fetch_end(&self) {
        info!("Fetching potential proofs finished");
    }

    pub fn on_theorem_proof_start(&mut self) -> Result<()> {
        self.transition(LogEvent::ProofStart)
    }

    pub fn on_success_attempt(
        &mut self,
        attempt: usize,
        theorem: usize,
        statement: &str,
        proof: &str,
    ) -> Result<()> {
        self.transition(LogEvent::Success {
            attempt,
            theorem,
            statement,
            proof,
        })
    }

    pub fn on_failed_attempt(
        &mut self,
        attempt: usize,
        theorem: usize,
        statement: &str,
        proof: &str,
        error: &str,
    ) -> Result<()> {
        self.transition(LogEvent::Failure {
            attempt,
            theorem,
            statement,
            proof,
            error,
        })
    }

    pub fn on_attempt_exception(&mut self, attempt: usize, theorem: usize, error: &str) -> Result<()> {
        self.transition(LogEvent::Exception {
            attempt,
            theorem,
            error,
        })
    }

    pub fn on_proof_check_fail(&mut self, error: &str) -> Result<()> {
        self.transition(LogEvent::CheckFail { error })
    }

    /// Close the current block. `fallback` is the proof from the source
    /// file, restored when no attempt succeeded.
    pub fn on_theorem_proof_end(&mut self, statement: &str, fallback: Option<&str>) -> Result<()> {
        self.transition(LogEvent::ProofEnd {
            statement,
            fallback,
        })
    }

    /// Merge all recorded blocks into the source and emit the result.
    pub fn on_evaluation_finish(&mut self, ctx: &mut RunContext) -> Result<EvaluationOutput> {
        self.transition(LogEvent::Finish)?;

        let pairs: Vec<(Range, String)> = std::mem::take(&mut self.replacements)
            .into_iter()
            .collect();
        let merged = splice(&self.document, &pairs)?;
        debug!(replacements = pairs.len(), "Merged result blocks");

        match self.mode {
            OutputMode::Silent => Ok(EvaluationOutput::Silent {
                text: merged,
                success: self.histogram.any_success(),
            }),
            OutputMode::Log => {
                let stamp = ctx.stamp();
                let date = ctx.clock().now().format("%Y-%m-%d %H:%M:%S");
                let header = self.dialect.block_comment(&format!(
                    " Date: {}\n Strat: {}",
                    date, self.strategy
                ));
                let text = format!("{}\n\n{}", header, merged);

                let log_name = format!("log_{}.{}", stamp, self.dialect.file_extension);
                let log_artifact = ctx.sink_mut().write_artifact(&log_name, &text)?;
                info!(artifact = %log_artifact, "Wrote evaluation log");

                let svg = self
                    .histogram
                    .to_svg_pie(&self.pie.clone().with_title(format!("{} ({})", self.strategy, date)));
                let chart_artifact = match ctx
                    .sink_mut()
                    .write_artifact(&format!("pie_{}.svg", stamp), &svg)
                {
                    Ok(locator) => Some(locator),
                    Err(e) => {
                        warn!(error = %e, "Failed to write attempt chart");
                        None
                    }
                };

                Ok(EvaluationOutput::Logged {
                    log_artifact,
                    chart_artifact,
                    text,
                })
            }
        }
    }

    /// Apply one event. Invalid events leave the state unchanged.
    pub fn transition(&mut self, event: LogEvent<'_>) -> Result<()> {
        let state = std::mem::replace(&mut self.state, BlockState::Finished);
        let (next, result) = self.step(state, event);
        self.state = next;
        result
    }

    fn step(&mut self, state: BlockState, event: LogEvent<'_>) -> (BlockState, Result<()>) {
        match (state, event) {
            (BlockState::Idle, LogEvent::ProofStart) => (
                BlockState::InProof {
                    block: ProofLogBlock::open(&self.dialect),
                    complete: false,
                },
                Ok(()),
            ),

            (
                BlockState::InProof {
                    mut block,
                    complete,
                },
                LogEvent::Success {
                    attempt,
                    theorem,
                    statement,
                    proof,
                },
            ) => {
                if !complete {
                    if let Err(e) = self.record_first_success(attempt, statement, proof) {
                        return (BlockState::InProof { block, complete }, Err(e));
                    }
                    info!("Attempt {} for theorem {} successful", attempt, theorem);
                }
                block.success(&self.dialect, attempt, theorem, statement, proof, !complete);
                (
                    BlockState::InProof {
                        block,
                        complete: true,
                    },
                    Ok(()),
                )
            }

            (
                BlockState::InProof {
                    mut block,
                    complete,
                },
                LogEvent::Failure {
                    attempt,
                    theorem,
                    statement,
                    proof,
                    error,
                },
            ) => {
                block.failure(&self.dialect, attempt, theorem, statement, proof, error);
                (BlockState::InProof { block, complete }, Ok(()))
            }

            (
                BlockState::InProof {
                    mut block,
                    complete,
                },
                LogEvent::Exception {
                    attempt,
                    theorem,
                    error,
                },
            ) => {
                info!(
                    "Attempt {} for theorem {} failed with an exception",
                    attempt, theorem
                );
                block.exception(&self.dialect, attempt, theorem, error);
                (BlockState::InProof { block, complete }, Ok(()))
            }

            (
                BlockState::InProof {
                    mut block,
                    complete,
                },
                LogEvent::CheckFail { error },
            ) => {
                block.check_failure(&self.dialect, error);
                (BlockState::InProof { block, complete }, Ok(()))
            }

            (
                BlockState::InProof {
                    mut block,
                    complete,
                },
                LogEvent::ProofEnd {
                    statement,
                    fallback,
                },
            ) => {
                let range = match self.range_of(statement) {
                    Ok(range) => range,
                    Err(e) => return (BlockState::InProof { block, complete }, Err(e)),
                };
                if !complete {
                    self.histogram.record_failure();
                    let proof = fallback
                        .map(str::to_string)
                        .unwrap_or_else(|| self.dialect.give_up_proof());
                    block.fallback(&self.dialect, statement, &proof);
                }
                let text = block.close(&self.dialect);
                if self.mode == OutputMode::Log {
                    self.replacements.insert(range, text);
                }
                (BlockState::Idle, Ok(()))
            }

            (BlockState::Idle, LogEvent::Finish) => (BlockState::Finished, Ok(())),

            (state, event) => {
                let err = Error::sequencing(format!(
                    "unexpected {} while {}",
                    event.name(),
                    state.name()
                ));
                (state, Err(err))
            }
        }
    }

    fn record_first_success(&mut self, attempt: usize, statement: &str, proof: &str) -> Result<()> {
        let range = match self.mode {
            OutputMode::Silent => Some(self.range_of(statement)?),
            OutputMode::Log => None,
        };
        self.histogram.record_success(attempt)?;
        if let Some(range) = range {
            self.replacements
                .insert(range, format!("{}\n{}", statement, proof));
        }
        Ok(())
    }

    fn range_of(&self, statement: &str) -> Result<Range> {
        self.ranges
            .get(statement)
            .copied()
            .ok_or_else(|| Error::lookup(statement))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_context::{FixedClock, MemorySink};
    use crate::test_support::fixture;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    const ONE: &str = "theorem one : 1 = 1";
    const THREE: &str = "theorem three : 3 = 3";

    fn logger(mode: OutputMode, shots: usize) -> ResultLogger {
        let (doc, theorems) = fixture();
        let ranges: StatementRanges = theorems
            .iter()
            .filter(|t| t.is_proved())
            .map(|t| (t.statement.clone(), t.source_range.unwrap()))
            .collect();
        ResultLogger::new(
            mode,
            ProofDialect::lean4(),
            "basic",
            shots,
            Arc::new(doc),
            Arc::new(ranges),
        )
    }

    fn context(sink: MemorySink) -> RunContext {
        let at = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        RunContext::seeded(sink, 0).with_clock(FixedClock(at))
    }

    #[test]
    fn test_rejects_out_of_order_events() {
        let mut log = logger(OutputMode::Log, 2);
        assert!(matches!(
            log.on_success_attempt(1, 1, ONE, ":= by good"),
            Err(Error::Sequencing(_))
        ));
        assert!(matches!(
            log.on_theorem_proof_end(ONE, None),
            Err(Error::Sequencing(_))
        ));

        log.on_theorem_proof_start().unwrap();
        assert!(matches!(
            log.on_theorem_proof_start(),
            Err(Error::Sequencing(_))
        ));
        let mut ctx = context(MemorySink::new());
        assert!(matches!(
            log.on_evaluation_finish(&mut ctx),
            Err(Error::Sequencing(_))
        ));
        // Failed transitions keep the open block usable.
        log.on_failed_attempt(1, 1, ONE, ":= by bad", "nope").unwrap();
        log.on_theorem_proof_end(ONE, Some(":= by\n  rfl")).unwrap();
        assert!(log.is_idle());

        log.on_evaluation_finish(&mut ctx).unwrap();
        assert!(matches!(
            log.on_theorem_proof_start(),
            Err(Error::Sequencing(_))
        ));
    }

    #[test]
    fn test_only_first_success_counts() {
        let mut log = logger(OutputMode::Log, 3);
        log.on_theorem_proof_start().unwrap();
        log.on_failed_attempt(1, 1, ONE, ":= by bad", "nope").unwrap();
        log.on_success_attempt(2, 1, ONE, ":= by good").unwrap();
        log.on_success_attempt(3, 1, ONE, ":= by good again").unwrap();
        log.on_theorem_proof_end(ONE, Some(":= by\n  rfl")).unwrap();

        assert_eq!(log.histogram().counts(), &[0, 1, 0, 0]);
    }

    #[test]
    fn test_incomplete_theorem_counts_as_failure() {
        let mut log = logger(OutputMode::Log, 2);
        log.on_theorem_proof_start().unwrap();
        log.on_attempt_exception(0, 1, "broken pipe").unwrap();
        log.on_proof_check_fail("restart").unwrap();
        log.on_theorem_proof_end(ONE, Some(":= by\n  rfl")).unwrap();

        assert_eq!(log.histogram().counts(), &[0, 0, 1]);
        assert_eq!(log.histogram().total(), 1);
    }

    #[test]
    fn test_unknown_statement_at_proof_end() {
        let mut log = logger(OutputMode::Log, 1);
        log.on_theorem_proof_start().unwrap();
        assert!(matches!(
            log.on_theorem_proof_end("theorem nope : False", None),
            Err(Error::Lookup { .. })
        ));
        assert!(!log.is_idle());
        assert_eq!(log.histogram().total(), 0);
    }

    #[test]
    fn test_log_mode_writes_artifacts() {
        let sink = MemorySink::new();
        let mut ctx = context(sink.clone());
        let mut log = logger(OutputMode::Log, 1);

        log.on_theorem_proof_start().unwrap();
        log.on_success_attempt(1, 1, THREE, ":= by good").unwrap();
        log.on_theorem_proof_end(THREE, Some(":= by\n  rfl")).unwrap();

        let output = log.on_evaluation_finish(&mut ctx).unwrap();
        let EvaluationOutput::Logged {
            log_artifact,
            chart_artifact,
            text,
        } = output
        else {
            panic!("expected log output");
        };
        assert_eq!(log_artifact, "memory://log_02_01__03_04_05.lean");
        assert_eq!(
            chart_artifact.as_deref(),
            Some("memory://pie_02_01__03_04_05.svg")
        );
        assert_eq!(sink.get("log_02_01__03_04_05.lean").as_deref(), Some(text.as_str()));

        let expected_tail = "/- {THEOREM PROOF LOG START} -/\n\
             /- Attempt 1 for theorem 1 -/\n\
             theorem three : 3 = 3\n:= by good\n\
             /- Attempt 1 for theorem 1 successful -/\n\
             \n\
             /- {THEOREM PROOF LOG END} -/\n";
        assert!(text.starts_with("/-\n Date: 2024-01-02 03:04:05\n Strat: basic\n-/\n\nimport Mathlib\n"));
        assert!(text.ends_with(expected_tail));
        // Untouched theorems survive verbatim.
        assert!(text.contains("theorem one : 1 = 1 := by\n  rfl\n"));
    }

    #[test]
    fn test_silent_mode_fills_in_first_success() {
        let mut ctx = context(MemorySink::new());
        let mut log = logger(OutputMode::Silent, 2);

        log.on_theorem_proof_start().unwrap();
        log.on_success_attempt(1, 1, ONE, ":= by first").unwrap();
        log.on_success_attempt(2, 1, ONE, ":= by second").unwrap();
        log.on_theorem_proof_end(ONE, Some(":= by\n  rfl")).unwrap();

        log.on_theorem_proof_start().unwrap();
        log.on_failed_attempt(1, 2, THREE, ":= by bad", "nope").unwrap();
        log.on_theorem_proof_end(THREE, Some(":= by\n  rfl")).unwrap();

        let output = log.on_evaluation_finish(&mut ctx).unwrap();
        assert_eq!(
            output.text(),
            "import Mathlib\n\ntheorem one : 1 = 1\n:= by first\n\n\
             theorem two : 2 = 2 := by\n  sorry\n\n\
             theorem three : 3 = 3 := by\n  rfl\n"
        );
        assert_eq!(
            output.framed().unwrap(),
            format!("{}\n{}\nsuccess\n{}\n", SILENT_START, output.text(), SILENT_END)
        );
    }

    #[test]
    fn test_empty_run_produces_original_text() {
        let mut ctx = context(MemorySink::new());
        let mut log = logger(OutputMode::Silent, 1);
        let output = log.on_evaluation_finish(&mut ctx).unwrap();
        assert_eq!(
            output,
            EvaluationOutput::Silent {
                text: crate::test_support::FIXTURE.to_string(),
                success: false
            }
        );
        assert!(output.framed().unwrap().contains("\nfailure\n"));
    }
}
