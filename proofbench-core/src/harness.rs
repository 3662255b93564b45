//! Entry points wiring the checker, prompt strategy and interaction loop.

use std::path::Path;

use tracing::info;

use crate::checker::{CheckerFactory, CheckerSession};
use crate::config::HarnessConfig;
use crate::error::Result;
use crate::interactor::{Interactor, RunReport};
use crate::lean::LeanReplFactory;
use crate::model::ModelAdapter;
use crate::prompt::TheoremPrompt;
use crate::run_context::{DirectorySink, RunContext};
use crate::theorem::SourceDocument;

/// Run context writing to `config.log_dir`, seeded from `config.seed`.
pub fn run_context(config: &HarnessConfig) -> RunContext {
    let sink = DirectorySink::new(&config.log_dir);
    match config.seed {
        Some(seed) => RunContext::seeded(sink, seed),
        None => RunContext::new(sink),
    }
}

/// Evaluate `model` on the theorems of a Lean file, checked by the REPL.
pub async fn run_lean_evaluation<M: ModelAdapter>(
    config: &HarnessConfig,
    source: impl AsRef<Path>,
    model: M,
    ctx: &mut RunContext,
) -> Result<RunReport> {
    let source = source.as_ref();
    let factory = LeanReplFactory::new(config.checker.clone(), source)
        .with_goals(config.annotate_examples);
    evaluate_file(config, factory, source, model, ctx).await
}

/// Evaluate `model` on the theorems of `source` with any checker.
pub async fn evaluate_file<F, M>(
    config: &HarnessConfig,
    factory: F,
    source: &Path,
    model: M,
    ctx: &mut RunContext,
) -> Result<RunReport>
where
    F: CheckerFactory,
    M: ModelAdapter,
{
    config.validate()?;
    info!(source = %source.display(), run_id = %ctx.run_id(), "Preparing evaluation");

    let document = SourceDocument::read(source)?;
    let session = CheckerSession::acquire(factory)?;
    let mut prompt = TheoremPrompt::new(
        session,
        document,
        config.partition.clone(),
        config.dialect.clone(),
        ctx.rng_mut(),
    )?;
    if config.annotate_examples {
        prompt = prompt.with_context_annotations();
    }

    let mut interactor = Interactor::new(model, prompt)
        .with_shots(config.shots)
        .with_mode(config.mode)
        .with_retry(config.retry);
    interactor.run(ctx).await
}
