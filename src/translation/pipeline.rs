/*!
 * Pipeline orchestrator.
 *
 * Runs one document through extraction, batched translation and
 * reinsertion. Per-unit failures never stop a job; structural failures
 * always do:
 *
 * - extraction error -> `failed`, no output
 * - batch failure -> the batch's units fall back to their source text
 * - accelerator gone -> this and every remaining batch of the job fails
 * - reinsertion error -> `failed`, partial output discarded
 * - cancellation -> `failed` at the next batch boundary, no reinsertion
 *
 * There are no automatic retries; resubmitting is the caller's decision.
 */

use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::document::{ExtractOptions, ExtractedDocument, Extractor, Reinserter, TextUnit};
use crate::errors::{JobError, SchedulerError};
use crate::jobs::model::{JobState, UnitCounts};

use super::batch::{Batch, BatchPlanner};
use super::glossary::Glossary;
use super::scheduler::BatchScheduler;
use super::translator::{ItemOutcome, LanguagePair};

/// Called with every state the job enters
pub type StateCallback = Arc<dyn Fn(JobState) + Send + Sync>;

/// Called with `(batches_done, batches_total)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Per-run context: languages, cancellation and observers
#[derive(Clone)]
pub struct JobContext {
    pub label: String,
    pub languages: LanguagePair,
    cancelled: Arc<AtomicBool>,
    on_state: Option<StateCallback>,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("label", &self.label)
            .field("languages", &self.languages)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl JobContext {
    pub fn new(label: impl Into<String>, languages: LanguagePair) -> Self {
        Self {
            label: label.into(),
            languages,
            cancelled: Arc::new(AtomicBool::new(false)),
            on_state: None,
            on_progress: None,
        }
    }

    /// Share a cancellation flag with the owner of the job
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn on_state(mut self, callback: StateCallback) -> Self {
        self.on_state = Some(callback);
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn enter(&self, state: JobState) {
        debug!("Job {} -> {}", self.label, state);
        if let Some(callback) = &self.on_state {
            callback(state);
        }
    }

    fn progress(&self, done: usize, total: usize) {
        if let Some(callback) = &self.on_progress {
            callback(done, total);
        }
    }
}

/// Result of one run
#[derive(Debug)]
pub struct PipelineOutcome {
    /// Terminal state reached
    pub state: JobState,
    pub counts: UnitCounts,
    /// Output document, absent for failed jobs
    pub output: Option<Vec<u8>>,
    /// Why the job failed
    pub error: Option<JobError>,
}

impl PipelineOutcome {
    fn failed(error: JobError, counts: UnitCounts) -> Self {
        Self {
            state: JobState::Failed,
            counts,
            output: None,
            error: Some(error),
        }
    }
}

/// Extraction -> batching -> translation -> reinsertion for one document
#[derive(Debug, Clone)]
pub struct DocumentPipeline {
    scheduler: BatchScheduler,
    planner: BatchPlanner,
    extract_options: ExtractOptions,
    glossary: Arc<Glossary>,
}

impl DocumentPipeline {
    pub fn new(scheduler: BatchScheduler, planner: BatchPlanner) -> Self {
        Self {
            scheduler,
            planner,
            extract_options: ExtractOptions::default(),
            glossary: Arc::new(Glossary::default()),
        }
    }

    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extract_options = options;
        self
    }

    pub fn with_glossary(mut self, glossary: Arc<Glossary>) -> Self {
        self.glossary = glossary;
        self
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// Run the whole pipeline for one document
    pub async fn run(&self, ctx: &JobContext, bytes: Vec<u8>) -> PipelineOutcome {
        ctx.enter(JobState::Extracting);
        let outcome = self.run_stages(ctx, bytes).await;

        match &outcome.error {
            Some(e) => error!("Job {} failed: {}", ctx.label, e),
            None => info!(
                "Job {} {}: {} units, {} translated, {} failed",
                ctx.label, outcome.state, outcome.counts.total, outcome.counts.translated, outcome.counts.failed
            ),
        }
        ctx.enter(outcome.state);
        outcome
    }

    async fn run_stages(&self, ctx: &JobContext, bytes: Vec<u8>) -> PipelineOutcome {
        let extractor = Extractor::new(self.extract_options);
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await;
        let ExtractedDocument { skeleton, mut units } = match extracted {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => return PipelineOutcome::failed(e.into(), UnitCounts::default()),
            Err(e) => return PipelineOutcome::failed(JobError::Internal(e.to_string()), UnitCounts::default()),
        };
        info!("Job {}: extracted {} units", ctx.label, units.len());

        if ctx.is_cancelled() {
            return PipelineOutcome::failed(JobError::Cancelled, count_units(&units));
        }

        ctx.enter(JobState::Translating);
        if let Err(e) = self.translate_units(ctx, &mut units).await {
            return PipelineOutcome::failed(e, count_units(&units));
        }

        ctx.enter(JobState::Reinserting);
        let counts = count_units(&units);
        let written = tokio::task::spawn_blocking(move || Reinserter::reinsert(&skeleton, &units)).await;
        let output = match written {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return PipelineOutcome::failed(e, counts),
            Err(e) => return PipelineOutcome::failed(JobError::Internal(e.to_string()), counts),
        };

        PipelineOutcome {
            state: if counts.failed == 0 {
                JobState::Completed
            } else {
                JobState::CompletedWithErrors
            },
            counts,
            output: Some(output),
            error: None,
        }
    }

    /// Drive every pending unit to a terminal state
    async fn translate_units(&self, ctx: &JobContext, units: &mut [TextUnit]) -> Result<(), JobError> {
        let batches = self.planner.plan(units);
        let total = batches.len();
        info!("Job {}: {} batches planned", ctx.label, total);
        ctx.progress(0, total);

        let mut unavailable: Option<String> = None;

        for (done, batch) in batches.iter().enumerate() {
            if ctx.is_cancelled() {
                warn!("Job {} cancelled before batch {}", ctx.label, batch.ordinal + 1);
                return Err(JobError::Cancelled);
            }

            if let Some(reason) = &unavailable {
                fail_batch(units, batch, reason)?;
                ctx.progress(done + 1, total);
                continue;
            }

            let texts = batch.source_texts(units);
            for &i in &batch.unit_indices {
                units[i].admit()?;
            }
            let terms = self.glossary.terms_for(&texts);

            let result = self
                .scheduler
                .submit(ctx.label.clone(), batch.ordinal, texts, ctx.languages.clone(), terms)
                .await;

            match result {
                Ok(outcomes) => apply_outcomes(units, batch, outcomes)?,
                Err(SchedulerError::Batch(e)) => fail_batch(units, batch, &e.to_string())?,
                Err(SchedulerError::Unavailable(e)) => {
                    warn!("Job {}: {}; failing remaining batches", ctx.label, e);
                    fail_batch(units, batch, &e.to_string())?;
                    unavailable = Some(e.to_string());
                }
            }
            ctx.progress(done + 1, total);
        }

        Ok(())
    }
}

fn apply_outcomes(units: &mut [TextUnit], batch: &Batch, outcomes: Vec<ItemOutcome>) -> Result<(), JobError> {
    for (&i, outcome) in batch.unit_indices.iter().zip(outcomes) {
        match outcome {
            ItemOutcome::Translated(text) => units[i].complete(text)?,
            ItemOutcome::Failed(reason) => {
                debug!("Unit {} at {} failed: {}", units[i].id(), units[i].address(), reason);
                units[i].fail(reason)?
            }
        }
    }
    Ok(())
}

fn fail_batch(units: &mut [TextUnit], batch: &Batch, reason: &str) -> Result<(), JobError> {
    for &i in &batch.unit_indices {
        units[i].fail(reason)?;
    }
    Ok(())
}

/// Count units by state
pub fn count_units(units: &[TextUnit]) -> UnitCounts {
    let mut counts = UnitCounts {
        total: units.len(),
        ..UnitCounts::default()
    };
    for unit in units {
        if !unit.source_text().trim().is_empty() {
            counts.sent += 1;
        }
        if unit.translated_text().is_some() {
            counts.translated += 1;
        } else if unit.is_failed() {
            counts.failed += 1;
        }
    }
    counts
}
