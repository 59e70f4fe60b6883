/*!
 * Batch scheduler.
 *
 * Every job hands its batches to one queue; a single worker task drains it,
 * holding the accelerator permit only for the duration of each model call.
 * Jobs submit one batch at a time and wait for its answer, so batches of
 * concurrent jobs interleave in FIFO order at batch granularity.
 *
 * Each model call runs in its own task, so a panicking model fails its batch
 * and the worker keeps going. A connection error followed by a failed health
 * check takes the accelerator offline for every queued batch.
 */

use log::{debug, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};

use crate::errors::{AcceleratorUnavailable, BatchTranslationFailure, ProviderError, SchedulerError};

use super::accelerator::AcceleratorGate;
use super::glossary::GlossaryTerm;
use super::translator::{check_outcomes, ItemOutcome, LanguagePair, TranslationModel};

/// One batch waiting for the device
#[derive(Debug)]
pub struct BatchRequest {
    /// Label of the submitting job, for logs
    pub job: String,
    /// Ordinal of the batch inside its job
    pub ordinal: usize,
    pub texts: Vec<String>,
    pub languages: LanguagePair,
    pub glossary: Vec<GlossaryTerm>,
    reply: oneshot::Sender<Result<Vec<ItemOutcome>, SchedulerError>>,
}

/// Scheduler settings
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// How long one model call may take before the batch fails
    pub batch_timeout: Duration,
    /// Number of batches that may wait in the queue
    pub queue_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_timeout: Duration::from_secs(120),
            queue_capacity: 64,
        }
    }
}

/// Counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub batches_run: usize,
    pub batches_failed: usize,
    pub units_sent: usize,
}

#[derive(Debug, Default)]
struct Counters {
    batches_run: AtomicUsize,
    batches_failed: AtomicUsize,
    units_sent: AtomicUsize,
}

/// Handle to the process-wide scheduler; cheap to clone
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    sender: mpsc::Sender<BatchRequest>,
    gate: Arc<AcceleratorGate>,
    counters: Arc<Counters>,
    model_name: String,
}

impl BatchScheduler {
    /// Spawn the worker; must be called inside a tokio runtime
    pub fn start(model: Arc<dyn TranslationModel>, gate: Arc<AcceleratorGate>, config: SchedulerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let counters = Arc::new(Counters::default());
        let model_name = model.name();

        tokio::spawn(run_worker(
            receiver,
            model,
            Arc::clone(&gate),
            Arc::clone(&counters),
            config.batch_timeout,
        ));

        Self {
            sender,
            gate,
            counters,
            model_name,
        }
    }

    /// Queue one batch and wait for its outcomes
    pub async fn submit(
        &self,
        job: impl Into<String>,
        ordinal: usize,
        texts: Vec<String>,
        languages: LanguagePair,
        glossary: Vec<GlossaryTerm>,
    ) -> Result<Vec<ItemOutcome>, SchedulerError> {
        let (reply, answer) = oneshot::channel();
        let request = BatchRequest {
            job: job.into(),
            ordinal,
            texts,
            languages,
            glossary,
            reply,
        };

        self.sender
            .send(request)
            .await
            .map_err(|_| SchedulerError::Batch(BatchTranslationFailure::SchedulerClosed))?;

        answer
            .await
            .map_err(|_| SchedulerError::Batch(BatchTranslationFailure::SchedulerClosed))?
    }

    pub fn gate(&self) -> &Arc<AcceleratorGate> {
        &self.gate
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            batches_run: self.counters.batches_run.load(Ordering::SeqCst),
            batches_failed: self.counters.batches_failed.load(Ordering::SeqCst),
            units_sent: self.counters.units_sent.load(Ordering::SeqCst),
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<BatchRequest>,
    model: Arc<dyn TranslationModel>,
    gate: Arc<AcceleratorGate>,
    counters: Arc<Counters>,
    batch_timeout: Duration,
) {
    while let Some(request) = receiver.recv().await {
        let result = run_batch(&request, &model, &gate, &counters, batch_timeout).await;
        if let Err(e) = &result {
            counters.batches_failed.fetch_add(1, Ordering::SeqCst);
            warn!("Batch {} of job {} failed: {}", request.ordinal + 1, request.job, e);
        }
        // The job may have gone away; nothing to do then
        let _ = request.reply.send(result);
    }
    debug!("Batch scheduler stopped");
}

async fn run_batch(
    request: &BatchRequest,
    model: &Arc<dyn TranslationModel>,
    gate: &AcceleratorGate,
    counters: &Counters,
    batch_timeout: Duration,
) -> Result<Vec<ItemOutcome>, SchedulerError> {
    let permit = gate.acquire().await?;

    counters.batches_run.fetch_add(1, Ordering::SeqCst);
    counters.units_sent.fetch_add(request.texts.len(), Ordering::SeqCst);
    let start_time = Instant::now();

    let call_model = Arc::clone(model);
    let texts = request.texts.clone();
    let languages = request.languages.clone();
    let glossary = request.glossary.clone();
    let call = tokio::spawn(async move {
        tokio::time::timeout(batch_timeout, call_model.translate_batch(&texts, &languages, &glossary)).await
    });
    // The permit is held until the task has finished, panicked or not
    let result = call.await;
    drop(permit);

    debug!(
        "Batch {} of job {} ({} units) ran in {:?}",
        request.ordinal + 1,
        request.job,
        request.texts.len(),
        start_time.elapsed()
    );

    match result {
        Err(e) => Err(BatchTranslationFailure::Aborted(e.to_string()).into()),
        Ok(Err(_)) => Err(BatchTranslationFailure::Timeout(batch_timeout.as_secs()).into()),
        Ok(Ok(Err(ProviderError::ConnectionError(message)))) => {
            Err(check_device(model.as_ref(), gate, batch_timeout, message).await)
        }
        Ok(Ok(Err(e))) => Err(BatchTranslationFailure::Provider(e).into()),
        Ok(Ok(Ok(outcomes))) => Ok(check_outcomes(&request.texts, outcomes)?),
    }
}

/// Decide whether a lost connection is a one-off or the device going away
async fn check_device(
    model: &dyn TranslationModel,
    gate: &AcceleratorGate,
    batch_timeout: Duration,
    message: String,
) -> SchedulerError {
    let health = tokio::time::timeout(batch_timeout, model.health_check()).await;
    let reason = match health {
        Ok(Ok(())) => {
            return BatchTranslationFailure::Provider(ProviderError::ConnectionError(message)).into();
        }
        Ok(Err(e)) => format!("{} (health check: {})", message, e),
        Err(_) => format!("{} (health check timed out)", message),
    };

    gate.mark_unavailable(reason.clone());
    AcceleratorUnavailable { reason }.into()
}
