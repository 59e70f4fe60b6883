/*!
 * Job service.
 *
 * Entry point for callers: submit a document, poll or await its status,
 * cancel it, and fetch the output once it is terminal. Every job runs the
 * shared `DocumentPipeline` in its own task; the pipeline's scheduler keeps
 * accelerator use exclusive across all of them.
 */

use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::JobServiceError;
use crate::language_utils::normalize_language_code;
use crate::translation::pipeline::{DocumentPipeline, JobContext, ProgressCallback, StateCallback};
use crate::translation::translator::LanguagePair;

use super::model::{JobId, JobRecord, JobState, JobStatus};
use super::store::JobStore;

/// Submits documents as jobs and reports on them
#[derive(Debug, Clone)]
pub struct JobService {
    pipeline: Arc<DocumentPipeline>,
    store: Arc<JobStore>,
    source_language: String,
}

impl JobService {
    pub fn new(pipeline: DocumentPipeline, store: Arc<JobStore>, source_language: impl Into<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store,
            source_language: source_language.into(),
        }
    }

    pub fn pipeline(&self) -> &DocumentPipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Create a job and start it in the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, name: &str, bytes: Vec<u8>, target_language: &str) -> Result<JobId, JobServiceError> {
        self.submit_with_progress(name, bytes, target_language, None)
    }

    /// Like `submit`, reporting `(batches_done, batches_total)` as the job
    /// moves through translation
    pub fn submit_with_progress(
        &self,
        name: &str,
        bytes: Vec<u8>,
        target_language: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<JobId, JobServiceError> {
        let target = normalize_language_code(target_language)
            .map_err(|_| JobServiceError::InvalidLanguage(target_language.to_string()))?;

        let record = JobRecord::new(name, &bytes, self.source_language.clone(), target.clone());
        let id = record.id;
        let handles = self.store.insert(record);
        info!("Job {} submitted: {} -> {}", id, name, target);

        let store = self.store.clone();
        let on_state: StateCallback = Arc::new(move |state: JobState| {
            if state.is_terminal() {
                return;
            }
            if let Err(e) = store.advance(id, state) {
                warn!("Job {}: {}", id, e);
            }
        });

        let mut ctx = JobContext::new(format!("{} ({})", name, id), LanguagePair::new(self.source_language.clone(), target))
            .with_cancel_flag(handles.cancel)
            .on_state(on_state);
        if let Some(progress) = progress {
            ctx = ctx.on_progress(progress);
        }

        let pipeline = self.pipeline.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.persist(id).await {
                warn!("Job {} runs without a stored record: {}", id, e);
            }

            let outcome = pipeline.run(&ctx, bytes).await;
            let error = outcome.error.as_ref().map(|e| e.to_string());
            if let Err(e) = store
                .finish(id, outcome.state, outcome.counts, outcome.output, error)
                .await
            {
                error!("Job {} could not record its result: {}", id, e);
            }
        });

        Ok(id)
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus, JobServiceError> {
        self.store
            .get(id)
            .map(|record| record.status())
            .ok_or_else(|| JobServiceError::UnknownJob(id.to_string()))
    }

    pub fn record(&self, id: JobId) -> Result<JobRecord, JobServiceError> {
        self.store.get(id).ok_or_else(|| JobServiceError::UnknownJob(id.to_string()))
    }

    pub fn list(&self) -> Vec<JobRecord> {
        self.store.list()
    }

    /// Request cancellation; takes effect at the next batch boundary.
    /// Returns false when the job had already finished.
    pub fn cancel(&self, id: JobId) -> Result<bool, JobServiceError> {
        let cancelled = self.store.cancel(id)?;
        if cancelled {
            info!("Job {} cancellation requested", id);
        }
        Ok(cancelled)
    }

    /// Resolve once the job reaches a terminal state
    pub async fn wait(&self, id: JobId) -> Result<JobStatus, JobServiceError> {
        let mut state_rx = self.store.subscribe(id)?;
        state_rx
            .wait_for(|state| state.is_terminal())
            .await
            .map_err(|_| JobServiceError::UnknownJob(id.to_string()))?;
        self.status(id)
    }

    /// Take the output bytes of a finished job
    pub fn take_output(&self, id: JobId) -> Result<Option<Vec<u8>>, JobServiceError> {
        self.store.take_output(id)
    }

    /// Record that the output was written to `path`
    pub async fn record_output_file(&self, id: JobId, path: PathBuf) -> Result<(), JobServiceError> {
        self.store.set_output_file(id, path)?;
        self.store.persist(id).await
    }
}
