/*!
 * In-memory job table.
 *
 * Holds every job of the process together with its output bytes, its
 * cancellation flag and a watch channel that publishes state changes.
 * When a repository is attached, records are written through to SQLite at
 * submission and at terminal states.
 */

use log::warn;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::database::JobRepository;
use crate::errors::JobServiceError;

use super::model::{JobId, JobRecord, JobState, OutputHandle, UnitCounts};

struct JobEntry {
    record: JobRecord,
    output: Option<Vec<u8>>,
    cancel: Arc<AtomicBool>,
    state_tx: watch::Sender<JobState>,
}

/// Handles a freshly inserted job needs to run
#[derive(Debug, Clone)]
pub struct JobHandles {
    pub cancel: Arc<AtomicBool>,
    pub state_rx: watch::Receiver<JobState>,
}

/// Shared job table
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    repository: Option<JobRepository>,
}

impl std::fmt::Debug for JobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobStore")
            .field("jobs", &self.jobs.read().len())
            .field("persistent", &self.repository.is_some())
            .finish()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write records through to the given repository
    pub fn with_repository(repository: JobRepository) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            repository: Some(repository),
        }
    }

    pub fn repository(&self) -> Option<&JobRepository> {
        self.repository.as_ref()
    }

    /// Register a new job
    pub fn insert(&self, record: JobRecord) -> JobHandles {
        let (state_tx, state_rx) = watch::channel(record.state);
        let cancel = Arc::new(AtomicBool::new(false));
        let entry = JobEntry {
            record,
            output: None,
            cancel: cancel.clone(),
            state_tx,
        };
        self.jobs.write().insert(entry.record.id, entry);
        JobHandles { cancel, state_rx }
    }

    pub fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.read().get(&id).map(|entry| entry.record.clone())
    }

    /// All jobs, oldest first
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.read().values().map(|e| e.record.clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    pub fn subscribe(&self, id: JobId) -> Result<watch::Receiver<JobState>, JobServiceError> {
        self.with_entry(id, |entry| entry.state_tx.subscribe())
    }

    /// Move a running job to a non-terminal state
    pub fn advance(&self, id: JobId, state: JobState) -> Result<(), JobServiceError> {
        self.with_entry_mut(id, |entry| {
            entry.record.advance(state)?;
            entry.state_tx.send_replace(state);
            Ok(())
        })?
    }

    /// Record the terminal state, counts and output of a job.
    ///
    /// The record is persisted before watchers see the terminal state, so a
    /// caller woken by `wait` always finds the final record in storage.
    pub async fn finish(
        &self,
        id: JobId,
        state: JobState,
        counts: UnitCounts,
        output: Option<Vec<u8>>,
        error: Option<String>,
    ) -> Result<(), JobServiceError> {
        self.with_entry_mut(id, |entry| {
            if !state.is_terminal() {
                return Err(JobServiceError::IllegalTransition {
                    from: entry.record.state.to_string(),
                    to: state.to_string(),
                });
            }
            entry.record.advance(state)?;
            entry.record.counts = counts;
            entry.record.error = error;
            entry.record.output = output.as_ref().map(|_| OutputHandle::Memory);
            entry.output = output;
            Ok(())
        })??;

        let persisted = self.persist(id).await;
        self.with_entry(id, |entry| {
            entry.state_tx.send_replace(state);
        })?;
        persisted
    }

    /// Flag a job as cancelled; returns false when it already finished
    pub fn cancel(&self, id: JobId) -> Result<bool, JobServiceError> {
        self.with_entry_mut(id, |entry| {
            if entry.record.state.is_terminal() {
                return false;
            }
            entry.cancel.store(true, Ordering::SeqCst);
            entry.record.cancelled = true;
            true
        })
    }

    /// Hand the output bytes to the caller, once.
    ///
    /// The record stops pointing at in-memory output as soon as the bytes
    /// are gone; `set_output_file` records where they went.
    pub fn take_output(&self, id: JobId) -> Result<Option<Vec<u8>>, JobServiceError> {
        self.with_entry_mut(id, |entry| {
            let output = entry.output.take();
            if output.is_some() && entry.record.output == Some(OutputHandle::Memory) {
                entry.record.output = None;
            }
            output
        })
    }

    /// Point the output handle at the file the bytes were written to
    pub fn set_output_file(&self, id: JobId, path: std::path::PathBuf) -> Result<(), JobServiceError> {
        self.with_entry_mut(id, |entry| {
            entry.record.output = Some(OutputHandle::File(path));
        })
    }

    /// Persist the current record if a repository is attached
    pub async fn persist(&self, id: JobId) -> Result<(), JobServiceError> {
        let Some(repository) = &self.repository else {
            return Ok(());
        };
        let record = self.get(id).ok_or_else(|| JobServiceError::UnknownJob(id.to_string()))?;
        repository.upsert(&record).await.map_err(|e| {
            warn!("Failed to persist job {}: {}", id, e);
            JobServiceError::Storage(e.to_string())
        })
    }

    fn with_entry<T>(&self, id: JobId, f: impl FnOnce(&JobEntry) -> T) -> Result<T, JobServiceError> {
        let jobs = self.jobs.read();
        let entry = jobs.get(&id).ok_or_else(|| JobServiceError::UnknownJob(id.to_string()))?;
        Ok(f(entry))
    }

    fn with_entry_mut<T>(&self, id: JobId, f: impl FnOnce(&mut JobEntry) -> T) -> Result<T, JobServiceError> {
        let mut jobs = self.jobs.write();
        let entry = jobs.get_mut(&id).ok_or_else(|| JobServiceError::UnknownJob(id.to_string()))?;
        Ok(f(entry))
    }
}
