use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::database::{DatabaseConnection, JobRepository};
use crate::document::Extractor;
use crate::file_utils::FileManager;
use crate::jobs::{JobId, JobRecord, JobService, JobState, JobStatus, JobStore};
use crate::language_utils::normalize_language_code;
use crate::providers;
use crate::translation::accelerator::AcceleratorGate;
use crate::translation::batch::BatchPlanner;
use crate::translation::glossary::Glossary;
use crate::translation::pipeline::{DocumentPipeline, ProgressCallback};
use crate::translation::scheduler::{BatchScheduler, SchedulerConfig};
use crate::translation::translator::TranslationModel;

// @module: Application controller for presentation translation

/// Tally of one `translate` run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub completed_with_errors: usize,
    pub failed: usize,
    /// Inputs whose output already existed
    pub skipped: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record(&mut self, state: JobState) {
        match state {
            JobState::Completed => self.completed += 1,
            JobState::CompletedWithErrors => self.completed_with_errors += 1,
            _ => self.failed += 1,
        }
    }
}

/// Main application controller for presentation translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Model shared by every job through the scheduler
    model: Arc<dyn TranslationModel>,
    // @field: Job submission and tracking
    service: JobService,
}

impl Controller {
    /// Create a controller with the configured model and job database.
    ///
    /// Starts the batch scheduler, so it must be called inside a tokio runtime.
    pub fn with_config(config: Config) -> Result<Self> {
        let model = providers::build_model(&config.translation)
            .with_context(|| format!("Failed to create {} model", config.translation.provider.display_name()))?;

        let store = match Self::open_repository(&config) {
            Ok(repository) => JobStore::with_repository(repository),
            Err(e) => {
                warn!("Job history disabled, database unavailable: {:#}", e);
                JobStore::new()
            }
        };

        Self::with_model(config, model, Arc::new(store))
    }

    /// Create a controller around an explicit model and job store
    pub fn with_model(config: Config, model: Arc<dyn TranslationModel>, store: Arc<JobStore>) -> Result<Self> {
        let translation = &config.translation;

        let glossary = match &translation.glossary_path {
            Some(path) => {
                let glossary = Glossary::from_jsonl(path)?;
                info!("Loaded {} glossary terms from {:?}", glossary.len(), path);
                glossary
            }
            None => Glossary::default(),
        };

        let scheduler = BatchScheduler::start(
            model.clone(),
            Arc::new(AcceleratorGate::new()),
            SchedulerConfig {
                batch_timeout: Duration::from_secs(translation.timeout_secs),
                queue_capacity: translation.queue_capacity,
            },
        );
        let planner = BatchPlanner::new(translation.max_chars_per_batch, translation.max_units_per_batch);
        let pipeline = DocumentPipeline::new(scheduler, planner)
            .with_extract_options(config.extraction.options())
            .with_glossary(Arc::new(glossary));

        let service = JobService::new(pipeline, store, config.source_language.clone());

        Ok(Self { config, model, service })
    }

    fn open_repository(config: &Config) -> Result<JobRepository> {
        match &config.storage.database_path {
            Some(path) => Ok(JobRepository::new(DatabaseConnection::new(path)?)),
            None => JobRepository::new_default(),
        }
    }

    pub fn service(&self) -> &JobService {
        &self.service
    }

    /// Fail fast when the model server cannot be reached
    pub async fn check_model(&self) -> Result<()> {
        self.model
            .health_check()
            .await
            .with_context(|| format!("Model {} is not available", self.model.name()))
    }

    /// Translate every input concurrently; all jobs share one scheduler
    pub async fn run(&self, inputs: &[PathBuf], target_language: &str, force_overwrite: bool) -> Result<RunSummary> {
        let start_time = std::time::Instant::now();
        let target = normalize_language_code(target_language)?;

        let files = FileManager::collect_inputs(inputs)?;
        if files.is_empty() {
            return Err(anyhow!("No presentations found in {:?}", inputs));
        }

        info!(
            "Translating {} presentation(s) to {} with {}",
            files.len(),
            target,
            self.service.pipeline().scheduler().model_name()
        );

        let multi_progress = MultiProgress::new();
        let mut summary = RunSummary::default();
        let mut submitted = Vec::new();

        for input in files {
            let output_dir = self
                .config
                .storage
                .output_dir
                .clone()
                .unwrap_or_else(|| input.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(".")));
            let output_path = FileManager::generate_output_path(&input, &output_dir, &target);

            if output_path.exists() && !force_overwrite {
                warn!("Skipping {:?}, translation already exists (use -f to force overwrite)", input);
                summary.skipped += 1;
                continue;
            }

            match self.submit_file(&input, &target, &multi_progress) {
                Ok((id, progress_bar)) => submitted.push((id, input, output_path, progress_bar)),
                Err(e) => {
                    // Jobs already submitted keep running
                    error!("Failed: {:?}: {:#}", input, e);
                    summary.failed += 1;
                }
            }
        }

        let results = join_all(submitted.into_iter().map(|(id, input, output_path, progress_bar)| async move {
            let result = self.finish_job(id, &output_path).await;
            progress_bar.finish_and_clear();
            (input, output_path, result)
        }))
        .await;

        for (input, output_path, result) in results {
            match result {
                Ok(status) => {
                    match status.state {
                        JobState::Completed => info!("Success: {}", output_path.display()),
                        JobState::CompletedWithErrors => warn!(
                            "Done with {} untranslated run(s): {}",
                            status.failed_units,
                            output_path.display()
                        ),
                        _ => error!(
                            "Failed: {:?}: {}",
                            input,
                            status.error.as_deref().unwrap_or("unknown error")
                        ),
                    }
                    summary.record(status.state);
                }
                Err(e) => {
                    error!("Failed: {:?}: {:#}", input, e);
                    summary.failed += 1;
                }
            }
        }

        let stats = self.service.pipeline().scheduler().stats();
        info!(
            "{} completed, {} with errors, {} failed, {} skipped in {} ({} batches, {} units sent)",
            summary.completed,
            summary.completed_with_errors,
            summary.failed,
            summary.skipped,
            Self::format_duration(start_time.elapsed()),
            stats.batches_run,
            stats.units_sent
        );

        Ok(summary)
    }

    /// Read one input and start its job, with a progress bar of its own
    fn submit_file(&self, input: &Path, target: &str, multi_progress: &MultiProgress) -> Result<(JobId, ProgressBar)> {
        let bytes = FileManager::read_bytes(input)?;
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| input.display().to_string());

        let progress_bar = multi_progress.add(Self::progress_bar(&name));
        let callback_bar = progress_bar.clone();
        let progress: ProgressCallback = Arc::new(move |done: usize, total: usize| {
            callback_bar.set_length(total as u64);
            callback_bar.set_position(done as u64);
        });

        match self.service.submit_with_progress(&name, bytes, target, Some(progress)) {
            Ok(id) => Ok((id, progress_bar)),
            Err(e) => {
                multi_progress.remove(&progress_bar);
                Err(e.into())
            }
        }
    }

    /// Wait for a job and write its output
    async fn finish_job(&self, id: JobId, output_path: &Path) -> Result<JobStatus> {
        let status = self.service.wait(id).await?;

        if let Some(bytes) = self.service.take_output(id)? {
            FileManager::write_atomic(output_path, &bytes)?;
            if let Err(e) = self.service.record_output_file(id, output_path.to_path_buf()).await {
                warn!("Job {}: output location not recorded: {}", id, e);
            }
        }

        // Reflects the file handle recorded above
        Ok(self.service.status(id).unwrap_or(status))
    }

    /// Dump every unit of a presentation as one JSON object per line
    pub fn extract_to_jsonl<W: Write>(config: &Config, input: &Path, writer: &mut W) -> Result<usize> {
        let bytes = FileManager::read_bytes(input)?;
        let document = Extractor::new(config.extraction.options())
            .extract(&bytes)
            .with_context(|| format!("Failed to extract {:?}", input))?;

        for unit in &document.units {
            let line = serde_json::json!({
                "id": unit.id().0,
                "address": unit.address().to_string(),
                "state": unit.state().name(),
                "text": unit.source_text(),
                "formatting": unit.formatting(),
            });
            writeln!(writer, "{}", line)?;
        }

        Ok(document.units.len())
    }

    /// Most recent job records, from the database when one is attached
    pub async fn recent_jobs(&self, limit: usize) -> Result<Vec<JobRecord>> {
        match self.service.store().repository() {
            Some(repository) => repository.list_recent(limit).await,
            None => {
                let mut records = self.service.list();
                records.reverse();
                records.truncate(limit);
                Ok(records)
            }
        }
    }

    fn progress_bar(name: &str) -> ProgressBar {
        let progress_bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("#>-"));
        progress_bar.set_message(name.to_string());
        progress_bar
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
