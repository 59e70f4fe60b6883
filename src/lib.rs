/*!
 * # Slidelingo - presentation translation on a single local accelerator
 *
 * A Rust library that translates the text of PowerPoint presentations with a
 * locally hosted model while leaving every formatting attribute untouched.
 *
 * ## Features
 *
 * - Extract every text run of a `.pptx` (slides, tables, groups, speaker
 *   notes, charts) with a stable structural address
 * - Batch runs under character and unit budgets, one model call per batch
 * - Share one accelerator between any number of concurrent jobs, with at
 *   most one batch call on the device at a time
 * - Per-batch failure isolation: failed runs fall back to their source text
 * - Reinsert translations into the untouched document skeleton
 * - Job tracking with optional SQLite history
 * - ISO 639-1 and ISO 639-2 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: Container access, extraction and reinsertion
 * - `translation`: Batching, the accelerator gate, the scheduler and the
 *   per-document pipeline
 * - `providers`: Model implementations (`ollama`, `mock`)
 * - `jobs`: Job model, store and service
 * - `database`: SQLite persistence of job records
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod jobs;
pub mod language_utils;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use document::{Extractor, Reinserter, StructuralAddress, TextUnit};
pub use errors::{ExtractionError, JobError, JobServiceError, ProviderError};
pub use jobs::{JobId, JobService, JobState, JobStatus};
pub use language_utils::{get_language_name, normalize_language_code};
pub use translation::{BatchScheduler, DocumentPipeline, TranslationModel};
