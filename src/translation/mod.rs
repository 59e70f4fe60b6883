/*!
 * Batched translation against a single shared accelerator.
 *
 * - `batch`: greedy batch planning under character and unit budgets
 * - `accelerator`: the process-wide single-permit device gate
 * - `scheduler`: the FIFO batch queue and its worker
 * - `translator`: the model contract and the marker framing of batches
 * - `glossary`: terminology passed along with matching batches
 * - `pipeline`: the per-document orchestrator
 */

pub mod accelerator;
pub mod batch;
pub mod glossary;
pub mod pipeline;
pub mod scheduler;
pub mod translator;

pub use self::accelerator::AcceleratorGate;
pub use self::batch::{Batch, BatchPlanner};
pub use self::glossary::{Glossary, GlossaryTerm};
pub use self::pipeline::{DocumentPipeline, JobContext, PipelineOutcome};
pub use self::scheduler::{BatchScheduler, SchedulerConfig, SchedulerStats};
pub use self::translator::{ItemOutcome, LanguagePair, TranslationModel};
