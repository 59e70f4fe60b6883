/*!
 * Error types for the slidelingo application.
 *
 * The taxonomy follows the failure policy of the pipeline: structural errors
 * (`ExtractionError`, `AddressMismatchError`) abort a job, while batch-level
 * errors (`BatchTranslationFailure`, `AcceleratorUnavailable`) only fail the
 * units involved. Everything uses the thiserror crate for ergonomic
 * definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to a model server
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The model itself raised (device out of memory, bad weights, ...)
    #[error("Model error: {0}")]
    ModelError(String),
}

/// The input could not be read as a presentation container
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// Not a zip archive, or the archive is truncated
    #[error("Not a readable presentation archive: {0}")]
    Archive(String),

    /// A part the format requires is absent
    #[error("Required part is missing: {0}")]
    MissingPart(String),

    /// A part is not well-formed XML
    #[error("Malformed XML in part {part}: {message}")]
    Xml {
        /// Archive path of the part
        part: String,
        /// Parser message
        message: String,
    },

    /// A relationship id is referenced but not declared
    #[error("Relationship {id} referenced from {part} does not exist")]
    BrokenRelationship {
        /// Part holding the reference
        part: String,
        /// The unresolved relationship id
        id: String,
    },
}

/// The unit list and the skeleton disagree about a structural address.
///
/// This can only be caused by a defect in extraction or reinsertion, never by
/// user input, so it is always fatal to the job.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Address mismatch at {address}: {reason}")]
pub struct AddressMismatchError {
    /// Display form of the offending address
    pub address: String,
    /// What went wrong
    pub reason: String,
}

/// A whole batch failed; only the units in that batch are affected
#[derive(Error, Debug, Clone)]
pub enum BatchTranslationFailure {
    /// The model server or model raised
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The batch call exceeded the configured timeout
    #[error("Batch call timed out after {0} seconds")]
    Timeout(u64),

    /// The model returned a different number of results than inputs
    #[error("Model returned {got} results for {expected} inputs")]
    LengthMismatch {
        /// Number of inputs in the batch
        expected: usize,
        /// Number of results returned
        got: usize,
    },

    /// The model call panicked or was aborted before answering
    #[error("Model call aborted: {0}")]
    Aborted(String),

    /// The scheduler shut down before answering
    #[error("Batch scheduler is not running")]
    SchedulerClosed,
}

/// The shared accelerator cannot be acquired any more
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Accelerator unavailable: {reason}")]
pub struct AcceleratorUnavailable {
    /// Why the device went away
    pub reason: String,
}

/// Outcome of asking the scheduler to run one batch
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    /// The batch failed on its own
    #[error(transparent)]
    Batch(#[from] BatchTranslationFailure),

    /// The device is gone, every queued batch fails
    #[error(transparent)]
    Unavailable(#[from] AcceleratorUnavailable),
}

/// Illegal text unit lifecycle transition
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unit {unit} cannot {action} while {state}")]
pub struct UnitStateError {
    /// Unit id
    pub unit: u64,
    /// Current state name
    pub state: &'static str,
    /// Attempted transition
    pub action: &'static str,
}

/// Errors that make a job end in the `failed` state
#[derive(Error, Debug, Clone)]
pub enum JobError {
    /// The input document could not be parsed
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// Skeleton and unit list diverged
    #[error("Reinsertion failed: {0}")]
    AddressMismatch(#[from] AddressMismatchError),

    /// The output container could not be written
    #[error("Failed to write output document: {0}")]
    Write(String),

    /// A unit was driven through an illegal transition
    #[error("Unit lifecycle violated: {0}")]
    UnitState(#[from] UnitStateError),

    /// The caller cancelled the job
    #[error("Job was cancelled")]
    Cancelled,

    /// A pipeline stage panicked or was aborted
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors surfaced by the job submission and status interfaces
#[derive(Error, Debug)]
pub enum JobServiceError {
    /// No job with this id is known
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// The requested target language is not a valid ISO 639 code
    #[error("Invalid target language: {0}")]
    InvalidLanguage(String),

    /// The job record could not be persisted
    #[error("Job storage error: {0}")]
    Storage(String),

    /// A job was asked to move to a state it cannot reach
    #[error("Job cannot go from {from} to {to}")]
    IllegalTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },
}
