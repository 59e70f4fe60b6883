/*!
 * Job model.
 *
 * A job wraps one document-processing run: what went in, how far it got,
 * how many units were translated or fell back to their source text, and
 * where the output is.
 */

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::errors::JobServiceError;

/// Job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Extracting,
    Translating,
    Reinserting,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::CompletedWithErrors | JobState::Failed)
    }

    /// Whether `next` directly follows `self`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Created, Extracting)
                | (Extracting, Translating)
                | (Translating, Reinserting)
                | (Reinserting, Completed)
                | (Reinserting, CompletedWithErrors)
                | (Created | Extracting | Translating | Reinserting, Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Created => write!(f, "created"),
            JobState::Extracting => write!(f, "extracting"),
            JobState::Translating => write!(f, "translating"),
            JobState::Reinserting => write!(f, "reinserting"),
            JobState::Completed => write!(f, "completed"),
            JobState::CompletedWithErrors => write!(f, "completed_with_errors"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(JobState::Created),
            "extracting" => Ok(JobState::Extracting),
            "translating" => Ok(JobState::Translating),
            "reinserting" => Ok(JobState::Reinserting),
            "completed" => Ok(JobState::Completed),
            "completed_with_errors" => Ok(JobState::CompletedWithErrors),
            "failed" => Ok(JobState::Failed),
            _ => Err(anyhow::anyhow!("Invalid job state: {}", s)),
        }
    }
}

/// Per-unit counts of a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCounts {
    /// Units extracted
    pub total: usize,
    /// Units that entered translation (non-blank)
    pub sent: usize,
    /// Units in `translated`, including blank ones
    pub translated: usize,
    /// Units in `failed`; these fell back to their source text
    pub failed: usize,
}

/// Where a finished job's output lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum OutputHandle {
    /// Held by the job service until taken
    Memory,
    /// Written to disk
    File(PathBuf),
}

impl fmt::Display for OutputHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputHandle::Memory => write!(f, "memory"),
            OutputHandle::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Hex SHA-256 of the input document
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Everything known about one job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Name the document was submitted under
    pub input_name: String,
    /// SHA-256 of the input bytes
    pub input_digest: String,
    pub source_language: String,
    pub target_language: String,
    pub state: JobState,
    pub counts: UnitCounts,
    pub cancelled: bool,
    /// Why the job failed
    pub error: Option<String>,
    pub output: Option<OutputHandle>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
    /// Terminal state timestamp (RFC 3339)
    pub finished_at: Option<String>,
}

impl JobRecord {
    pub fn new(input_name: impl Into<String>, input: &[u8], source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: JobId::new(),
            input_name: input_name.into(),
            input_digest: digest_bytes(input),
            source_language: source_language.into(),
            target_language: target_language.into(),
            state: JobState::Created,
            counts: UnitCounts::default(),
            cancelled: false,
            error: None,
            output: None,
            created_at: now.clone(),
            updated_at: now,
            finished_at: None,
        }
    }

    /// Move to `next`; illegal transitions leave the record untouched
    pub fn advance(&mut self, next: JobState) -> Result<(), JobServiceError> {
        if !self.state.can_transition_to(next) {
            return Err(JobServiceError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        let now = chrono::Utc::now().to_rfc3339();
        if next.is_terminal() {
            self.finished_at = Some(now.clone());
        }
        self.updated_at = now;
        self.state = next;
        Ok(())
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            id: self.id,
            state: self.state,
            counts: self.counts,
            failed_units: self.counts.failed,
            output: if self.state.is_terminal() { self.output.clone() } else { None },
            error: self.error.clone(),
        }
    }
}

/// Status report returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: JobId,
    pub state: JobState,
    pub counts: UnitCounts,
    /// Units that fell back to their source text
    pub failed_units: usize,
    /// Present once the job is terminal and produced output
    pub output: Option<OutputHandle>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
