/*!
 * Repository layer for job records.
 *
 * Maps `JobRecord`s to the `jobs` table. Records are written whole
 * (upsert) since a job only ever moves forward.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;

use crate::jobs::model::{JobId, JobRecord, JobState, OutputHandle, UnitCounts};

use super::connection::DatabaseConnection;

const JOB_COLUMNS: &str = "id, input_name, input_digest, source_language, target_language, state, \
     units_total, units_sent, units_translated, units_failed, cancelled, error, output, \
     created_at, updated_at, finished_at";

/// Repository for job records
#[derive(Debug, Clone)]
pub struct JobRepository {
    /// Database connection
    db: DatabaseConnection,
}

impl JobRepository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_default()?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    /// Insert or replace a job record
    pub async fn upsert(&self, record: &JobRecord) -> Result<()> {
        let record = record.clone();
        self.db.execute_async(move |conn| Self::upsert_sync(conn, &record)).await
    }

    fn upsert_sync(conn: &Connection, record: &JobRecord) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                JOB_COLUMNS
            ),
            params![
                record.id.to_string(),
                record.input_name,
                record.input_digest,
                record.source_language,
                record.target_language,
                record.state.to_string(),
                record.counts.total as i64,
                record.counts.sent as i64,
                record.counts.translated as i64,
                record.counts.failed as i64,
                record.cancelled,
                record.error,
                record.output.as_ref().map(encode_output),
                record.created_at,
                record.updated_at,
                record.finished_at,
            ],
        )?;
        debug!("Persisted job {} ({})", record.id, record.state);
        Ok(())
    }

    /// Get a job by ID
    pub async fn get(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.db
            .execute_async(move |conn| {
                let record = conn
                    .query_row(
                        &format!("SELECT {} FROM jobs WHERE id = ?1", JOB_COLUMNS),
                        [id.to_string()],
                        row_to_record,
                    )
                    .optional()?;
                Ok(record)
            })
            .await
    }

    /// Most recently created jobs first
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<JobRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM jobs ORDER BY created_at DESC LIMIT ?1",
                    JOB_COLUMNS
                ))?;
                let records = stmt
                    .query_map([limit as i64], row_to_record)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await
    }
}

fn encode_output(output: &OutputHandle) -> String {
    match output {
        OutputHandle::Memory => "memory".to_string(),
        OutputHandle::File(path) => format!("file:{}", path.display()),
    }
}

fn decode_output(value: &str) -> Option<OutputHandle> {
    match value {
        "memory" => Some(OutputHandle::Memory),
        other => other.strip_prefix("file:").map(|p| OutputHandle::File(PathBuf::from(p))),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<JobRecord> {
    let id: String = row.get(0)?;
    let state: String = row.get(5)?;
    let output: Option<String> = row.get(12)?;

    Ok(JobRecord {
        id: id
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?,
        input_name: row.get(1)?,
        input_digest: row.get(2)?,
        source_language: row.get(3)?,
        target_language: row.get(4)?,
        state: state.parse().unwrap_or(JobState::Failed),
        counts: UnitCounts {
            total: row.get::<_, i64>(6)? as usize,
            sent: row.get::<_, i64>(7)? as usize,
            translated: row.get::<_, i64>(8)? as usize,
            failed: row.get::<_, i64>(9)? as usize,
        },
        cancelled: row.get(10)?,
        error: row.get(11)?,
        output: output.as_deref().and_then(decode_output),
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        finished_at: row.get(15)?,
    })
}
