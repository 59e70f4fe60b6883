/*!
 * Jobs: one document-processing run each.
 *
 * - `model`: job ids, states, records and status reports
 * - `store`: in-memory job table with optional SQLite write-through
 * - `service`: submit, status, cancel, wait, take output
 */

pub mod model;
pub mod service;
pub mod store;

pub use model::{JobId, JobRecord, JobState, JobStatus, OutputHandle, UnitCounts};
pub use service::JobService;
pub use store::JobStore;
