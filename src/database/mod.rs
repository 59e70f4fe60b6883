/*!
 * SQLite persistence of job records.
 *
 * - `connection`: connection wrapper with blocking-safe async access
 * - `schema`: versioned schema creation
 * - `repository`: `JobRepository` (upsert, get, list recent)
 */

pub mod connection;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use repository::JobRepository;
