//! Run history database.
//!
//! A small SQLite wrapper recording every bisection run so results for a
//! given file hash can be looked up later without rescanning.

mod models;

use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

pub use models::{RunRecord, RunStatus};

/// Minimum schema version we know how to handle.
///
/// `0` means "no schema yet" (fresh DB).
const MIN_SUPPORTED_SCHEMA_VERSION: i32 = 0;

/// Latest schema version this crate knows about.
const CURRENT_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Failed to encode signatures: {0}")]
    Json(#[from] serde_json::Error),

    /// The database was created with a newer schema version than we support.
    #[error(
        "Unsupported schema version {found}; supported range is {min_supported}..={max_supported}"
    )]
    UnsupportedSchemaVersion { found: i32, min_supported: i32, max_supported: i32 },
}

pub type DbResult<T> = Result<T, DbError>;

/// SQLite-backed run history.
pub struct RunHistory {
    conn: Connection,
}

impl RunHistory {
    /// Open (or create) the history database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory database, mostly for tests.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a run and return its row id.
    pub fn insert_run(&self, record: &RunRecord) -> DbResult<i64> {
        let signatures = serde_json::to_string(&record.signatures)?;
        self.conn.execute(
            r#"
            INSERT INTO runs (
                file_path, file_sha256, file_len, scanner, status,
                localized_offset, upper_bound, signatures, iterations, scans,
                error, started_at, finished_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                record.file_path,
                record.file_sha256,
                record.file_len as i64,
                record.scanner,
                record.status.as_str(),
                record.localized_offset.map(|v| v as i64),
                record.upper_bound.map(|v| v as i64),
                signatures,
                record.iterations as i64,
                record.scans as i64,
                record.error,
                record.started_at,
                record.finished_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent runs first, optionally capped at `limit`.
    pub fn list_runs(&self, limit: Option<usize>) -> DbResult<Vec<RunRecord>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!("{SELECT_RUNS} ORDER BY id DESC LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit], map_run)?;
        collect_runs(rows)
    }

    /// Latest run recorded for a file hash.
    pub fn latest_for_hash(&self, sha256: &str) -> DbResult<Option<RunRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_RUNS} WHERE file_sha256 = ?1 ORDER BY id DESC LIMIT 1"))?;
        let rows = stmt.query_map(params![sha256], map_run)?;
        Ok(collect_runs(rows)?.into_iter().next())
    }
}

const SELECT_RUNS: &str = r#"
    SELECT file_path, file_sha256, file_len, scanner, status,
           localized_offset, upper_bound, signatures, iterations, scans,
           error, started_at, finished_at
    FROM runs
"#;

/// Intermediate row; signatures and status are decoded after the query.
struct RawRun {
    record: RunRecord,
    status: String,
    signatures: String,
}

fn map_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
    let file_len: i64 = row.get(2)?;
    let localized_offset: Option<i64> = row.get(5)?;
    let upper_bound: Option<i64> = row.get(6)?;
    let iterations: i64 = row.get(8)?;
    let scans: i64 = row.get(9)?;
    Ok(RawRun {
        record: RunRecord {
            file_path: row.get(0)?,
            file_sha256: row.get(1)?,
            file_len: file_len as u64,
            scanner: row.get(3)?,
            status: RunStatus::Failed,
            localized_offset: localized_offset.map(|v| v as u64),
            upper_bound: upper_bound.map(|v| v as u64),
            signatures: Vec::new(),
            iterations: iterations as u64,
            scans: scans as u64,
            error: row.get(10)?,
            started_at: row.get(11)?,
            finished_at: row.get(12)?,
        },
        status: row.get(4)?,
        signatures: row.get(7)?,
    })
}

fn collect_runs(
    rows: impl Iterator<Item = rusqlite::Result<RawRun>>,
) -> DbResult<Vec<RunRecord>> {
    let mut out = Vec::new();
    for row in rows {
        let raw = row?;
        let mut record = raw.record;
        // Unknown statuses from hand-edited rows read back as failed.
        record.status = raw.status.parse().unwrap_or(RunStatus::Failed);
        record.signatures = serde_json::from_str(&raw.signatures)?;
        out.push(record);
    }
    Ok(out)
}

fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    // Reject DBs created with a newer schema than we support.
    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS runs (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                file_path        TEXT NOT NULL,
                file_sha256      TEXT,
                file_len         INTEGER NOT NULL,
                scanner          TEXT NOT NULL,
                status           TEXT NOT NULL,
                localized_offset INTEGER,
                upper_bound      INTEGER,
                signatures       TEXT NOT NULL,
                iterations       INTEGER NOT NULL,
                scans            INTEGER NOT NULL,
                error            TEXT,
                started_at       TEXT NOT NULL,
                finished_at      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS runs_by_hash ON runs (file_sha256);

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
