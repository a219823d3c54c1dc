//! SQLite connection management and shared store handle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use awareness_core::config::DatabaseConfig;
use awareness_core::types::{ReportStatus, SessionId, UserId};

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Report not found for session {0}")]
    ReportNotFound(SessionId),

    #[error("Report already exists for session {0}")]
    ReportAlreadyExists(SessionId),

    #[error("Invalid report transition for session {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: SessionId,
        from: ReportStatus,
        to: ReportStatus,
    },

    #[error("Report for session {session_id} has moved past attempt {attempt}")]
    StaleAttempt { session_id: SessionId, attempt: u32 },

    #[error("Transition payload does not match target status {0}")]
    PayloadMismatch(ReportStatus),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    Join(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    entry_point TEXT NOT NULL,
    mbti_type TEXT,
    zodiac_sign TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS survey_answers (
    session_id TEXT NOT NULL,
    question_id INTEGER NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id),
    payload TEXT NOT NULL,
    answered_at TEXT NOT NULL,
    PRIMARY KEY (session_id, question_id)
);

CREATE TABLE IF NOT EXISTS reports (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    status TEXT NOT NULL,
    preview TEXT,
    analysis TEXT,
    error_message TEXT,
    error_detail TEXT,
    delivered INTEGER NOT NULL DEFAULT 0,
    delivery_error TEXT,
    attempt INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    generated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_reports_status_updated
    ON reports(status, updated_at);
";

/// Thread-safe SQLite store with connection pooling.
///
/// This is the single point of access for users, answers and reports.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct SqliteStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SqliteStore {
    /// Open (or create) the database file named in the configuration.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")
        });
        let pool = Pool::builder()
            .max_size(config.max_connections.max(1))
            .build(manager)?;

        tracing::info!(path = %config.path, "Opened SQLite store");
        Self::from_pool(pool)
    }

    /// A private in-memory database. Limited to one connection so every
    /// caller sees the same data.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.pragma_update(None, "foreign_keys", "ON"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::from_pool(pool)
    }

    /// Wrap an existing pool, creating the schema if needed.
    pub fn from_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        let conn = pool.get()?;
        conn.execute_batch(SCHEMA)?;
        drop(conn);
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Run `f` against a pooled connection on the blocking thread pool.
    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

/// Canonical timestamp text. Fixed width, so lexical order is time order.
pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad uuid {raw:?}: {e}")))
}

/// Which constraint an insert tripped over, if any.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Violation {
    Unique,
    ForeignKey,
}

pub(crate) fn constraint_violation(err: &rusqlite::Error) -> Option<Violation> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            match e.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    Some(Violation::Unique)
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(Violation::ForeignKey),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_lexically() {
        let early = Utc::now();
        let late = early + chrono::TimeDelta::milliseconds(1500);
        assert!(ts(&early) < ts(&late));
        assert_eq!(parse_ts(&ts(&early)).unwrap().timestamp_micros(), early.timestamp_micros());
    }

    #[test]
    fn schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("a.db").to_string_lossy().to_string(),
            ..Default::default()
        };
        SqliteStore::open(&config).unwrap();
        SqliteStore::open(&config).unwrap();
    }
}
