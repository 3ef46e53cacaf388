//! SQLite repository.
//!
//! ## Schema
//!
//! ```text
//! collected_chapters
//! ├── identity_key    TEXT PRIMARY KEY   "One Piece 1100"
//! ├── subject_title   TEXT
//! ├── sequence_label  TEXT
//! ├── detail_title    TEXT
//! ├── link            TEXT
//! └── published_at    TEXT               RFC3339
//! ```
//!
//! `rusqlite` is blocking, so every call runs on the blocking thread pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags, params};

use crate::error::{AppError, Result};
use crate::models::ReleaseRecord;
use crate::storage::ReleaseRepository;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS collected_chapters (
    identity_key   TEXT PRIMARY KEY,
    subject_title  TEXT NOT NULL,
    sequence_label TEXT NOT NULL,
    detail_title   TEXT NOT NULL DEFAULT '',
    link           TEXT NOT NULL,
    published_at   TEXT NOT NULL
);";

const SELECT_ALL: &str = "
SELECT identity_key, subject_title, sequence_label, detail_title, link, published_at
FROM collected_chapters
ORDER BY identity_key";

const UPSERT: &str = "
INSERT INTO collected_chapters
    (identity_key, subject_title, sequence_label, detail_title, link, published_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT(identity_key) DO UPDATE SET
    subject_title = excluded.subject_title,
    sequence_label = excluded.sequence_label,
    detail_title = excluded.detail_title,
    link = excluded.link,
    published_at = excluded.published_at";

/// SQLite-backed repository.
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database file and ensure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        log::debug!("Opening SQLite database {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an existing database without creating or migrating anything.
    ///
    /// Writes through the returned repository fail.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("Opening SQLite database {} read-only", path.display());
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| AppError::storage("SQLite connection lock poisoned"))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| AppError::storage(format!("SQLite task failed: {e}")))?
    }

    fn upsert_row(conn: &Connection, key: &str, record: &ReleaseRecord) -> Result<()> {
        conn.execute(
            UPSERT,
            params![
                key,
                record.subject_title,
                record.sequence_label,
                record.detail_title,
                record.link,
                record.published_at,
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl ReleaseRepository for SqliteRepository {
    async fn load_all(&self) -> Result<Vec<(String, ReleaseRecord)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(SELECT_ALL)?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    ReleaseRecord {
                        subject_title: row.get(1)?,
                        sequence_label: row.get(2)?,
                        detail_title: row.get(3)?,
                        link: row.get(4)?,
                        published_at: row.get(5)?,
                    },
                ))
            })?;
            Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
        })
        .await
    }

    async fn upsert(&self, identity_key: &str, record: &ReleaseRecord) -> Result<()> {
        let key = identity_key.to_string();
        let record = record.clone();
        self.with_conn(move |conn| Self::upsert_row(conn, &key, &record))
            .await
    }

    async fn upsert_all(&self, rows: &[(String, ReleaseRecord)]) -> Result<usize> {
        let rows = rows.to_vec();
        self.with_conn(move |conn| {
            for (key, record) in &rows {
                if let Err(e) = Self::upsert_row(conn, key, record) {
                    log::error!("Error saving chapter {}: {}", key, e);
                    return Err(e);
                }
            }
            Ok(rows.len())
        })
        .await
    }
}
