use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Bump whenever the table layout changes. Older files are wiped, not migrated.
pub const SCHEMA_VERSION: i32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A stored value plus the time it was last written
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord<T> {
    pub value: T,
    pub saved_at: DateTime<Utc>,
}

/// Keyed JSON store for saved articles.
///
/// Rows are keyed by article url and kept in first-insert order; writing
/// an existing url replaces its payload without moving it.
pub struct ArticleDb {
    conn: Connection,
}

impl ArticleDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                // Let SQLite report the failure if this doesn't work
                let _ = std::fs::create_dir_all(parent);
            }
        }

        debug!("Opening article store at {}", path.display());
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version != SCHEMA_VERSION {
            if version != 0 {
                warn!(
                    "Article store schema v{} does not match v{}, discarding saved articles",
                    version, SCHEMA_VERSION
                );
            }
            conn.execute("DROP TABLE IF EXISTS saved_articles", [])?;
        }

        conn.execute(
            "CREATE TABLE IF NOT EXISTS saved_articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                data TEXT NOT NULL,
                saved_at INTEGER NOT NULL
            )",
            [],
        )?;

        // PRAGMA doesn't take bound parameters
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION))?;
        Ok(())
    }

    /// Insert or replace the value stored under `url`
    pub fn upsert<T: Serialize>(&self, url: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value)?;
        let now = Utc::now().timestamp();

        self.conn.execute(
            "INSERT INTO saved_articles (url, data, saved_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET data = excluded.data, saved_at = excluded.saved_at",
            params![url, data, now],
        )?;

        debug!("Stored article {}", url);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, url: &str) -> Result<Option<StoredRecord<T>>> {
        let row: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT data, saved_at FROM saved_articles WHERE url = ?1",
                params![url],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        row.map(|(data, saved_at)| decode(&data, saved_at)).transpose()
    }

    /// Every stored value in insertion order
    pub fn list_all<T: DeserializeOwned>(&self) -> Result<Vec<StoredRecord<T>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT data, saved_at FROM saved_articles ORDER BY id ASC")?;

        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut records = Vec::new();
        for row in rows {
            let (data, saved_at) = row?;
            records.push(decode(&data, saved_at)?);
        }
        Ok(records)
    }

    /// Remove the row for `url`. Returns false when nothing was stored.
    pub fn delete(&self, url: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM saved_articles WHERE url = ?1", params![url])?;
        debug!("Deleted {} row(s) for {}", removed, url);
        Ok(removed > 0)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM saved_articles", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn decode<T: DeserializeOwned>(data: &str, saved_at: i64) -> Result<StoredRecord<T>> {
    Ok(StoredRecord {
        value: serde_json::from_str(data)?,
        saved_at: DateTime::from_timestamp(saved_at, 0).unwrap_or_default(),
    })
}
