use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::domain::{DomainError, Transcript};
use crate::ports::HistoryStore;

/// SQLite-backed transcript history.
///
/// Ordering contract: `list` returns rows newest first (descending id,
/// which is insertion order).
pub struct SqliteHistoryStore {
    connection: Mutex<Connection>,
}

impl SqliteHistoryStore {
    /// Open (or create) the history database at `path`.
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(path)?;
        let store = Self::from_connection(connection)?;
        info!(path = ?path, "History store opened");
        Ok(store)
    }

    /// In-memory store, used by tests and previews.
    pub fn open_in_memory() -> Result<Self, DomainError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, DomainError> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS transcriptions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                text TEXT NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn list(&self) -> Result<Vec<Transcript>, DomainError> {
        let connection = self.connection.lock();
        let mut statement = connection
            .prepare("SELECT id, timestamp, text FROM transcriptions ORDER BY id DESC")?;

        let transcripts = statement
            .query_map([], |row| {
                Ok(Transcript {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    text: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(transcripts)
    }

    async fn insert(&self, timestamp: &str, text: &str) -> Result<Transcript, DomainError> {
        let connection = self.connection.lock();
        connection.execute(
            "INSERT INTO transcriptions (timestamp, text) VALUES (?1, ?2)",
            params![timestamp, text],
        )?;
        let id = connection.last_insert_rowid();

        debug!(id, "Transcript saved to history");
        Ok(Transcript {
            id,
            timestamp: timestamp.to_string(),
            text: text.to_string(),
        })
    }

    async fn update(&self, id: i64, text: &str) -> Result<(), DomainError> {
        let changed = self.connection.lock().execute(
            "UPDATE transcriptions SET text = ?1 WHERE id = ?2",
            params![text, id],
        )?;

        if changed == 0 {
            return Err(DomainError::PersistenceFailed(format!(
                "no transcript with id {}",
                id
            )));
        }
        debug!(id, "Transcript updated");
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.connection
            .lock()
            .execute("DELETE FROM transcriptions WHERE id = ?1", params![id])?;
        debug!(id, "Transcript deleted");
        Ok(())
    }
}
