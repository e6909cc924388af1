use rusqlite::{Connection, Transaction};
use std::{path::Path, sync::Arc};
use thiserror::Error;
use tokio::{fs, sync::Mutex};
use tracing::{error, info};

use crate::migrations;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

/// Shared handle to the bot's SQLite database.
///
/// A single connection sits behind an async mutex, so writes are serialized
/// and every closure passed to [`Database::transaction`] is committed before
/// the call returns.
#[derive(Clone, Debug)]
pub struct Database {
    inner: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create database directory: {}", e);
                DbError::Io(e)
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open database {}: {}", path.display(), e);
            DbError::Sqlite(e)
        })?;
        conn.execute_batch(PRAGMAS)?;
        migrations::run(&conn)?;

        info!("opened database at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
    pub async fn transaction<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, E>,
        E: From<rusqlite::Error>,
    {
        let mut guard = self.inner.lock().await;
        let tx = guard.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    pub async fn read<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R>,
    {
        let guard = self.inner.lock().await;
        Ok(f(&guard)?)
    }
}
