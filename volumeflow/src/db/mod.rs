//! Database layer for volumeflow.
//!
//! SQLite persistence for the volume catalog and template staging records.
//! Enum-valued columns are stored as their canonical strings so rows stay
//! readable from the `sqlite3` shell.

mod schema;
mod staging;
mod volumes;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension};

use volumeflow_shared::{VolumeflowError, VolumeflowResult};

pub use staging::StagingStore;
pub use volumes::{NewVolume, VolumeStore};

/// Helper macro to convert rusqlite errors to VolumeflowError.
macro_rules! db_err {
    ($result:expr) => {
        $result.map_err(|e| VolumeflowError::Database(e.to_string()))
    };
}

pub(crate) use db_err;

/// SQLite database handle.
///
/// Thread-safe via `parking_lot::Mutex`. Domain-specific stores wrap this to
/// provide their APIs.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}

impl Database {
    /// Open or create the database.
    pub fn open(db_path: &Path) -> VolumeflowResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = db_err!(Connection::open(db_path))?;

        // - WAL mode: concurrent readers while a resume handler writes
        // - FULL sync: a persisted transition survives power loss
        db_err!(conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;
            PRAGMA foreign_keys=ON;
            PRAGMA busy_timeout=30000;
            "
        ))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, discarded on drop.
    pub fn open_in_memory() -> VolumeflowResult<Self> {
        let conn = db_err!(Connection::open_in_memory())?;
        db_err!(conn.execute_batch("PRAGMA foreign_keys=ON;"))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the database connection.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    fn init_schema(conn: &Connection) -> VolumeflowResult<()> {
        for sql in schema::all_schemas() {
            db_err!(conn.execute_batch(sql))?;
        }

        let current_version: Option<i32> = db_err!(
            conn.query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
        )?;

        match current_version {
            None => {
                let now = Utc::now().to_rfc3339();
                db_err!(conn.execute(
                    "INSERT INTO schema_version (id, version, updated_at) VALUES (1, ?1, ?2)",
                    rusqlite::params![schema::SCHEMA_VERSION, now],
                ))?;
                tracing::info!(
                    "Initialized database schema version {}",
                    schema::SCHEMA_VERSION
                );
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(VolumeflowError::Database(format!(
                    "Database schema version {} is newer than supported {}. Please upgrade volumeflow.",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(_) => {}
        }

        Ok(())
    }
}
