//! SQLite connection bootstrap and schema provisioning.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout so
//!   concurrent processes wait on each other's write locks.
//! - Opening never migrates. Provisioning is an explicit step, and a
//!   connection whose schema is behind is reported as [`SchemaState::Unprovisioned`].

pub mod migrations;

use std::path::Path;
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::error::{Error, Result};

/// How long a connection waits for another process's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Provisioning state of a registry database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// All migrations applied and the registry tables present.
    Provisioned,
    /// First-run setup has not happened (or stopped part way).
    Unprovisioned { version: u32 },
}

/// Opens (creating if needed) a SQLite database file without migrating it.
pub fn open_db(path: &Path) -> Result<Connection> {
    let started_at = Instant::now();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let conn = Connection::open(path).inspect_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to open registry database");
    })?;
    configure(&conn)?;

    tracing::debug!(
        path = %path.display(),
        duration_ms = started_at.elapsed().as_millis() as u64,
        "opened registry database"
    );
    Ok(conn)
}

/// Opens an in-memory database without migrating it.
pub fn open_db_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

/// Determine whether the schema has been provisioned.
///
/// Only an old `user_version` or a missing `extensions` table count as
/// unprovisioned; any other SQLite failure is returned as an error.
pub fn schema_state(conn: &Connection) -> Result<SchemaState> {
    let version = migrations::current_version(conn)?;
    let latest = migrations::latest_version();

    if version > latest {
        return Err(Error::UnsupportedSchemaVersion {
            db_version: version,
            latest_supported: latest,
        });
    }
    if version < latest || !table_exists(conn, "extensions")? {
        return Ok(SchemaState::Unprovisioned { version });
    }
    Ok(SchemaState::Provisioned)
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, bool>(0),
    )?;
    Ok(exists)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
