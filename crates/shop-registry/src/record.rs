//! Persisted extension records and the queries over them.
//!
//! Every function here takes a plain `&Connection` so the same code runs on a
//! bare connection (reads) and inside a [`StoreTx`](crate::StoreTx) (writes).

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Opaque per-extension configuration.
pub type ExtensionConfig = Map<String, Value>;

/// Install/activation state of one extension.
///
/// `active` implies `installed`; the table enforces it with a CHECK
/// constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub code: String,
    pub name: String,
    pub version: String,
    pub installed: bool,
    pub active: bool,
    pub installed_at: Option<DateTime<Utc>>,
    pub config: ExtensionConfig,
}

const COLUMNS: &str = "code, name, version, installed, active, installed_at, config";

pub(crate) fn find_by_code(conn: &Connection, code: &str) -> Result<Option<ExtensionRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM extensions WHERE code = ?1"),
            [code],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

pub(crate) fn list(conn: &Connection, filter: RecordFilter) -> Result<Vec<ExtensionRecord>> {
    let clause = match filter {
        RecordFilter::All => "",
        RecordFilter::Installed => "WHERE installed = 1",
        RecordFilter::Active => "WHERE active = 1",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM extensions {clause} ORDER BY code ASC"
    ))?;
    let rows = stmt.query_map([], record_from_row)?;
    let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordFilter {
    All,
    Installed,
    Active,
}

pub(crate) fn mark_installed(
    conn: &Connection,
    code: &str,
    name: &str,
    version: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO extensions (code, name, version, installed, active, installed_at)
         VALUES (?1, ?2, ?3, 1, 0, ?4)
         ON CONFLICT (code) DO UPDATE SET
             name = excluded.name,
             version = excluded.version,
             installed = 1,
             installed_at = excluded.installed_at",
        params![code, name, version, format_timestamp(at)],
    )?;
    Ok(())
}

pub(crate) fn upsert_observed(conn: &Connection, code: &str, name: &str, version: &str) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT INTO extensions (code, name, version) VALUES (?1, ?2, ?3)
         ON CONFLICT (code) DO NOTHING",
        params![code, name, version],
    )?;
    Ok(inserted > 0)
}

pub(crate) fn mark_uninstalled(conn: &Connection, code: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE extensions SET installed = 0, active = 0 WHERE code = ?1",
        [code],
    )?;
    Ok(changed > 0)
}

pub(crate) fn set_active(conn: &Connection, code: &str, active: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE extensions SET active = ?2 WHERE code = ?1",
        params![code, active],
    )?;
    Ok(changed > 0)
}

pub(crate) fn merge_config(
    conn: &Connection,
    code: &str,
    patch: &ExtensionConfig,
) -> Result<ExtensionConfig> {
    let Some(record) = find_by_code(conn, code)? else {
        return Err(Error::RecordNotFound {
            code: code.to_string(),
        });
    };

    let mut config = record.config;
    for (key, value) in patch {
        config.insert(key.clone(), value.clone());
    }

    conn.execute(
        "UPDATE extensions SET config = ?2 WHERE code = ?1",
        params![code, serde_json::to_string(&config)?],
    )?;
    Ok(config)
}

pub(crate) fn purge(conn: &Connection, code: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM extensions WHERE code = ?1", [code])?;
    Ok(deleted > 0)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ExtensionRecord> {
    let installed_at: Option<String> = row.get("installed_at")?;
    let installed_at = installed_at
        .map(|raw| parse_timestamp(&raw))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    let config: String = row.get("config")?;
    let config: ExtensionConfig = serde_json::from_str(&config)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(ExtensionRecord {
        code: row.get("code")?,
        name: row.get("name")?,
        version: row.get("version")?,
        installed: row.get("installed")?,
        active: row.get("active")?,
        installed_at,
        config,
    })
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc))
}
