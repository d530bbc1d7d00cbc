//! Persisted navigation entries.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which navigation tree an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuLocation {
    Admin,
    Storefront,
}

impl MenuLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Storefront => "storefront",
        }
    }
}

impl fmt::Display for MenuLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuLocation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "storefront" => Ok(Self::Storefront),
            other => Err(format!("unknown menu location '{other}' (expected admin or storefront)")),
        }
    }
}

/// One navigation entry. `parent_key` points at another entry's `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub key: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub parent_key: Option<String>,
    #[serde(default)]
    pub order: i64,
    pub location: MenuLocation,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl MenuEntry {
    pub fn new(
        key: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        location: MenuLocation,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            url: url.into(),
            parent_key: None,
            order: 0,
            location,
            active: true,
        }
    }

    pub fn with_parent(mut self, parent_key: impl Into<String>) -> Self {
        self.parent_key = Some(parent_key.into());
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }
}

const COLUMNS: &str = "entry_key, title, url, parent_key, sort_order, location, active";

pub(crate) fn upsert(conn: &Connection, entry: &MenuEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO menu_entries (entry_key, title, url, parent_key, sort_order, location, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (entry_key) DO UPDATE SET
             title = excluded.title,
             url = excluded.url,
             parent_key = excluded.parent_key,
             sort_order = excluded.sort_order,
             location = excluded.location,
             active = excluded.active",
        params![
            entry.key,
            entry.title,
            entry.url,
            entry.parent_key,
            entry.order,
            entry.location.as_str(),
            entry.active
        ],
    )?;
    Ok(())
}

pub(crate) fn delete(conn: &Connection, key: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM menu_entries WHERE entry_key = ?1", [key])?;
    Ok(deleted > 0)
}

pub(crate) fn list(conn: &Connection, location: Option<MenuLocation>) -> Result<Vec<MenuEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM menu_entries
         WHERE ?1 IS NULL OR location = ?1
         ORDER BY location ASC, sort_order ASC, entry_key ASC"
    ))?;
    let rows = stmt.query_map([location.map(MenuLocation::as_str)], entry_from_row)?;
    let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<MenuEntry> {
    let location: String = row.get("location")?;
    let location = location
        .parse::<MenuLocation>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, e.into()))?;

    Ok(MenuEntry {
        key: row.get("entry_key")?,
        title: row.get("title")?,
        url: row.get("url")?,
        parent_key: row.get("parent_key")?,
        order: row.get("sort_order")?,
        location,
        active: row.get("active")?,
    })
}
