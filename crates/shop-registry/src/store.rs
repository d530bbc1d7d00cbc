//! The registry handle used by the lifecycle and boot layers.

use std::cell::Cell;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::{self, SchemaState};
use crate::error::{Error, Result};
use crate::menu::{self, MenuEntry, MenuLocation};
use crate::record::{self, ExtensionConfig, ExtensionRecord, RecordFilter};

/// How reads behave before the schema has been provisioned.
///
/// `Permissive` answers as if nothing were installed (and `is_active` as if
/// everything were allowed) so first-run setup can proceed. `Strict` reports
/// [`Error::StorageUnavailable`] instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnprovisionedPolicy {
    #[default]
    Permissive,
    Strict,
}

/// Persisted extension records and menu entries.
///
/// Reads go straight to the connection. Writes run inside [`ExtensionStore::write`],
/// which holds an immediate (write-locked) transaction so two processes
/// changing lifecycle state serialize on SQLite's lock.
pub struct ExtensionStore {
    conn: Connection,
    policy: UnprovisionedPolicy,
    warned: Cell<bool>,
}

impl std::fmt::Debug for ExtensionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionStore")
            .field("path", &self.conn.path())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ExtensionStore {
    /// Open the registry at `path`. The schema is left as found.
    pub fn open(path: &Path, policy: UnprovisionedPolicy) -> Result<Self> {
        Ok(Self::from_connection(db::open_db(path)?, policy))
    }

    /// Open an empty in-memory registry. Call [`provision`](Self::provision)
    /// before writing.
    pub fn open_in_memory(policy: UnprovisionedPolicy) -> Result<Self> {
        Ok(Self::from_connection(db::open_db_in_memory()?, policy))
    }

    fn from_connection(conn: Connection, policy: UnprovisionedPolicy) -> Self {
        Self {
            conn,
            policy,
            warned: Cell::new(false),
        }
    }

    pub fn policy(&self) -> UnprovisionedPolicy {
        self.policy
    }

    /// Apply pending migrations. Returns how many ran.
    pub fn provision(&mut self) -> Result<usize> {
        db::migrations::apply_migrations(&mut self.conn)
    }

    pub fn schema_state(&self) -> Result<SchemaState> {
        db::schema_state(&self.conn)
    }

    pub fn is_provisioned(&self) -> Result<bool> {
        Ok(self.schema_state()? == SchemaState::Provisioned)
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<ExtensionRecord>> {
        self.read(None, |conn| record::find_by_code(conn, code))
    }

    /// Every stored record, installed or not, ordered by code.
    pub fn list_all(&self) -> Result<Vec<ExtensionRecord>> {
        self.read(Vec::new(), |conn| record::list(conn, RecordFilter::All))
    }

    pub fn list_installed(&self) -> Result<Vec<ExtensionRecord>> {
        self.read(Vec::new(), |conn| record::list(conn, RecordFilter::Installed))
    }

    /// Active records ordered by code, which is also the boot order.
    pub fn list_active(&self) -> Result<Vec<ExtensionRecord>> {
        self.read(Vec::new(), |conn| record::list(conn, RecordFilter::Active))
    }

    /// Whether `code` is active. Unprovisioned permissive storage says yes.
    pub fn is_active(&self, code: &str) -> Result<bool> {
        self.read(true, |conn| {
            Ok(record::find_by_code(conn, code)?.is_some_and(|r| r.active))
        })
    }

    pub fn list_menu_entries(&self, location: Option<MenuLocation>) -> Result<Vec<MenuEntry>> {
        self.read(Vec::new(), |conn| menu::list(conn, location))
    }

    /// Run `f` inside one immediate transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back otherwise. The error type is
    /// the caller's so lifecycle code can fail with its own errors and still
    /// get the rollback.
    pub fn write<T, E, F>(&mut self, f: F) -> std::result::Result<T, E>
    where
        E: From<Error>,
        F: FnOnce(&StoreTx<'_>) -> std::result::Result<T, E>,
    {
        if let SchemaState::Unprovisioned { version } = self.schema_state()? {
            tracing::debug!(version, "write refused, registry schema not provisioned");
            return Err(Error::StorageUnavailable.into());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(Error::from)?;
        let store_tx = StoreTx { tx };

        match f(&store_tx) {
            Ok(value) => {
                store_tx.tx.commit().map_err(Error::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = store_tx.tx.rollback() {
                    tracing::error!(error = %rollback, "failed to roll back registry transaction");
                }
                Err(e)
            }
        }
    }

    pub fn mark_installed(&mut self, code: &str, name: &str, version: &str) -> Result<()> {
        let now = Utc::now();
        self.write(|tx| tx.mark_installed(code, name, version, now))
    }

    pub fn mark_uninstalled(&mut self, code: &str) -> Result<bool> {
        self.write(|tx| tx.mark_uninstalled(code))
    }

    pub fn set_active(&mut self, code: &str, active: bool) -> Result<bool> {
        self.write(|tx| tx.set_active(code, active))
    }

    pub fn merge_config(&mut self, code: &str, patch: &ExtensionConfig) -> Result<ExtensionConfig> {
        self.write(|tx| tx.merge_config(code, patch))
    }

    pub fn upsert_observed(&mut self, code: &str, name: &str, version: &str) -> Result<bool> {
        self.write(|tx| tx.upsert_observed(code, name, version))
    }

    pub fn purge(&mut self, code: &str) -> Result<bool> {
        self.write(|tx| tx.purge(code))
    }

    pub fn upsert_menu_entry(&mut self, entry: &MenuEntry) -> Result<()> {
        self.write(|tx| tx.upsert_menu_entry(entry))
    }

    fn read<T>(&self, fallback: T, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        match self.schema_state()? {
            SchemaState::Provisioned => f(&self.conn),
            SchemaState::Unprovisioned { version } => match self.policy {
                UnprovisionedPolicy::Strict => Err(Error::StorageUnavailable),
                UnprovisionedPolicy::Permissive => {
                    if !self.warned.replace(true) {
                        tracing::warn!(
                            version,
                            "extension registry is not provisioned; treating every extension as permitted"
                        );
                    }
                    Ok(fallback)
                }
            },
        }
    }
}

/// An open write transaction on the registry.
///
/// Handed to lifecycle code and to extension install hooks; everything done
/// through it commits or rolls back together.
pub struct StoreTx<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTx<'_> {
    /// The raw connection, for extensions that create their own tables.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<ExtensionRecord>> {
        record::find_by_code(&self.tx, code)
    }

    pub fn mark_installed(&self, code: &str, name: &str, version: &str, at: DateTime<Utc>) -> Result<()> {
        record::mark_installed(&self.tx, code, name, version, at)
    }

    /// Returns `false` when no record exists.
    pub fn mark_uninstalled(&self, code: &str) -> Result<bool> {
        record::mark_uninstalled(&self.tx, code)
    }

    /// Returns `false` when no record exists.
    pub fn set_active(&self, code: &str, active: bool) -> Result<bool> {
        record::set_active(&self.tx, code, active)
    }

    /// Shallow merge: keys in `patch` replace stored keys, others are kept.
    pub fn merge_config(&self, code: &str, patch: &ExtensionConfig) -> Result<ExtensionConfig> {
        record::merge_config(&self.tx, code, patch)
    }

    /// Record an extension the host has seen without installing it. Returns
    /// `true` if a new row was created.
    pub fn upsert_observed(&self, code: &str, name: &str, version: &str) -> Result<bool> {
        record::upsert_observed(&self.tx, code, name, version)
    }

    pub fn purge(&self, code: &str) -> Result<bool> {
        record::purge(&self.tx, code)
    }

    pub fn upsert_menu_entry(&self, entry: &MenuEntry) -> Result<()> {
        menu::upsert(&self.tx, entry)
    }

    pub fn list_menu_entries(&self, location: Option<MenuLocation>) -> Result<Vec<MenuEntry>> {
        menu::list(&self.tx, location)
    }

    pub fn delete_menu_entry(&self, key: &str) -> Result<bool> {
        menu::delete(&self.tx, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn provisioned() -> ExtensionStore {
        let mut store = ExtensionStore::open_in_memory(UnprovisionedPolicy::Strict).unwrap();
        store.provision().unwrap();
        store
    }

    fn config(value: serde_json::Value) -> ExtensionConfig {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_permissive_reads_before_provisioning() {
        let store = ExtensionStore::open_in_memory(UnprovisionedPolicy::Permissive).unwrap();

        assert!(store.list_active().unwrap().is_empty());
        assert!(store.list_installed().unwrap().is_empty());
        assert_eq!(store.find_by_code("acme").unwrap(), None);
        assert!(store.is_active("acme").unwrap());
        assert!(store.list_menu_entries(None).unwrap().is_empty());
    }

    #[test]
    fn test_strict_reads_before_provisioning_fail() {
        let store = ExtensionStore::open_in_memory(UnprovisionedPolicy::Strict).unwrap();

        assert!(matches!(store.list_active(), Err(Error::StorageUnavailable)));
        assert!(matches!(store.is_active("acme"), Err(Error::StorageUnavailable)));
    }

    #[test]
    fn test_writes_require_provisioning() {
        let mut store = ExtensionStore::open_in_memory(UnprovisionedPolicy::Permissive).unwrap();
        let err = store.mark_installed("acme", "Acme", "1.0.0").unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable));
    }

    #[test]
    fn test_is_active_false_for_unknown_code_once_provisioned() {
        let store = provisioned();
        assert!(!store.is_active("acme").unwrap());
    }

    #[test]
    fn test_mark_installed_is_idempotent() {
        let mut store = provisioned();
        store.mark_installed("acme", "Acme", "1.0.0").unwrap();
        store.mark_installed("acme", "Acme", "1.0.0").unwrap();

        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].installed);
        assert!(!all[0].active);
        assert!(all[0].installed_at.is_some());
    }

    #[test]
    fn test_activation_flags_and_filters() {
        let mut store = provisioned();
        store.mark_installed("beta", "Beta", "1.0.0").unwrap();
        store.mark_installed("alpha", "Alpha", "1.0.0").unwrap();
        store.upsert_observed("gamma", "Gamma", "0.1.0").unwrap();
        assert!(store.set_active("beta", true).unwrap());
        assert!(store.set_active("alpha", true).unwrap());

        let active: Vec<String> = store.list_active().unwrap().into_iter().map(|r| r.code).collect();
        assert_eq!(active, vec!["alpha", "beta"]);
        assert_eq!(store.list_installed().unwrap().len(), 2);
        assert_eq!(store.list_all().unwrap().len(), 3);
        assert!(store.is_active("alpha").unwrap());
        assert!(!store.is_active("gamma").unwrap());
    }

    #[test]
    fn test_active_requires_installed_at_storage_level() {
        let mut store = provisioned();
        store.upsert_observed("acme", "Acme", "1.0.0").unwrap();

        let err = store.set_active("acme", true).unwrap_err();
        assert!(matches!(err, Error::Sqlite(_)), "got {err:?}");
        assert!(!store.find_by_code("acme").unwrap().unwrap().active);
    }

    #[test]
    fn test_uninstall_keeps_record_and_config() {
        let mut store = provisioned();
        store.mark_installed("acme", "Acme", "1.0.0").unwrap();
        store.set_active("acme", true).unwrap();
        store.merge_config("acme", &config(json!({ "rate": 5 }))).unwrap();

        assert!(store.mark_uninstalled("acme").unwrap());

        let record = store.find_by_code("acme").unwrap().unwrap();
        assert!(!record.installed);
        assert!(!record.active);
        assert_eq!(record.config, config(json!({ "rate": 5 })));
    }

    #[test]
    fn test_merge_config_is_shallow() {
        let mut store = provisioned();
        store.mark_installed("acme", "Acme", "1.0.0").unwrap();
        store
            .merge_config("acme", &config(json!({ "rate": 5, "zones": { "eu": true } })))
            .unwrap();

        let merged = store
            .merge_config("acme", &config(json!({ "zones": { "us": true }, "label": "Flat" })))
            .unwrap();

        assert_eq!(
            merged,
            config(json!({ "rate": 5, "zones": { "us": true }, "label": "Flat" }))
        );
        assert_eq!(store.find_by_code("acme").unwrap().unwrap().config, merged);
    }

    #[test]
    fn test_merge_config_unknown_code() {
        let mut store = provisioned();
        let err = store.merge_config("ghost", &ExtensionConfig::new()).unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { code } if code == "ghost"));
    }

    #[test]
    fn test_upsert_observed_does_not_touch_existing() {
        let mut store = provisioned();
        store.mark_installed("acme", "Acme", "1.0.0").unwrap();

        assert!(!store.upsert_observed("acme", "Renamed", "2.0.0").unwrap());
        let record = store.find_by_code("acme").unwrap().unwrap();
        assert_eq!(record.name, "Acme");
        assert!(record.installed);
    }

    #[test]
    fn test_purge_removes_row() {
        let mut store = provisioned();
        store.upsert_observed("acme", "Acme", "1.0.0").unwrap();

        assert!(store.purge("acme").unwrap());
        assert!(!store.purge("acme").unwrap());
        assert_eq!(store.find_by_code("acme").unwrap(), None);
    }

    #[derive(Debug, thiserror::Error)]
    enum HookFailure {
        #[error("install hook failed")]
        Failed,
        #[error(transparent)]
        Store(#[from] Error),
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let mut store = provisioned();

        let result: std::result::Result<(), HookFailure> = store.write(|tx| {
            tx.mark_installed("acme", "Acme", "1.0.0", Utc::now())?;
            tx.connection()
                .execute_batch("CREATE TABLE acme_rates (zone TEXT PRIMARY KEY);")
                .map_err(Error::from)?;
            Err(HookFailure::Failed)
        });

        assert!(matches!(result, Err(HookFailure::Failed)));
        assert_eq!(store.find_by_code("acme").unwrap(), None);
        let table_count: i64 = store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'acme_rates'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 0);
    }

    #[test]
    fn test_menu_entries_upsert_and_order() {
        let mut store = provisioned();
        store
            .upsert_menu_entry(&MenuEntry::new("catalog", "Catalog", "/admin/catalog", MenuLocation::Admin).with_order(20))
            .unwrap();
        store
            .upsert_menu_entry(&MenuEntry::new("orders", "Orders", "/admin/orders", MenuLocation::Admin).with_order(10))
            .unwrap();
        store
            .upsert_menu_entry(&MenuEntry::new("home", "Home", "/", MenuLocation::Storefront))
            .unwrap();
        store
            .upsert_menu_entry(
                &MenuEntry::new("orders", "All orders", "/admin/orders", MenuLocation::Admin).with_order(10),
            )
            .unwrap();

        let admin = store.list_menu_entries(Some(MenuLocation::Admin)).unwrap();
        let keys: Vec<&str> = admin.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["orders", "catalog"]);
        assert_eq!(admin[0].title, "All orders");
        assert_eq!(store.list_menu_entries(None).unwrap().len(), 3);
    }

    #[test]
    fn test_menu_parent_must_exist_at_commit() {
        let mut store = provisioned();

        let child = MenuEntry::new("shipping", "Shipping", "/admin/shipping", MenuLocation::Admin).with_parent("settings");
        assert!(store.upsert_menu_entry(&child).is_err());

        store
            .write(|tx| {
                tx.upsert_menu_entry(&child)?;
                tx.upsert_menu_entry(&MenuEntry::new("settings", "Settings", "/admin/settings", MenuLocation::Admin))
            })
            .unwrap();
        assert_eq!(store.list_menu_entries(Some(MenuLocation::Admin)).unwrap().len(), 2);
    }
}
