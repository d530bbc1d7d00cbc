//! Persisted extension registry for the storefront host.
//!
//! One SQLite database holds a row per extension (`installed`, `active`,
//! `version`, `config`) and the navigation entries extensions contribute.
//! It is shared by every process serving the store, so all mutations go
//! through [`ExtensionStore::write`] and SQLite's own locking.
//!
//! The schema is not created on open. Until [`ExtensionStore::provision`] has
//! run, reads follow the store's [`UnprovisionedPolicy`] and writes fail with
//! [`Error::StorageUnavailable`].

pub mod db;
pub mod error;
pub mod menu;
pub mod record;
pub mod store;

pub use db::SchemaState;
pub use error::{Error, Result};
pub use menu::{MenuEntry, MenuLocation};
pub use record::{ExtensionConfig, ExtensionRecord};
pub use store::{ExtensionStore, StoreTx, UnprovisionedPolicy};
