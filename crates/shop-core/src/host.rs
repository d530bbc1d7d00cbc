//! The storefront host: configuration, registry, discovery and the provider
//! catalog wired together.

use serde::Serialize;
use shop_extensions::ManifestScanner;
use shop_hooks::EventDispatcher;
use shop_registry::ExtensionStore;

use crate::boot::{BootOrchestrator, BootReport};
use crate::config::HostConfig;
use crate::container::ServiceContainer;
use crate::error::Result;
use crate::lifecycle::LifecycleManager;
use crate::menu::{self, MenuRegistry};
use crate::provider::ProviderCatalog;

/// What [`Host::provision`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// Schema migrations applied.
    pub migrations: usize,
    /// Core menu entries written for the first time.
    pub menu_entries: usize,
    /// Bundled extensions recorded for the first time.
    pub observed: Vec<String>,
}

/// A booted process: the container holding every hook registered this boot,
/// and the report of how boot went.
#[derive(Debug)]
pub struct BootedHost {
    pub container: ServiceContainer,
    pub report: BootReport,
}

impl BootedHost {
    pub fn hooks(&self) -> &EventDispatcher {
        self.container.hooks()
    }
}

/// Everything one process needs to manage and boot extensions.
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    store: ExtensionStore,
    scanner: ManifestScanner,
    catalog: ProviderCatalog,
}

impl Host {
    /// Open the registry named by `config`. The schema is not touched.
    pub fn open(config: HostConfig, catalog: ProviderCatalog) -> Result<Self> {
        let store = ExtensionStore::open(&config.database_path(), config.storage.unprovisioned)?;
        Ok(Self::with_store(config, store, catalog))
    }

    /// Assemble a host around an already opened store.
    pub fn with_store(config: HostConfig, store: ExtensionStore, catalog: ProviderCatalog) -> Self {
        let scanner = config.scanner();
        Self {
            config,
            store,
            scanner,
            catalog,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn store(&self) -> &ExtensionStore {
        &self.store
    }

    pub fn scanner(&self) -> &ManifestScanner {
        &self.scanner
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    /// First-run setup: migrate the schema, seed core navigation, and record
    /// bundled extensions. Safe to repeat.
    pub fn provision(&mut self) -> Result<ProvisionReport> {
        let migrations = self.store.provision()?;

        let menu_entries = self.store.write(|tx| -> Result<usize> {
            let existing: Vec<String> = tx
                .list_menu_entries(None)?
                .into_iter()
                .map(|entry| entry.key)
                .collect();
            let mut written = 0;
            for entry in menu::core_entries() {
                if !existing.contains(&entry.key) {
                    tx.upsert_menu_entry(&entry)?;
                    written += 1;
                }
            }
            Ok(written)
        })?;

        let observed = self.lifecycle().observe_bundled()?;
        let report = ProvisionReport {
            migrations,
            menu_entries,
            observed,
        };
        if report != ProvisionReport::default() {
            tracing::info!(
                migrations = report.migrations,
                menu_entries = report.menu_entries,
                observed = report.observed.len(),
                "provisioned storefront registry"
            );
        }
        Ok(report)
    }

    pub fn lifecycle(&mut self) -> LifecycleManager<'_> {
        LifecycleManager::new(&mut self.store, &self.scanner, &self.catalog)
    }

    /// Build a fresh container and boot every active extension into it.
    pub fn boot(&self) -> Result<BootedHost> {
        let mut container = ServiceContainer::new(self.config.hooks.on_callback_error);
        let report = BootOrchestrator::new(&self.store, &self.scanner, &self.catalog)
            .boot_active_extensions(&mut container)?;
        Ok(BootedHost { container, report })
    }

    /// Menu view over this host's registry and a booted dispatcher.
    pub fn menu<'a>(&'a self, hooks: &'a EventDispatcher) -> MenuRegistry<'a> {
        MenuRegistry::new(&self.store, hooks)
    }
}
