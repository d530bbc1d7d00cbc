//! Install / activate state machine over the persisted registry.
//!
//! ```text
//! unknown -> discovered -> installed -> active
//!                 ^            |  ^        |
//!                 +-uninstall--+  +-deactivate
//! ```
//!
//! Every mutation runs in one registry transaction, so `active` never ends up
//! set on a record that is not `installed`, even with concurrent admins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shop_extensions::{Discovery, ExtensionManifest, ManifestScanner, check_requirements};
use shop_registry::{ExtensionConfig, ExtensionRecord, ExtensionStore, StoreTx};

use crate::error::{BootRegistrationError, Error, Result};
use crate::provider::{ExtensionProvider, InstallContext, ProviderCatalog};

/// Name under which the host's own version is offered to `requires` checks.
pub const HOST_DEPENDENCY: &str = "storefront";

/// Whether an operation changed stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    Changed,
    Unchanged,
}

impl Transition {
    fn from_changed(changed: bool) -> Self {
        if changed { Self::Changed } else { Self::Unchanged }
    }
}

/// Discovered extension merged with its stored state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionStatus {
    pub code: String,
    pub name: String,
    pub version: String,
    pub source: shop_extensions::ExtensionSource,
    pub path: PathBuf,
    pub installed: bool,
    pub active: bool,
    pub installed_at: Option<DateTime<Utc>>,
    /// Version recorded at install time, when it differs from the one on disk.
    pub recorded_version: Option<String>,
}

impl ExtensionStatus {
    fn merge(manifest: &ExtensionManifest, record: Option<&ExtensionRecord>) -> Self {
        Self {
            code: manifest.code.clone(),
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            source: manifest.source,
            path: manifest.path.clone(),
            installed: record.is_some_and(|r| r.installed),
            active: record.is_some_and(|r| r.active),
            installed_at: record.and_then(|r| r.installed_at),
            recorded_version: record
                .filter(|r| r.installed && r.version != manifest.version)
                .map(|r| r.version.clone()),
        }
    }
}

/// Lifecycle operations for one host.
pub struct LifecycleManager<'a> {
    store: &'a mut ExtensionStore,
    scanner: &'a ManifestScanner,
    catalog: &'a ProviderCatalog,
    host_versions: BTreeMap<String, String>,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(store: &'a mut ExtensionStore, scanner: &'a ManifestScanner, catalog: &'a ProviderCatalog) -> Self {
        let mut host_versions = BTreeMap::new();
        host_versions.insert(HOST_DEPENDENCY.to_string(), env!("CARGO_PKG_VERSION").to_string());
        Self {
            store,
            scanner,
            catalog,
            host_versions,
        }
    }

    /// Offer another named version to `requires` checks.
    pub fn with_host_version(mut self, name: &str, version: &str) -> Self {
        self.host_versions.insert(name.to_string(), version.to_string());
        self
    }

    /// Record `code` as installed, running its provider's install hook in
    /// the same transaction.
    ///
    /// Installing an installed extension is a no-op.
    pub fn install(&mut self, code: &str) -> Result<Transition> {
        let manifest = self.discovered(code)?;
        let provider = self.install_provider(&manifest).map_err(|e| Error::InstallFailed {
            code: code.to_string(),
            source: Box::new(e),
        })?;
        let now = Utc::now();

        let transition = self.store.write(|tx| -> Result<Transition> {
            if tx.find_by_code(code)?.is_some_and(|r| r.installed) {
                return Ok(Transition::Unchanged);
            }
            tx.mark_installed(code, &manifest.name, &manifest.version, now)?;
            if let Some(provider) = &provider {
                let ctx = InstallContext {
                    manifest: &manifest,
                    tx,
                };
                provider.install(&ctx).map_err(|source| Error::InstallFailed {
                    code: code.to_string(),
                    source,
                })?;
            }
            Ok(Transition::Changed)
        })?;

        match transition {
            Transition::Changed => {
                tracing::info!(code, version = %manifest.version, "extension installed")
            }
            Transition::Unchanged => tracing::debug!(code, "extension already installed"),
        }
        Ok(transition)
    }

    /// Mark `code` uninstalled, deactivating it first. Config is kept.
    pub fn uninstall(&mut self, code: &str) -> Result<Transition> {
        let discovery = self.scanner.scan();
        let manifest = discovery.find(code).cloned();
        let provider = match manifest.as_ref().map(|m| self.install_provider(m)) {
            Some(Ok(provider)) => provider,
            Some(Err(e)) => {
                tracing::warn!(code, error = %e, "provider unusable, skipping its uninstall routine");
                None
            }
            None => None,
        };

        self.store.write(|tx| -> Result<()> {
            let Some(record) = tx.find_by_code(code)? else {
                return Err(not_found_or_not_installed(code, &discovery));
            };
            if !record.installed {
                return Err(Error::NotInstalled {
                    code: code.to_string(),
                });
            }
            if record.active {
                tx.set_active(code, false)?;
                tracing::info!(code, "deactivated before uninstall");
            }
            match (&manifest, &provider) {
                (Some(manifest), Some(provider)) => {
                    let ctx = InstallContext { manifest, tx };
                    provider.uninstall(&ctx).map_err(|source| Error::UninstallFailed {
                        code: code.to_string(),
                        source,
                    })?;
                }
                (None, _) => {
                    tracing::warn!(code, "extension files are gone, skipping its uninstall routine")
                }
                (Some(_), None) => {}
            }
            tx.mark_uninstalled(code)?;
            Ok(())
        })?;

        tracing::info!(code, "extension uninstalled");
        Ok(Transition::Changed)
    }

    /// Mark an installed extension active. Unmet `requires` constraints are
    /// logged, not enforced.
    pub fn activate(&mut self, code: &str) -> Result<Transition> {
        let manifest = self.discovered(code)?;

        let transition = self.store.write(|tx| -> Result<Transition> {
            let record = require_installed(tx, code)?;
            if record.active {
                return Ok(Transition::Unchanged);
            }
            tx.set_active(code, true)?;
            Ok(Transition::Changed)
        })?;

        if transition == Transition::Changed {
            if let Err(e) = self.warn_unmet_requirements(&manifest) {
                tracing::warn!(code, error = %e, "could not check extension requirements");
            }
            tracing::info!(code, "extension activated");
        }
        Ok(transition)
    }

    /// Mark `code` inactive. Safe on any code in any state.
    pub fn deactivate(&mut self, code: &str) -> Result<Transition> {
        if !self.store.is_provisioned()? {
            tracing::debug!(code, "registry not provisioned, nothing to deactivate");
            return Ok(Transition::Unchanged);
        }

        let changed = self.store.write(|tx| -> Result<bool> {
            let was_active = tx.find_by_code(code)?.is_some_and(|r| r.active);
            if was_active {
                tx.set_active(code, false)?;
            }
            Ok(was_active)
        })?;

        if changed {
            tracing::info!(code, "extension deactivated");
        }
        Ok(Transition::from_changed(changed))
    }

    /// Shallow-merge `patch` into the stored config of a discovered extension.
    pub fn configure(&mut self, code: &str, patch: &ExtensionConfig) -> Result<ExtensionConfig> {
        let manifest = self.discovered(code)?;
        let config = self.store.write(|tx| -> Result<ExtensionConfig> {
            tx.upsert_observed(code, &manifest.name, &manifest.version)?;
            Ok(tx.merge_config(code, patch)?)
        })?;
        tracing::info!(code, keys = patch.len(), "extension config updated");
        Ok(config)
    }

    /// Delete the stored record of an uninstalled extension.
    pub fn purge(&mut self, code: &str) -> Result<()> {
        self.store.write(|tx| -> Result<()> {
            let Some(record) = tx.find_by_code(code)? else {
                return Err(Error::NotFound {
                    code: code.to_string(),
                });
            };
            if record.installed {
                return Err(Error::StillInstalled {
                    code: code.to_string(),
                });
            }
            tx.purge(code)?;
            Ok(())
        })?;
        tracing::info!(code, "extension record purged");
        Ok(())
    }

    /// Record every discovered bundled extension the registry has not seen.
    ///
    /// Returns the codes newly recorded.
    pub fn observe_bundled(&mut self) -> Result<Vec<String>> {
        let bundled: Vec<ExtensionManifest> = self
            .scanner
            .discover()
            .into_iter()
            .filter(|m| m.source == shop_extensions::ExtensionSource::Bundled)
            .collect();

        let observed = self.store.write(|tx| -> Result<Vec<String>> {
            let mut observed = Vec::new();
            for manifest in &bundled {
                if tx.upsert_observed(&manifest.code, &manifest.name, &manifest.version)? {
                    observed.push(manifest.code.clone());
                }
            }
            Ok(observed)
        })?;

        if !observed.is_empty() {
            tracing::info!(count = observed.len(), "recorded bundled extensions");
        }
        Ok(observed)
    }

    /// Discovered extensions merged with stored state, ordered by code.
    ///
    /// Read-only: neither discovery nor the registry is changed.
    pub fn list(&self) -> Result<Vec<ExtensionStatus>> {
        let records: BTreeMap<String, ExtensionRecord> = self
            .store
            .list_all()?
            .into_iter()
            .map(|r| (r.code.clone(), r))
            .collect();

        let discovery = self.scanner.scan();
        for code in records.keys().filter(|code| discovery.find(code).is_none()) {
            tracing::debug!(code = %code, "stored extension has no files on disk");
        }

        let mut statuses: Vec<ExtensionStatus> = discovery
            .manifests
            .iter()
            .map(|m| ExtensionStatus::merge(m, records.get(&m.code)))
            .collect();
        statuses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(statuses)
    }

    fn discovered(&self, code: &str) -> Result<ExtensionManifest> {
        self.scanner
            .scan()
            .find(code)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                code: code.to_string(),
            })
    }

    /// Provider whose install hooks apply to `manifest`.
    ///
    /// `None` only when nothing points at a provider; a provider that is
    /// declared but cannot be loaded is an error.
    fn install_provider(
        &self,
        manifest: &ExtensionManifest,
    ) -> std::result::Result<Option<Box<dyn ExtensionProvider>>, BootRegistrationError> {
        match self.catalog.resolve(manifest) {
            Ok(resolved) => Ok(Some(resolved.provider)),
            Err(e @ BootRegistrationError::Unresolved { .. }) => {
                tracing::debug!(code = %manifest.code, reason = %e, "no install routine for extension");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn warn_unmet_requirements(&self, manifest: &ExtensionManifest) -> Result<()> {
        if manifest.requires.is_empty() {
            return Ok(());
        }
        let installed: BTreeMap<String, String> = self
            .store
            .list_installed()?
            .into_iter()
            .map(|r| (r.code, r.version))
            .collect();

        let issues = check_requirements(manifest, |dependency| {
            self.host_versions
                .get(dependency)
                .or_else(|| installed.get(dependency))
                .cloned()
        });
        for issue in issues {
            tracing::warn!(code = %manifest.code, %issue, "extension requirement not met");
        }
        Ok(())
    }
}

fn not_found_or_not_installed(code: &str, discovery: &Discovery) -> Error {
    if discovery.find(code).is_some() {
        Error::NotInstalled {
            code: code.to_string(),
        }
    } else {
        Error::NotFound {
            code: code.to_string(),
        }
    }
}

fn require_installed(tx: &StoreTx<'_>, code: &str) -> Result<ExtensionRecord> {
    match tx.find_by_code(code)? {
        Some(record) if record.installed => Ok(record),
        _ => Err(Error::NotInstalled {
            code: code.to_string(),
        }),
    }
}
