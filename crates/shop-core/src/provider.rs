//! The contract every extension entry point implements, and the catalog the
//! boot orchestrator resolves entry points from.
//!
//! Providers are never located by naming convention. A provider is either
//! registered in the [`ProviderCatalog`] under the name a manifest declares
//! (or under the extension code), or described by the manifest's explicit
//! `provider_file`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use shop_extensions::ExtensionManifest;
use shop_hooks::{HookId, ScopedDispatcher};
use shop_registry::{ExtensionConfig, MenuEntry, StoreTx};

use crate::container::Services;
use crate::declarative::DeclarativeProvider;
use crate::error::BootRegistrationError;
use crate::menu;

/// Error type providers may return; any error converts into it with `?`.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by provider hooks.
pub type ProviderResult<T = ()> = std::result::Result<T, ProviderError>;

/// An extension's entry point.
///
/// The host calls `register` for every active extension first, then `boot`
/// for each of them, so a provider may rely on services other providers bound
/// during `register`. `install` and `uninstall` run inside the registry
/// transaction of the matching lifecycle operation; returning an error rolls
/// that operation back.
pub trait ExtensionProvider: Send + Sync {
    /// Bind services into the container.
    fn register(&self, _ctx: &mut RegisterContext<'_>) -> ProviderResult {
        Ok(())
    }

    /// Register hooks and menu entries.
    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult;

    /// One-time setup, such as creating the extension's own tables.
    fn install(&self, _ctx: &InstallContext<'_>) -> ProviderResult {
        Ok(())
    }

    /// Teardown when the extension is uninstalled. Stored config is kept.
    fn uninstall(&self, _ctx: &InstallContext<'_>) -> ProviderResult {
        Ok(())
    }
}

/// What a provider sees while binding services.
pub struct RegisterContext<'a> {
    pub(crate) manifest: &'a ExtensionManifest,
    pub(crate) config: &'a ExtensionConfig,
    pub(crate) services: &'a mut Services,
}

impl RegisterContext<'_> {
    pub fn manifest(&self) -> &ExtensionManifest {
        self.manifest
    }

    pub fn config(&self) -> &ExtensionConfig {
        self.config
    }

    /// Typed read of one config key; `None` if absent or of another shape.
    pub fn config_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        config_value(self.config, key)
    }

    /// Bind `service`, replacing any earlier binding of the same type.
    pub fn provide<T: Send + Sync + 'static>(&mut self, service: T) {
        self.services.insert_owned(&self.manifest.code, service);
    }

    pub fn service<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.services.get::<T>()
    }
}

/// What a provider sees while booting.
pub struct BootContext<'a> {
    pub(crate) manifest: &'a ExtensionManifest,
    pub(crate) config: &'a ExtensionConfig,
    pub(crate) hooks: ScopedDispatcher<'a>,
    pub(crate) services: &'a Services,
}

impl<'a> BootContext<'a> {
    pub fn manifest(&self) -> &ExtensionManifest {
        self.manifest
    }

    pub fn code(&self) -> &str {
        &self.manifest.code
    }

    pub fn config(&self) -> &ExtensionConfig {
        self.config
    }

    pub fn config_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        config_value(self.config, key)
    }

    /// Registration handle; every hook added through it is owned by this
    /// extension.
    pub fn hooks(&mut self) -> &mut ScopedDispatcher<'a> {
        &mut self.hooks
    }

    pub fn service<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.services.get::<T>()
    }

    /// Contribute a navigation entry for this boot.
    pub fn add_menu_entry(&mut self, entry: MenuEntry) -> HookId {
        menu::register_entry(&mut self.hooks, entry)
    }
}

/// What a provider sees while installing or uninstalling.
pub struct InstallContext<'a> {
    pub(crate) manifest: &'a ExtensionManifest,
    pub(crate) tx: &'a StoreTx<'a>,
}

impl<'a> InstallContext<'a> {
    pub fn manifest(&self) -> &ExtensionManifest {
        self.manifest
    }

    /// The open registry transaction.
    pub fn tx(&self) -> &'a StoreTx<'a> {
        self.tx
    }
}

fn config_value<T: DeserializeOwned>(config: &ExtensionConfig, key: &str) -> Option<T> {
    let value = config.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(typed) => Some(typed),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring config value of unexpected shape");
            None
        }
    }
}

type Factory = Arc<dyn Fn() -> Box<dyn ExtensionProvider> + Send + Sync>;

/// Where a resolved provider came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOrigin {
    /// Catalog entry matching the manifest's `provider` name.
    Named(String),
    /// Catalog entry registered for the extension code.
    Code,
    /// The manifest's `provider_file`.
    File(PathBuf),
}

impl fmt::Display for ProviderOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "catalog:{name}"),
            Self::Code => write!(f, "catalog:code"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// A provider ready to be registered.
pub struct ResolvedProvider {
    pub origin: ProviderOrigin,
    pub provider: Box<dyn ExtensionProvider>,
}

impl fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Provider constructors known to the host at startup.
#[derive(Clone, Default)]
pub struct ProviderCatalog {
    by_name: BTreeMap<String, Factory>,
    by_code: BTreeMap<String, Factory>,
}

impl fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCatalog")
            .field("by_name", &self.by_name.keys().collect::<Vec<_>>())
            .field("by_code", &self.by_code.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under the provider name manifests declare.
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ExtensionProvider> + Send + Sync + 'static,
    {
        self.by_name.insert(name.to_string(), Arc::new(factory));
        self
    }

    /// Register a constructor for an extension code, used when the manifest
    /// names no provider the catalog knows.
    pub fn register_for_code<F>(&mut self, code: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn ExtensionProvider> + Send + Sync + 'static,
    {
        self.by_code.insert(code.to_string(), Arc::new(factory));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ExtensionProvider> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len() + self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge another catalog in; its entries win on conflicts.
    pub fn extend(&mut self, other: ProviderCatalog) {
        self.by_name.extend(other.by_name);
        self.by_code.extend(other.by_code);
    }

    /// Find the provider for `manifest`.
    ///
    /// Order: catalog by provider name, catalog by code, the manifest's
    /// provider file. Anything else is [`BootRegistrationError::Unresolved`].
    pub fn resolve(
        &self,
        manifest: &ExtensionManifest,
    ) -> std::result::Result<ResolvedProvider, BootRegistrationError> {
        let declared = manifest.entry_point.provider.as_deref();

        if let Some(factory) = declared.and_then(|name| self.by_name.get(name)) {
            let name = declared.unwrap_or_default().to_string();
            return Ok(ResolvedProvider {
                origin: ProviderOrigin::Named(name),
                provider: factory(),
            });
        }

        if let Some(factory) = self.by_code.get(&manifest.code) {
            return Ok(ResolvedProvider {
                origin: ProviderOrigin::Code,
                provider: factory(),
            });
        }

        if let Some(path) = manifest.provider_file_path() {
            let provider = DeclarativeProvider::load(manifest)?;
            return Ok(ResolvedProvider {
                origin: ProviderOrigin::File(path),
                provider: Box::new(provider),
            });
        }

        Err(BootRegistrationError::Unresolved {
            code: manifest.code.clone(),
            provider: declared.map(str::to_string),
        })
    }
}
