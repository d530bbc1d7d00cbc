//! Extension host for the storefront
//!
//! This crate ties the layer 0 crates together:
//!
//! - **Lifecycle**: install / activate / deactivate / uninstall over the
//!   persisted registry, each as one transaction
//! - **Boot**: per-process registration of every active extension's provider,
//!   isolated per extension
//! - **Providers**: the [`ExtensionProvider`] contract and the
//!   [`ProviderCatalog`] entry points are resolved from
//! - **Menus**: navigation assembled from core entries and extension hooks
//! - **Configuration**: `storefront.toml`
//!
//! # Architecture
//!
//! ```text
//!                 shop-cli
//!                    |
//!                shop-core
//!                    |
//!     +--------------+--------------+
//!     |              |              |
//! shop-hooks  shop-extensions  shop-registry
//! ```

pub mod boot;
pub mod config;
pub mod container;
pub mod declarative;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod menu;
pub mod provider;

pub use boot::{BootFailure, BootOrchestrator, BootReport, BootSkip};
pub use config::HostConfig;
pub use container::{ServiceContainer, Services};
pub use declarative::DeclarativeProvider;
pub use error::{BootRegistrationError, Error, Result};
pub use host::{BootedHost, Host, ProvisionReport};
pub use lifecycle::{ExtensionStatus, LifecycleManager, Transition};
pub use menu::{MenuNode, MenuRegistry};
pub use provider::{
    BootContext, ExtensionProvider, InstallContext, ProviderCatalog, ProviderError, ProviderOrigin,
    ProviderResult, RegisterContext, ResolvedProvider,
};

pub use shop_extensions::{ExtensionManifest, ExtensionSource};
pub use shop_hooks::{CallbackErrorPolicy, EventDispatcher, HookOptions};
pub use shop_registry::{ExtensionConfig, ExtensionRecord, ExtensionStore, MenuEntry, MenuLocation, UnprovisionedPolicy};
