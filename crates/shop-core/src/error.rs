//! Error types for shop-core

use std::path::PathBuf;

use crate::provider::ProviderError;

/// Result type for shop-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by lifecycle operations and host setup
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The code is unknown to discovery (and, where relevant, to the registry).
    #[error("extension '{code}' not found")]
    NotFound { code: String },

    /// The operation requires an installed extension.
    #[error("extension '{code}' is not installed")]
    NotInstalled { code: String },

    /// Purge refused because the extension is still installed.
    #[error("extension '{code}' is still installed; uninstall it before purging")]
    StillInstalled { code: String },

    /// The registry schema has not been provisioned.
    #[error("extension registry storage is not provisioned yet")]
    StorageUnavailable,

    /// The extension's own install routine failed; nothing was recorded.
    #[error("installing extension '{code}' failed: {source}")]
    InstallFailed {
        code: String,
        #[source]
        source: ProviderError,
    },

    /// The extension's own uninstall routine failed; its state is unchanged.
    #[error("uninstalling extension '{code}' failed: {source}")]
    UninstallFailed {
        code: String,
        #[source]
        source: ProviderError,
    },

    /// Host configuration file could not be parsed.
    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// I/O error reading host files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Transparent wrappers for underlying crate errors
    /// Registry error from shop-registry
    #[error(transparent)]
    Registry(shop_registry::Error),

    /// Manifest error from shop-extensions
    #[error(transparent)]
    Extensions(#[from] shop_extensions::Error),

    /// Dispatcher error from shop-hooks
    #[error(transparent)]
    Hooks(#[from] shop_hooks::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<shop_registry::Error> for Error {
    fn from(err: shop_registry::Error) -> Self {
        match err {
            shop_registry::Error::StorageUnavailable => Self::StorageUnavailable,
            other => Self::Registry(other),
        }
    }
}

/// Why one active extension could not be brought up during boot.
///
/// These never abort the boot; the orchestrator records them in its report.
#[derive(Debug, thiserror::Error)]
pub enum BootRegistrationError {
    /// Neither the catalog nor the manifest points at a provider.
    #[error("no provider for extension '{code}' (provider: {})", provider.as_deref().unwrap_or("none"))]
    Unresolved {
        code: String,
        provider: Option<String>,
    },

    /// The manifest's provider file could not be loaded.
    #[error("provider file {} of extension '{code}' is unusable: {reason}", path.display())]
    ProviderFile {
        code: String,
        path: PathBuf,
        reason: String,
    },

    /// The provider's `register` step returned an error.
    #[error("extension '{code}' failed to register: {source}")]
    Register {
        code: String,
        #[source]
        source: ProviderError,
    },

    /// The provider's `boot` step returned an error.
    #[error("extension '{code}' failed to boot: {source}")]
    Boot {
        code: String,
        #[source]
        source: ProviderError,
    },

    /// The provider panicked.
    #[error("extension '{code}' panicked during {phase}: {message}")]
    Panicked {
        code: String,
        phase: &'static str,
        message: String,
    },
}

impl BootRegistrationError {
    pub fn code(&self) -> &str {
        match self {
            Self::Unresolved { code, .. }
            | Self::ProviderFile { code, .. }
            | Self::Register { code, .. }
            | Self::Boot { code, .. }
            | Self::Panicked { code, .. } => code,
        }
    }
}
