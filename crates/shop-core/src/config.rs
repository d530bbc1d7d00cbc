//! Host configuration parsed from `storefront.toml`.
//!
//! Every section and key is optional. Relative paths are resolved against
//! the directory holding the config file (or the working directory when no
//! file exists).
//!
//! ```toml
//! [storage]
//! database = "var/storefront.db"
//! unprovisioned = "permissive"
//!
//! [extensions]
//! bundled = "extensions/bundled"
//! discovered = "extensions/installed"
//!
//! [hooks]
//! on_callback_error = "propagate"
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shop_extensions::{ExtensionRoot, ManifestScanner};
use shop_hooks::CallbackErrorPolicy;
use shop_registry::UnprovisionedPolicy;

use crate::error::{Error, Result};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "storefront.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "STOREFRONT_CONFIG";

fn default_database() -> PathBuf {
    PathBuf::from("var/storefront.db")
}

fn default_bundled() -> PathBuf {
    PathBuf::from("extensions/bundled")
}

fn default_discovered() -> PathBuf {
    PathBuf::from("extensions/installed")
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageSection {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub unprovisioned: UnprovisionedPolicy,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: default_database(),
            unprovisioned: UnprovisionedPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionsSection {
    /// Extensions shipped with the host. Scanned first.
    #[serde(default = "default_bundled")]
    pub bundled: PathBuf,
    /// User-installed extensions.
    #[serde(default = "default_discovered")]
    pub discovered: PathBuf,
}

impl Default for ExtensionsSection {
    fn default() -> Self {
        Self {
            bundled: default_bundled(),
            discovered: default_discovered(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HooksSection {
    #[serde(default)]
    pub on_callback_error: CallbackErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Default `tracing` filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Parsed `storefront.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub extensions: ExtensionsSection,
    #[serde(default)]
    pub hooks: HooksSection,
    #[serde(default)]
    pub logging: LoggingSection,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl HostConfig {
    /// Parse config text. Relative paths stay relative to `base_dir`.
    ///
    /// # Example
    ///
    /// ```
    /// use shop_core::config::HostConfig;
    /// use std::path::Path;
    ///
    /// let config = HostConfig::parse(
    ///     r#"
    /// [storage]
    /// database = "data/shop.db"
    /// "#,
    ///     Path::new("/srv/shop"),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(config.database_path(), Path::new("/srv/shop/data/shop.db"));
    /// ```
    pub fn parse(content: &str, base_dir: &Path) -> std::result::Result<Self, toml::de::Error> {
        let mut config: HostConfig = toml::from_str(content)?;
        config.base_dir = base_dir.to_path_buf();
        Ok(config)
    }

    /// Defaults, resolved against `base_dir`.
    pub fn with_base_dir(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            ..Self::default()
        }
    }

    /// Load `path`. A missing file yields the defaults resolved against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::with_base_dir(&base_dir));
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::parse(&content, &base_dir).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded host config");
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.storage.database)
    }

    pub fn bundled_root(&self) -> PathBuf {
        self.resolve(&self.extensions.bundled)
    }

    pub fn discovered_root(&self) -> PathBuf {
        self.resolve(&self.extensions.discovered)
    }

    /// Scanner over the bundled root followed by the discovered root.
    pub fn scanner(&self) -> ManifestScanner {
        ManifestScanner::new()
            .with_root(ExtensionRoot::bundled(self.bundled_root()))
            .with_root(ExtensionRoot::discovered(self.discovered_root()))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
