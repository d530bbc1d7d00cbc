//! Providers described by a TOML file inside the extension directory.
//!
//! Extensions without compiled code name such a file in their manifest's
//! `provider_file`. It can contribute menu entries at boot and config
//! defaults at install:
//!
//! ```toml
//! [config]
//! report_window_days = 30
//!
//! [[menu]]
//! key = "acme-reports"
//! title = "Acme reports"
//! url = "/admin/acme/reports"
//! location = "admin"
//! order = 40
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use shop_extensions::ExtensionManifest;
use shop_registry::{ExtensionConfig, MenuEntry};

use crate::error::BootRegistrationError;
use crate::provider::{BootContext, ExtensionProvider, InstallContext, ProviderResult};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderFile {
    #[serde(default)]
    config: toml::Table,
    #[serde(default)]
    menu: Vec<MenuEntry>,
}

/// Provider loaded from a manifest's `provider_file`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclarativeProvider {
    path: PathBuf,
    config_defaults: ExtensionConfig,
    menu: Vec<MenuEntry>,
}

impl DeclarativeProvider {
    /// Load the provider file named by `manifest`.
    pub fn load(manifest: &ExtensionManifest) -> Result<Self, BootRegistrationError> {
        let code = manifest.code.as_str();
        let Some(path) = manifest.provider_file_path() else {
            return Err(BootRegistrationError::Unresolved {
                code: code.to_string(),
                provider: manifest.entry_point.provider.clone(),
            });
        };
        let fail = |reason: String| BootRegistrationError::ProviderFile {
            code: code.to_string(),
            path: path.clone(),
            reason,
        };

        let resolved = contained_path(&manifest.path, &path).map_err(&fail)?;
        let content = std::fs::read_to_string(&resolved).map_err(|e| fail(e.to_string()))?;
        Self::parse(&content, &resolved).map_err(fail)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, String> {
        let file: ProviderFile = toml::from_str(content).map_err(|e| e.to_string())?;
        let config_defaults = match serde_json::to_value(&file.config).map_err(|e| e.to_string())? {
            serde_json::Value::Object(map) => map,
            _ => ExtensionConfig::new(),
        };
        Ok(Self {
            path: path.to_path_buf(),
            config_defaults,
            menu: file.menu,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn menu(&self) -> &[MenuEntry] {
        &self.menu
    }

    pub fn config_defaults(&self) -> &ExtensionConfig {
        &self.config_defaults
    }
}

impl ExtensionProvider for DeclarativeProvider {
    fn boot(&self, ctx: &mut BootContext<'_>) -> ProviderResult {
        for entry in &self.menu {
            ctx.add_menu_entry(entry.clone());
        }
        Ok(())
    }

    /// Store config defaults the extension does not have yet.
    fn install(&self, ctx: &InstallContext<'_>) -> ProviderResult {
        if self.config_defaults.is_empty() {
            return Ok(());
        }
        let code = &ctx.manifest().code;
        let existing = ctx
            .tx()
            .find_by_code(code)?
            .map(|record| record.config)
            .unwrap_or_default();

        let missing: ExtensionConfig = self
            .config_defaults
            .iter()
            .filter(|(key, _)| !existing.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if !missing.is_empty() {
            ctx.tx().merge_config(code, &missing)?;
        }
        Ok(())
    }
}

/// Canonical `file`, provided it exists and stays under `dir` after symlinks
/// are followed.
fn contained_path(dir: &Path, file: &Path) -> Result<PathBuf, String> {
    let dir = dunce::canonicalize(dir).map_err(|e| format!("extension directory unreadable: {e}"))?;
    let file = dunce::canonicalize(file).map_err(|e| e.to_string())?;
    if !file.starts_with(&dir) {
        return Err("provider file resolves outside the extension directory".to_string());
    }
    Ok(file)
}
