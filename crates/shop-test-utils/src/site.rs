//! [`TestSite`] builder for host scenarios.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use shop_core::{Host, HostConfig, ProviderCatalog};
use tempfile::TempDir;

/// A temporary host root laid out like a default `storefront.toml` expects:
/// `extensions/bundled`, `extensions/installed` and `var/storefront.db`.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::json;
/// use shop_test_utils::TestSite;
///
/// let site = TestSite::new();
/// site.add_discovered(json!({ "code": "acme", "provider": "Acme\\Provider" }));
/// let host = site.host(Default::default());
/// ```
pub struct TestSite {
    temp_dir: TempDir,
}

impl Default for TestSite {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSite {
    pub fn new() -> Self {
        let site = Self {
            temp_dir: TempDir::new().unwrap(),
        };
        fs::create_dir_all(site.bundled_root()).unwrap();
        fs::create_dir_all(site.discovered_root()).unwrap();
        site
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn bundled_root(&self) -> PathBuf {
        self.root().join("extensions/bundled")
    }

    pub fn discovered_root(&self) -> PathBuf {
        self.root().join("extensions/installed")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join(shop_core::config::CONFIG_FILENAME)
    }

    /// Write `manifest` into `extensions/installed/<code>/extension.json`.
    pub fn add_discovered(&self, manifest: Value) -> PathBuf {
        write_extension(&self.discovered_root(), manifest)
    }

    /// Write `manifest` into `extensions/bundled/<code>/extension.json`.
    pub fn add_bundled(&self, manifest: Value) -> PathBuf {
        write_extension(&self.bundled_root(), manifest)
    }

    /// Write an extra file into an extension directory.
    pub fn write_extension_file(&self, extension_dir: &Path, name: &str, content: &str) {
        fs::write(extension_dir.join(name), content).unwrap();
    }

    /// Write a raw directory under the discovered root, for malformed cases.
    pub fn add_raw_discovered(&self, dir: &str, manifest: &str) -> PathBuf {
        let path = self.discovered_root().join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("extension.json"), manifest).unwrap();
        path
    }

    pub fn remove_discovered(&self, dir: &str) {
        fs::remove_dir_all(self.discovered_root().join(dir)).unwrap();
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).unwrap();
    }

    pub fn config(&self) -> HostConfig {
        HostConfig::load(&self.config_path()).unwrap()
    }

    /// Open a host on this site (not provisioned).
    pub fn host(&self, catalog: ProviderCatalog) -> Host {
        Host::open(self.config(), catalog).unwrap()
    }

    /// Open a host and provision its registry.
    pub fn provisioned_host(&self, catalog: ProviderCatalog) -> Host {
        let mut host = self.host(catalog);
        host.provision().unwrap();
        host
    }
}

fn write_extension(root: &Path, manifest: Value) -> PathBuf {
    let code = manifest["code"]
        .as_str()
        .expect("fixture manifest needs a string code");
    let dir = root.join(code);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("extension.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    dir
}
