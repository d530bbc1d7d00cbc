//! Filesystem discovery of extension manifests.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::manifest::{ExtensionManifest, ExtensionSource};

/// One directory whose immediate subdirectories are extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRoot {
    pub path: PathBuf,
    pub source: ExtensionSource,
}

impl ExtensionRoot {
    pub fn bundled(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: ExtensionSource::Bundled,
        }
    }

    pub fn discovered(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: ExtensionSource::Discovered,
        }
    }
}

/// A directory that was skipped during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryWarning {
    pub path: PathBuf,
    pub reason: String,
}

impl fmt::Display for DiscoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Result of one scan.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub manifests: Vec<ExtensionManifest>,
    pub warnings: Vec<DiscoveryWarning>,
}

impl Discovery {
    pub fn find(&self, code: &str) -> Option<&ExtensionManifest> {
        self.manifests.iter().find(|m| m.code == code)
    }
}

/// Walks the configured extension roots and reads one manifest per
/// subdirectory.
///
/// Stateless and read-only; every call rescans the disk. Roots are visited in
/// the order they were added and subdirectories in lexical order, so the
/// first manifest claiming a code wins.
#[derive(Debug, Clone, Default)]
pub struct ManifestScanner {
    roots: Vec<ExtensionRoot>,
}

impl ManifestScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root to scan after the existing ones.
    pub fn with_root(mut self, root: ExtensionRoot) -> Self {
        self.roots.push(root);
        self
    }

    pub fn roots(&self) -> &[ExtensionRoot] {
        &self.roots
    }

    /// Discover every readable manifest, logging skipped directories.
    pub fn discover(&self) -> Vec<ExtensionManifest> {
        self.scan().manifests
    }

    /// Discover manifests and report skipped directories alongside them.
    pub fn scan(&self) -> Discovery {
        let mut discovery = Discovery::default();
        let mut seen: HashSet<String> = HashSet::new();

        for root in &self.roots {
            let dirs = match extension_dirs(&root.path) {
                Ok(Some(dirs)) => dirs,
                Ok(None) => {
                    tracing::debug!(root = %root.path.display(), "extension root does not exist");
                    continue;
                }
                Err(e) => {
                    warn(&mut discovery, &root.path, format!("extension root unreadable: {e}"));
                    continue;
                }
            };

            for dir in dirs {
                let manifest = match ExtensionManifest::from_dir(&dir, root.source) {
                    Ok(manifest) => manifest,
                    Err(e) => {
                        warn(&mut discovery, &dir, e.to_string());
                        continue;
                    }
                };

                if !seen.insert(manifest.code.clone()) {
                    warn(
                        &mut discovery,
                        &dir,
                        format!("duplicate extension code '{}', keeping the first", manifest.code),
                    );
                    continue;
                }

                tracing::debug!(
                    code = %manifest.code,
                    source = %manifest.source,
                    path = %dir.display(),
                    "discovered extension"
                );
                discovery.manifests.push(manifest);
            }
        }

        discovery
    }
}

fn warn(discovery: &mut Discovery, path: &Path, reason: String) {
    tracing::warn!(path = %path.display(), %reason, "skipping extension directory");
    discovery.warnings.push(DiscoveryWarning {
        path: path.to_path_buf(),
        reason,
    });
}

/// Immediate subdirectories of `root`, sorted, or `None` if `root` is absent.
fn extension_dirs(root: &Path) -> std::io::Result<Option<Vec<PathBuf>>> {
    if !root.exists() {
        return Ok(None);
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(canonical_or_raw(path));
        }
    }
    dirs.sort();
    Ok(Some(dirs))
}

fn canonical_or_raw(path: PathBuf) -> PathBuf {
    match dunce::canonicalize(&path) {
        Ok(canonical) => canonical,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "could not canonicalize, using path as listed");
            path
        }
    }
}
