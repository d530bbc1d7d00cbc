//! Extension manifest parsing for `extension.json` files.
//!
//! A manifest names an extension, its version, and the provider the host
//! loads to boot it. Only `code` is mandatory.
//!
//! # Example
//!
//! ```json
//! {
//!   "code": "flat-rate-shipping",
//!   "name": "Flat rate shipping",
//!   "version": "1.2.0",
//!   "provider": "FlatRateShipping\\Provider",
//!   "provider_file": "provider.toml",
//!   "requires": { "storefront": ">=0.1" }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Version assumed when a manifest does not declare one.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Which extension root a manifest was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionSource {
    /// Shipped with the host.
    Bundled,
    /// Installed by a user into the discovered root.
    Discovered,
}

impl fmt::Display for ExtensionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundled => write!(f, "bundled"),
            Self::Discovered => write!(f, "discovered"),
        }
    }
}

/// How the host locates the code that boots an extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    /// Provider name, looked up in the host's provider catalog.
    pub provider: Option<String>,
    /// Explicit provider file, relative to the extension directory.
    pub provider_file: Option<PathBuf>,
}

/// Normalized extension manifest.
///
/// Derived from disk on every scan and never cached across processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionManifest {
    /// Unique slug.
    pub code: String,
    /// Display name; defaults to `code`.
    pub name: String,
    /// Version string; defaults to [`DEFAULT_VERSION`].
    pub version: String,
    pub description: Option<String>,
    pub entry_point: EntryPoint,
    /// Dependency name to version constraint. Informational only.
    pub requires: BTreeMap<String, String>,
    /// Extension directory.
    pub path: PathBuf,
    pub source: ExtensionSource,
}

/// On-disk shape, before normalization.
#[derive(Debug, Deserialize)]
struct RawManifest {
    code: Option<String>,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    provider: Option<String>,
    provider_file: Option<String>,
    requires: Option<BTreeMap<String, String>>,
}

impl ExtensionManifest {
    /// Parse a manifest from its JSON text.
    ///
    /// `path` is the extension directory the descriptor was read from.
    pub fn from_json(content: &str, path: &Path, source: ExtensionSource) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(content)?;
        Self::normalize(raw, path, source)
    }

    /// Read the manifest inside an extension directory.
    pub fn from_dir(dir: &Path, source: ExtensionSource) -> Result<Self> {
        let manifest_path = dir.join(crate::MANIFEST_FILENAME);
        if !manifest_path.is_file() {
            return Err(Error::ManifestNotFound(manifest_path));
        }
        let content =
            std::fs::read_to_string(&manifest_path).map_err(|e| Error::io(&manifest_path, e))?;
        Self::from_json(&content, dir, source)
    }

    /// Absolute location of the declared provider file, if any.
    pub fn provider_file_path(&self) -> Option<PathBuf> {
        self.entry_point
            .provider_file
            .as_ref()
            .map(|file| self.path.join(file))
    }

    fn normalize(raw: RawManifest, path: &Path, source: ExtensionSource) -> Result<Self> {
        let code = non_blank(raw.code).ok_or(Error::MissingCode)?;
        validate_code(&code)?;

        let provider_file = match non_blank(raw.provider_file) {
            Some(file) => Some(validate_provider_file(&file)?),
            None => None,
        };

        Ok(Self {
            name: non_blank(raw.name).unwrap_or_else(|| code.clone()),
            version: non_blank(raw.version).unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            description: non_blank(raw.description),
            entry_point: EntryPoint {
                provider: non_blank(raw.provider),
                provider_file,
            },
            requires: raw.requires.unwrap_or_default(),
            path: path.to_path_buf(),
            source,
            code,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_code(code: &str) -> Result<()> {
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidCode {
            code: code.to_string(),
            reason: "extension code must contain only alphanumeric characters, hyphens, or underscores"
                .to_string(),
        });
    }
    Ok(())
}

/// Provider files must stay inside the extension directory.
fn validate_provider_file(file: &str) -> Result<PathBuf> {
    let path = Path::new(file);
    if path.has_root() || path.components().any(|c| c == Component::ParentDir) {
        return Err(Error::InvalidProviderFile {
            path: file.to_string(),
        });
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const FULL: &str = r#"{
        "code": "flat-rate-shipping",
        "name": "Flat rate shipping",
        "version": "1.2.0",
        "description": "Charges a fixed amount per order",
        "provider": "FlatRateShipping\\Provider",
        "provider_file": "provider.toml",
        "requires": { "storefront": ">=0.1" }
    }"#;

    fn parse(json: &str) -> Result<ExtensionManifest> {
        ExtensionManifest::from_json(json, Path::new("/ext/x"), ExtensionSource::Discovered)
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(FULL).unwrap();

        assert_eq!(manifest.code, "flat-rate-shipping");
        assert_eq!(manifest.name, "Flat rate shipping");
        assert_eq!(manifest.version, "1.2.0");
        assert_eq!(
            manifest.description.as_deref(),
            Some("Charges a fixed amount per order")
        );
        assert_eq!(
            manifest.entry_point.provider.as_deref(),
            Some("FlatRateShipping\\Provider")
        );
        assert_eq!(
            manifest.provider_file_path(),
            Some(PathBuf::from("/ext/x/provider.toml"))
        );
        assert_eq!(manifest.requires.get("storefront").map(String::as_str), Some(">=0.1"));
        assert_eq!(manifest.source, ExtensionSource::Discovered);
    }

    #[test]
    fn test_minimal_manifest_gets_defaults() {
        let manifest = parse(r#"{ "code": "acme" }"#).unwrap();

        assert_eq!(manifest.name, "acme");
        assert_eq!(manifest.version, DEFAULT_VERSION);
        assert!(manifest.requires.is_empty());
        assert_eq!(manifest.entry_point, EntryPoint::default());
    }

    #[test]
    fn test_blank_fields_are_treated_as_absent() {
        let manifest = parse(r#"{ "code": "acme", "name": "  ", "version": "" }"#).unwrap();
        assert_eq!(manifest.name, "acme");
        assert_eq!(manifest.version, DEFAULT_VERSION);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let manifest = parse(r#"{ "code": "acme", "homepage": "https://example.com" }"#).unwrap();
        assert_eq!(manifest.code, "acme");
    }

    #[rstest]
    #[case(r#"{ "name": "No code" }"#)]
    #[case(r#"{ "code": "   " }"#)]
    fn test_missing_code_rejected(#[case] json: &str) {
        assert!(matches!(parse(json).unwrap_err(), Error::MissingCode));
    }

    #[rstest]
    #[case("bad code")]
    #[case("acme/evil")]
    #[case("caf\u{e9}")]
    fn test_invalid_code_rejected(#[case] code: &str) {
        let json = serde_json::json!({ "code": code }).to_string();
        let err = parse(&json).unwrap_err();
        assert!(matches!(err, Error::InvalidCode { .. }), "got {err:?}");
        assert!(err.to_string().contains(code));
    }

    #[rstest]
    #[case("/etc/provider.toml")]
    #[case("../other/provider.toml")]
    #[case("nested/../../escape.toml")]
    fn test_provider_file_must_stay_inside(#[case] file: &str) {
        let json = serde_json::json!({ "code": "acme", "provider_file": file }).to_string();
        assert!(matches!(
            parse(&json).unwrap_err(),
            Error::InvalidProviderFile { .. }
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            parse("{ \"code\": ").unwrap_err(),
            Error::ManifestParse(_)
        ));
    }

    #[test]
    fn test_requires_must_be_string_map() {
        assert!(parse(r#"{ "code": "acme", "requires": ["storefront"] }"#).is_err());
    }

    #[test]
    fn test_from_dir_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(crate::MANIFEST_FILENAME), FULL).unwrap();

        let manifest = ExtensionManifest::from_dir(dir.path(), ExtensionSource::Bundled).unwrap();
        assert_eq!(manifest.code, "flat-rate-shipping");
        assert_eq!(manifest.path, dir.path());
        assert_eq!(manifest.source, ExtensionSource::Bundled);
    }

    #[test]
    fn test_from_dir_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ExtensionManifest::from_dir(dir.path(), ExtensionSource::Bundled).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFound(_)));
    }
}
