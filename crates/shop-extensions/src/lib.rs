//! Extension discovery for the storefront host.
//!
//! This crate reads `extension.json` descriptors from the bundled and
//! discovered extension roots, normalizes them into [`ExtensionManifest`]s, and
//! evaluates the informational `requires` constraints they declare. It never
//! touches persisted state.

pub mod error;
pub mod manifest;
pub mod requirement;
pub mod scanner;

/// The canonical filename for extension manifest files.
///
/// Every extension directory must carry exactly one file with this name at its
/// root to be discovered.
pub const MANIFEST_FILENAME: &str = "extension.json";

pub use error::{Error, Result};
pub use manifest::{EntryPoint, ExtensionManifest, ExtensionSource};
pub use requirement::{RequirementIssue, check_requirements, parse_version};
pub use scanner::{Discovery, DiscoveryWarning, ExtensionRoot, ManifestScanner};
