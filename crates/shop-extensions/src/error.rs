use std::path::PathBuf;

/// Errors raised while reading a single extension manifest.
///
/// The scanner downgrades every one of these to a
/// [`DiscoveryWarning`](crate::DiscoveryWarning); they only reach callers that
/// parse manifests directly.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to parse the manifest JSON.
    #[error("failed to parse extension manifest: {0}")]
    ManifestParse(#[from] serde_json::Error),

    /// Extension manifest file not found at the expected path.
    #[error("extension manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    /// The manifest has no `code`, or it is blank.
    #[error("extension manifest is missing the required `code` field")]
    MissingCode,

    /// Invalid extension code.
    #[error("invalid extension code '{code}': {reason}")]
    InvalidCode { code: String, reason: String },

    /// `provider_file` points outside the extension directory.
    #[error("provider_file '{path}' must be a relative path inside the extension directory")]
    InvalidProviderFile { path: String },

    /// I/O error reading extension files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
