//! Declaration front-end error types.

use std::path::PathBuf;

use metacfg_core::MetaError;

/// Errors raised while reading declarations or applying a user configuration.
#[derive(Debug, thiserror::Error)]
pub enum DeclError {
    /// A declaration parsed but is not well formed.
    #[error("invalid declaration: {detail}")]
    Invalid { detail: String },

    /// A type string could not be parsed or names no record.
    #[error("invalid type '{ty}': {detail}")]
    InvalidType { ty: String, detail: String },

    /// No `package.toml` exists where the package tree expects it.
    #[error("package '{name}' not found at {}", path.display())]
    PackageNotFound { name: String, path: PathBuf },

    /// Packages import each other in a loop.
    #[error("import cycle: {}", chain.join(" -> "))]
    ImportCycle { chain: Vec<String> },

    /// An object model operation failed.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A version string is not valid semver.
    #[error("invalid version: {0}")]
    Version(#[from] semver::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeclError {
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        DeclError::Invalid {
            detail: detail.into(),
        }
    }
}

/// Result type alias for declaration operations.
pub type Result<T> = std::result::Result<T, DeclError>;
