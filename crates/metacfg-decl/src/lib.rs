//! Declaration front end for the metacfg object model.
//!
//! Reads `package.toml` package declarations from a package tree, lowers
//! them into registry calls, and applies `*.cfg.toml` user configurations
//! to a configuration pass.
//!
//! ## Modules
//!
//! - [`package_decl`]: `package.toml` parsing
//! - [`types`]: Type string parser
//! - [`lower`]: Declaration → object model lowering
//! - [`loader`]: Package tree loading and extension-script probing
//! - [`config`]: User configuration files

pub mod config;
pub mod error;
pub mod loader;
pub mod lower;
pub mod package_decl;
pub mod types;

// Re-export key types for convenience
pub use config::{configure, UserConfig};
pub use error::{DeclError, Result};
pub use loader::{PackageTree, ScriptScanLoader};
pub use lower::register_package;
pub use package_decl::PackageDecl;
pub use types::{parse_type, TypeScope};
