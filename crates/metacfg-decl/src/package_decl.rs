//! Package declaration file (`package.toml`) parsing.
//!
//! A `package.toml` names the package, its imports, package-level typedef
//! records, and the modules the package defines:
//!
//! ```toml
//! [package]
//! name = "ti.platforms.tiva"
//! version = "1.0.0"
//! build-date = "2019-04-17"
//!
//! [[import]]
//! name = "xdc.platform"
//! min-version = "1.0.1"
//!
//! [[module]]
//! name = "Platform"
//! inherits = "xdc.platform.IPlatform"
//! capsule = "Platform.xs"
//! flags = ["instances", "host-only"]
//!
//! [[module.config]]
//! name = "BOARD"
//! type = "IPlatform.Board"
//! flag = "wh"
//!
//! [[module.instance]]
//! name = "clockRate"
//! type = "num"
//! default = 1.0
//! flag = "wh"
//! ```

use std::path::Path;

use metacfg_core::FieldFlag;
use serde::{Deserialize, Serialize};

use crate::error::{DeclError, Result};

/// A complete package declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDecl {
    pub package: PackageHeader,
    #[serde(default, rename = "import")]
    pub imports: Vec<ImportDecl>,
    /// Typedef records bound as `<package>.<name>`.
    #[serde(default, rename = "record")]
    pub records: Vec<RecordDecl>,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageHeader {
    /// Dotted package name, e.g. `ti.platforms.tiva`.
    pub name: String,
    pub version: String,
    #[serde(default, rename = "build-date")]
    pub build_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub name: String,
    #[serde(default, rename = "min-version")]
    pub min_version: Option<String>,
}

/// A structured typedef.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDecl {
    pub name: String,
    /// Record this one extends, resolved like any other type name.
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldEntry>,
}

/// A module or interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDecl {
    /// Unqualified module name.
    pub name: String,
    /// Interface this module inherits from.
    #[serde(default)]
    pub inherits: Option<String>,
    /// Extension script reference, relative to the package directory.
    #[serde(default)]
    pub capsule: Option<String>,
    /// Kebab-case flag names. Omitted means `["instances"]`.
    #[serde(default)]
    pub flags: Option<Vec<String>>,
    /// Typedef records bound as `<module>.<name>`.
    #[serde(default, rename = "record")]
    pub records: Vec<RecordDecl>,
    /// Module-level config fields.
    #[serde(default)]
    pub config: Vec<FieldEntry>,
    /// Instance fields; mirrored into Params unless `param = false`.
    #[serde(default)]
    pub instance: Vec<FieldEntry>,
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionEntry>,
}

/// A declared field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: Option<toml::Value>,
    #[serde(default = "default_flag")]
    pub flag: FieldFlag,
    /// Implementing modules must supply this field (interfaces only).
    #[serde(default)]
    pub required: bool,
    /// Whether an instance field is also a creation parameter.
    #[serde(default = "default_param")]
    pub param: bool,
}

fn default_flag() -> FieldFlag {
    FieldFlag::WriteOnce
}

fn default_param() -> bool {
    true
}

/// A declared function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgEntry>,
    /// Element type of a variadic tail.
    #[serde(default)]
    pub variadic: Option<String>,
    #[serde(default = "default_returns")]
    pub returns: u8,
    /// Implementing modules may leave the hook absent.
    #[serde(default)]
    pub optional: bool,
    /// A generic meta-function without a signature.
    #[serde(default)]
    pub meta: bool,
}

fn default_returns() -> u8 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub default: Option<toml::Value>,
}

impl PackageDecl {
    /// Parse a package declaration from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let decl: PackageDecl = toml::from_str(input)?;

        if decl.package.name.is_empty() {
            return Err(DeclError::invalid("package.name is required"));
        }
        if decl.package.name.split('.').any(str::is_empty) {
            return Err(DeclError::invalid(format!(
                "package name '{}' has an empty segment",
                decl.package.name
            )));
        }
        for module in &decl.modules {
            if module.name.is_empty() || module.name.contains('.') {
                return Err(DeclError::invalid(format!(
                    "module name '{}' in '{}' must be a single identifier",
                    module.name, decl.package.name
                )));
            }
        }

        Ok(decl)
    }

    /// Parse a package declaration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_platform_package() {
        let toml = r#"
[package]
name = "ti.platforms.tiva"
version = "1.0.0"
build-date = "2019-04-17"

[[import]]
name = "xdc.platform"
min-version = "1.0.1"

[[module]]
name = "Platform"
inherits = "xdc.platform.IPlatform"
capsule = "Platform.xs"
flags = ["instances", "host-only"]

[[module.config]]
name = "BOARD"
type = "IPlatform.Board"
flag = "wh"
default = { boardName = "EK-TM4C1294XL" }

[[module.instance]]
name = "clockRate"
type = "num"
default = 1.0
flag = "wh"

[[module.instance]]
name = "deviceName"
type = "string"
param = false

[[module.function]]
name = "getCpuDataSheet"
args = [{ name = "cpuId", type = "string" }]
"#;
        let decl = PackageDecl::parse(toml).unwrap();
        assert_eq!(decl.package.name, "ti.platforms.tiva");
        assert_eq!(decl.package.build_date.as_deref(), Some("2019-04-17"));
        assert_eq!(decl.imports[0].min_version.as_deref(), Some("1.0.1"));

        let module = &decl.modules[0];
        assert_eq!(module.flags.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(module.config[0].flag, FieldFlag::WriteThenHidden);
        assert!(module.config[0].default.as_ref().unwrap().is_table());
        assert!(module.instance[0].param);
        assert!(!module.instance[1].param);
        assert_eq!(module.instance[1].flag, FieldFlag::WriteOnce);
        assert_eq!(module.functions[0].returns, 1);
        assert_eq!(module.functions[0].args[0].ty, "string");
    }

    #[test]
    fn parse_minimal_package() {
        let decl = PackageDecl::parse("[package]\nname = \"xdc\"\nversion = \"1.0.0\"\n").unwrap();
        assert!(decl.imports.is_empty());
        assert!(decl.modules.is_empty());
    }

    #[test]
    fn reject_dotted_module_name() {
        let toml = r#"
[package]
name = "a.b"
version = "1.0.0"

[[module]]
name = "c.D"
"#;
        assert!(matches!(PackageDecl::parse(toml), Err(DeclError::Invalid { .. })));
    }

    #[test]
    fn reject_unknown_flag_code() {
        let toml = r#"
[package]
name = "a.b"
version = "1.0.0"

[[module]]
name = "M"

[[module.config]]
name = "x"
type = "num"
flag = "rw"
"#;
        assert!(matches!(PackageDecl::parse(toml), Err(DeclError::Toml(_))));
    }
}
