//! User configuration files (`*.cfg.toml`).
//!
//! A user configuration picks the packages and modules a program uses, sets
//! module-level values, and declares instances:
//!
//! ```toml
//! packages = ["ti.platforms.tiva"]
//! uses = ["ti.platforms.tiva.Platform"]
//!
//! [modules."ti.platforms.tiva.Platform".params]
//! clockRate = 120.0
//!
//! [[instance]]
//! module = "ti.platforms.tiva.Platform"
//! name = "p0"
//! params = { clockRate = 2.5 }
//! ```
//!
//! Packages of every module mentioned are loaded even when `packages` does
//! not list them.

use std::collections::BTreeMap;
use std::path::Path;

use metacfg_core::{ConfigPass, Configuration, Params};
use serde::{Deserialize, Serialize};

use crate::error::{DeclError, Result};
use crate::loader::{PackageTree, ScriptScanLoader};
use crate::lower::toml_to_value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Packages to load up front.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Modules to mark used, in order.
    #[serde(default)]
    pub uses: Vec<String>,
    /// Module-level settings keyed by qualified module name.
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleSettings>,
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceEntry>,
}

/// Module-level values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleSettings {
    /// Module config fields, e.g. `BOARD`.
    #[serde(default)]
    pub config: BTreeMap<String, toml::Value>,
    /// Module-level instance defaults (`PARAMS`).
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

/// One instance to create or construct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEntry {
    pub module: String,
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
    /// Construct into pass-owned storage instead of creating.
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

impl UserConfig {
    pub fn parse(input: &str) -> Result<Self> {
        let config: UserConfig = toml::from_str(input)?;
        for entry in &config.instances {
            if entry.name.is_empty() {
                return Err(DeclError::invalid(format!(
                    "instance of '{}' needs a name",
                    entry.module
                )));
            }
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Every package the configuration refers to, in first-mention order.
    pub fn referenced_packages(&self) -> Vec<String> {
        let modules = self
            .uses
            .iter()
            .chain(self.modules.keys())
            .chain(self.instances.iter().map(|i| &i.module))
            .filter_map(|m| m.rsplit_once('.').map(|(pkg, _)| pkg.to_string()));
        let mut packages: Vec<String> = Vec::new();
        for pkg in self.packages.iter().cloned().chain(modules) {
            if !packages.contains(&pkg) {
                packages.push(pkg);
            }
        }
        packages
    }

    /// Apply this configuration to a pass: load, use, set, instantiate.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn apply(&self, tree: &PackageTree, pass: &mut ConfigPass) -> Result<()> {
        for package in self.referenced_packages() {
            tree.load(pass, &package)?;
        }
        for module in &self.uses {
            tree.use_module(pass, module)?;
        }
        for (module, settings) in &self.modules {
            for (field, value) in &settings.config {
                pass.set_config(module, field, toml_to_value(value)?)?;
            }
            for (field, value) in &settings.params {
                pass.set_param(module, field, toml_to_value(value)?)?;
            }
        }
        for entry in &self.instances {
            let params: Params = entry
                .params
                .iter()
                .map(|(k, v)| Ok::<_, DeclError>((k.as_str(), toml_to_value(v)?)))
                .collect::<Result<_>>()?;
            if entry.is_static {
                pass.construct(&entry.module, &entry.name, params)?;
            } else {
                pass.create(&entry.module, &entry.name, params)?;
            }
            tracing::debug!(module = %entry.module, name = %entry.name, "instance declared");
        }
        Ok(())
    }
}

/// Run a whole pass over the package tree at `root` for `config`.
///
/// Extension scripts are scanned, not executed.
pub fn configure(root: &Path, config: &UserConfig) -> Result<Configuration> {
    let tree = PackageTree::new(root);
    let mut pass = ConfigPass::new(ScriptScanLoader::new(root));
    config.apply(&tree, &mut pass)?;
    Ok(pass.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_config() {
        let input = r#"
packages = ["ti.platforms.tiva"]
uses = ["ti.sysbios.knl.Task"]

[modules."ti.platforms.tiva.Platform".config]
BOARD = { boardName = "custom" }

[modules."ti.platforms.tiva.Platform".params]
clockRate = 120

[[instance]]
module = "ti.platforms.tiva.Platform"
name = "p0"
params = { clockRate = 2.5 }

[[instance]]
module = "xdc.runtime.Memory"
name = "heap"
static = true
"#;
        let config = UserConfig::parse(input).unwrap();
        assert_eq!(config.instances.len(), 2);
        assert!(config.instances[1].is_static);
        assert_eq!(
            config.modules["ti.platforms.tiva.Platform"].params["clockRate"],
            toml::Value::Integer(120)
        );
        assert_eq!(
            config.referenced_packages(),
            vec!["ti.platforms.tiva", "ti.sysbios.knl", "xdc.runtime"]
        );
    }

    #[test]
    fn unnamed_instance_rejected() {
        let input = "[[instance]]\nmodule = \"a.B\"\nname = \"\"\n";
        assert!(matches!(UserConfig::parse(input), Err(DeclError::Invalid { .. })));
    }

    #[test]
    fn empty_config_is_valid() {
        let config = UserConfig::parse("").unwrap();
        assert!(config.referenced_packages().is_empty());
    }
}
