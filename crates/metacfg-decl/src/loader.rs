//! Package tree loading and extension-script probing.
//!
//! Packages live at `<root>/<dotted/name/as/path>/package.toml`. Loading a
//! package loads its imports first, depth first, so every import is
//! registered (and finalized) before the package that names it.

use std::path::{Path, PathBuf};

use metacfg_core::hooks::{INSTANCE_META_INIT, MODULE_META_INIT, MODULE_USE, MODULE_VALIDATE};
use metacfg_core::{Binding, Capsule, ConfigPass, HookLoader, HookResult, PackageId, Value};

use crate::error::{DeclError, Result};
use crate::lower::register_package;
use crate::package_decl::PackageDecl;

const MANIFEST: &str = "package.toml";
const MAX_DEPTH: usize = 64;

/// A directory of package declarations.
#[derive(Debug, Clone)]
pub struct PackageTree {
    root: PathBuf,
}

impl PackageTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the declaration of `package` is expected.
    pub fn manifest_path(&self, package: &str) -> PathBuf {
        package
            .split('.')
            .fold(self.root.clone(), |path, segment| path.join(segment))
            .join(MANIFEST)
    }

    /// Read and parse the declaration of `package`.
    pub fn read(&self, package: &str) -> Result<PackageDecl> {
        let path = self.manifest_path(package);
        if !path.is_file() {
            return Err(DeclError::PackageNotFound {
                name: package.to_string(),
                path,
            });
        }
        let decl = PackageDecl::load(&path)?;
        if decl.package.name != package {
            return Err(DeclError::invalid(format!(
                "{} declares package '{}', expected '{package}'",
                path.display(),
                decl.package.name
            )));
        }
        Ok(decl)
    }

    /// Load `package` and everything it imports into the pass.
    ///
    /// Already registered packages are returned as is.
    pub fn load(&self, pass: &mut ConfigPass, package: &str) -> Result<PackageId> {
        let mut stack = Vec::new();
        self.load_one(pass, package, &mut stack)
    }

    fn load_one(&self, pass: &mut ConfigPass, package: &str, stack: &mut Vec<String>) -> Result<PackageId> {
        if let Some(Binding::Package(id)) = pass.registry().lookup(package) {
            return Ok(id);
        }
        if stack.iter().any(|p| p == package) {
            let mut chain = stack.clone();
            chain.push(package.to_string());
            return Err(DeclError::ImportCycle { chain });
        }
        // Guard against pathologically deep import chains
        if stack.len() >= MAX_DEPTH {
            return Err(DeclError::invalid(format!(
                "import depth exceeds {MAX_DEPTH} at '{package}'"
            )));
        }

        let decl = self.read(package)?;
        stack.push(package.to_string());
        for import in &decl.imports {
            self.load_one(pass, &import.name, stack)?;
        }
        stack.pop();

        let id = register_package(pass, &decl)?;
        tracing::info!(package, modules = decl.modules.len(), "package loaded");
        Ok(id)
    }

    /// Use `module` and load the packages its `module$use` hook asks for.
    pub fn use_module(&self, pass: &mut ConfigPass, module: &str) -> Result<Vec<PackageId>> {
        let deps = pass.use_module(module)?;
        deps.iter().map(|dep| self.load(pass, dep)).collect()
    }
}

/// A hook loader for declaration trees without a script runtime.
///
/// Checks that each referenced script exists under `root` and scans it for
/// top-level `function <name>(` definitions. Lifecycle hooks found this way
/// are installed as no-ops; bound functions are installed as natives that
/// report the missing runtime when called.
#[derive(Debug, Clone)]
pub struct ScriptScanLoader {
    root: PathBuf,
}

impl ScriptScanLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl HookLoader for ScriptScanLoader {
    fn load(&self, module: &str, script: &str) -> HookResult<Capsule> {
        let path = self.root.join(script);
        let source = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read extension script {}: {e}", path.display()))?;

        let mut capsule = Capsule::for_script(script);
        let mut lifecycle = Vec::new();
        for name in script_functions(&source) {
            capsule = match name {
                MODULE_VALIDATE => capsule.with_validate(|_, _| Ok(())),
                MODULE_META_INIT => capsule.with_module_meta_init(|_, _| Ok(())),
                INSTANCE_META_INIT => capsule.with_instance_meta_init(|_, _, _| Ok(())),
                MODULE_USE => capsule.with_use(|_, _| Ok(Vec::new())),
                function => {
                    let owned = function.to_string();
                    capsule.with_function(function, move |scope, _: &[Value]| {
                        Err(format!("no script runtime to run '{owned}' of {}", scope.module()))
                    })
                }
            };
            if name.contains('$') {
                lifecycle.push(name);
            }
        }
        if !lifecycle.is_empty() {
            tracing::warn!(module, ?lifecycle, "extension hooks present but not executed");
        }
        Ok(capsule)
    }
}

/// Names of top-level `function name(` definitions, in source order.
fn script_functions(source: &str) -> Vec<&str> {
    source
        .lines()
        .filter_map(|line| line.strip_prefix("function"))
        .filter_map(|rest| {
            let rest = rest.strip_prefix(char::is_whitespace)?.trim_start();
            let end = rest.find('(')?;
            let name = rest[..end].trim_end();
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            valid.then_some(name)
        })
        .collect()
}
