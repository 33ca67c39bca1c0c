//! The type registry: qualified names bound to arena-backed descriptors.
//!
//! A registry lives for exactly one configuration pass. It starts empty, is
//! populated monotonically (a name is bound at most once and never unbound),
//! and is frozen when the pass completes. A failed registration can leave
//! partial bindings behind; callers abort the whole pass on any error.

use std::collections::BTreeMap;

use crate::descriptor::{RecordDesc, Signature, TypeDesc};
use crate::error::{MetaError, Result, Site};
use crate::hooks::PackageContext;
use crate::id::{InstanceId, ModuleId, PackageId, RecordId, SignatureId};
use crate::instance::Instance;
use crate::module::Module;
use crate::package::Package;
use crate::value::Value;

/// What a qualified name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Package(PackageId),
    Module(ModuleId),
    Record(RecordId),
    Signature(SignatureId),
}

impl Binding {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Binding::Package(_) => "package",
            Binding::Module(_) => "module",
            Binding::Record(_) => "record",
            Binding::Signature(_) => "signature",
        }
    }
}

/// Process-wide state of one configuration pass.
#[derive(Debug, Default)]
pub struct Registry {
    names: BTreeMap<String, Binding>,
    pub(crate) records: Vec<RecordDesc>,
    pub(crate) signatures: Vec<Signature>,
    pub(crate) packages: Vec<Package>,
    pub(crate) modules: Vec<Module>,
    pub(crate) instances: Vec<Instance>,
    pub(crate) context: PackageContext,
    frozen: bool,
}

impl Registry {
    /// Create an empty registry for a new pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` exactly once.
    pub fn bind(&mut self, name: &str, binding: Binding) -> Result<()> {
        self.ensure_open(name)?;
        if self.names.contains_key(name) {
            return Err(MetaError::DuplicateName {
                name: name.to_string(),
            });
        }
        tracing::debug!(name, kind = binding.kind_name(), "bind");
        self.names.insert(name.to_string(), binding);
        Ok(())
    }

    /// Existence check; never fails.
    pub fn has(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Absolute lookup.
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        self.names.get(name).copied()
    }

    /// Look up `name` as requested from package `from`.
    ///
    /// Tries the name as given, then relative to `from`, then relative to
    /// each of `from`'s imports in declaration order.
    pub fn resolve_strict(&self, name: &str, from: &str) -> Result<Binding> {
        if let Some(binding) = self.lookup(name) {
            return Ok(binding);
        }
        let mut prefixes = vec![from.to_string()];
        if let Some(Binding::Package(pid)) = self.lookup(from) {
            prefixes.extend(self.packages[pid.index()].imports().iter().map(|i| i.name.clone()));
        }
        prefixes
            .iter()
            .find_map(|prefix| self.lookup(&format!("{prefix}.{name}")))
            .ok_or_else(|| MetaError::UnresolvedReference {
                name: name.to_string(),
                context: from.to_string(),
            })
    }

    pub fn resolve_package(&self, name: &str, from: &str) -> Result<PackageId> {
        match self.resolve_strict(name, from)? {
            Binding::Package(id) => Ok(id),
            other => Err(wrong_kind(name, "package", other)),
        }
    }

    pub fn resolve_module(&self, name: &str, from: &str) -> Result<ModuleId> {
        match self.resolve_strict(name, from)? {
            Binding::Module(id) => Ok(id),
            other => Err(wrong_kind(name, "module", other)),
        }
    }

    pub fn resolve_record(&self, name: &str, from: &str) -> Result<RecordId> {
        match self.resolve_strict(name, from)? {
            Binding::Record(id) => Ok(id),
            other => Err(wrong_kind(name, "record", other)),
        }
    }

    pub fn resolve_signature(&self, name: &str, from: &str) -> Result<SignatureId> {
        match self.resolve_strict(name, from)? {
            Binding::Signature(id) => Ok(id),
            other => Err(wrong_kind(name, "signature", other)),
        }
    }

    /// Find a module by its fully-qualified name.
    pub fn module_named(&self, name: &str) -> Result<ModuleId> {
        self.resolve_module(name, "")
    }

    /// Bound names starting with `prefix`, in lexical order.
    pub fn names_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, Binding)> + 'a {
        self.names
            .range(prefix.to_string()..)
            .take_while(move |(name, _)| name.starts_with(prefix))
            .map(|(name, binding)| (name.as_str(), *binding))
    }

    /// Bind a forward-declared, uninitialised record.
    pub fn declare_record(&mut self, name: &str) -> Result<RecordId> {
        self.ensure_open(name)?;
        let id = RecordId::from_index(self.records.len());
        self.bind(name, Binding::Record(id))?;
        self.records.push(RecordDesc::declared(name));
        Ok(id)
    }

    /// Initialise a declared record with its name and parent edge.
    pub fn init_record(&mut self, id: RecordId, name: &str, parent: Option<RecordId>) -> Result<()> {
        self.ensure_open(name)?;
        let mut cursor = parent;
        while let Some(p) = cursor {
            if p == id {
                return Err(MetaError::construction(
                    name,
                    Site::Module,
                    "record cannot inherit from itself",
                ));
            }
            cursor = self.records[p.index()].parent();
        }
        self.records[id.index()].init(name, parent)
    }

    /// Declare and initialise a record in one step.
    pub fn add_record(&mut self, name: &str, parent: Option<RecordId>) -> Result<RecordId> {
        let id = self.declare_record(name)?;
        self.init_record(id, name, parent)?;
        Ok(id)
    }

    pub fn add_signature(&mut self, name: &str, signature: Signature) -> Result<SignatureId> {
        let id = SignatureId::from_index(self.signatures.len());
        self.bind(name, Binding::Signature(id))?;
        self.signatures.push(signature);
        Ok(id)
    }

    /// Register a package, resolving its imports first.
    ///
    /// Every import must already be registered and satisfy its minimum version.
    pub fn add_package(&mut self, package: Package) -> Result<PackageId> {
        self.ensure_open(package.name())?;
        if self.has(package.name()) {
            return Err(MetaError::DuplicateName {
                name: package.name().to_string(),
            });
        }
        for import in package.imports() {
            let pid = match self.lookup(&import.name) {
                Some(Binding::Package(pid)) => pid,
                Some(other) => return Err(wrong_kind(&import.name, "package", other)),
                None => {
                    return Err(MetaError::UnresolvedReference {
                        name: import.name.clone(),
                        context: package.name().to_string(),
                    })
                }
            };
            let actual = self.packages[pid.index()].version();
            if !import.accepts(actual) {
                return Err(MetaError::VersionMismatch {
                    package: package.name().to_string(),
                    import: import.name.clone(),
                    required: import.min_version.clone().unwrap_or_else(|| actual.clone()),
                    actual: actual.clone(),
                });
            }
        }
        let id = PackageId::from_index(self.packages.len());
        self.bind(package.name(), Binding::Package(id))?;
        tracing::info!(package = package.name(), version = %package.version(), "package registered");
        self.packages.push(package);
        Ok(id)
    }

    pub fn record(&self, id: RecordId) -> &RecordDesc {
        &self.records[id.index()]
    }

    /// Mutable access to a record for adding fields and functions.
    pub fn record_mut(&mut self, id: RecordId) -> Result<&mut RecordDesc> {
        if self.frozen {
            return Err(MetaError::Frozen {
                name: self.records[id.index()].name().to_string(),
            });
        }
        Ok(&mut self.records[id.index()])
    }

    pub fn signature(&self, id: SignatureId) -> &Signature {
        &self.signatures[id.index()]
    }

    pub fn package(&self, id: PackageId) -> &Package {
        &self.packages[id.index()]
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.index()]
    }

    pub fn packages(&self) -> impl Iterator<Item = (PackageId, &Package)> {
        self.packages
            .iter()
            .enumerate()
            .map(|(i, p)| (PackageId::from_index(i), p))
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId::from_index(i), m))
    }

    /// All registry-owned instances in creation order.
    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstanceId::from_index(i), inst))
    }

    /// Write a module-level config field as configuration code.
    pub fn set_module_config(&mut self, module: ModuleId, field: &str, value: Value) -> Result<()> {
        self.ensure_open(field)?;
        self.modules[module.index()].state.config.set(field, value)
    }

    /// Write a module-level instance default (`PARAMS`) as configuration code.
    pub fn set_module_param(&mut self, module: ModuleId, field: &str, value: Value) -> Result<()> {
        self.ensure_open(field)?;
        self.modules[module.index()].state.params.set(field, value)
    }

    /// The current-package context used to scope hooks.
    pub fn context(&self) -> &PackageContext {
        &self.context
    }

    /// Seal all module-level state and refuse further mutation.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        for module in &mut self.modules {
            module.state.seal();
        }
        self.frozen = true;
        tracing::info!(
            packages = self.packages.len(),
            modules = self.modules.len(),
            instances = self.instances.len(),
            "registry frozen"
        );
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Render a type descriptor with record names resolved.
    pub fn type_name(&self, ty: &TypeDesc) -> String {
        match ty {
            TypeDesc::Bool => "bool".into(),
            TypeDesc::Num => "num".into(),
            TypeDesc::CNum(ctype) => format!("num{ctype}"),
            TypeDesc::Str => "string".into(),
            TypeDesc::Opaque => "obj".into(),
            TypeDesc::Fxn => "fxn".into(),
            TypeDesc::Record(id) => self.record(*id).name().to_string(),
            TypeDesc::Array(elem) => format!("{}[]", self.type_name(elem)),
            TypeDesc::Map(elem) => format!("map<{}>", self.type_name(elem)),
        }
    }

    pub(crate) fn ensure_open(&self, name: &str) -> Result<()> {
        if self.frozen {
            return Err(MetaError::Frozen {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn wrong_kind(name: &str, expected: &'static str, found: Binding) -> MetaError {
    MetaError::WrongKind {
        name: name.to_string(),
        expected,
        found: found.kind_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Import, Version};

    fn with_packages() -> Registry {
        let mut reg = Registry::new();
        reg.add_package(Package::new("xdc.platform", Version::new(1, 0, 1)))
            .unwrap();
        reg.add_package(
            Package::new("ti.platforms.tiva", Version::new(1, 0, 0))
                .with_import(Import::new("xdc.platform", Some(Version::new(1, 0, 1)))),
        )
        .unwrap();
        reg
    }

    #[test]
    fn bind_once() {
        let mut reg = Registry::new();
        let first = reg.declare_record("a.B").unwrap();
        let err = reg.bind("a.B", Binding::Record(RecordId::from_index(9))).unwrap_err();
        assert_eq!(err, MetaError::DuplicateName { name: "a.B".into() });
        assert_eq!(reg.lookup("a.B"), Some(Binding::Record(first)));
    }

    #[test]
    fn resolve_relative_through_imports() {
        let mut reg = with_packages();
        let board = reg.add_record("xdc.platform.IPlatform.Board", None).unwrap();
        let local = reg.add_record("ti.platforms.tiva.Local", None).unwrap();

        assert_eq!(
            reg.resolve_record("IPlatform.Board", "ti.platforms.tiva").unwrap(),
            board
        );
        assert_eq!(reg.resolve_record("Local", "ti.platforms.tiva").unwrap(), local);
        assert_eq!(
            reg.resolve_record("xdc.platform.IPlatform.Board", "anywhere").unwrap(),
            board
        );
        assert!(matches!(
            reg.resolve_strict("IPlatform.Board", "unrelated.pkg"),
            Err(MetaError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn resolve_wrong_kind() {
        let reg = with_packages();
        let err = reg.resolve_record("xdc.platform", "").unwrap_err();
        assert!(matches!(
            err,
            MetaError::WrongKind {
                expected: "record",
                found: "package",
                ..
            }
        ));
    }

    #[test]
    fn import_must_be_loaded_first() {
        let mut reg = Registry::new();
        let err = reg
            .add_package(
                Package::new("ti.platforms.tiva", Version::new(1, 0, 0))
                    .with_import(Import::new("xdc.platform", None)),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::UnresolvedReference { ref name, .. } if name == "xdc.platform"));
    }

    #[test]
    fn import_version_checked() {
        let mut reg = Registry::new();
        reg.add_package(Package::new("xdc.platform", Version::new(1, 0, 0)))
            .unwrap();
        let err = reg
            .add_package(
                Package::new("ti.platforms.tiva", Version::new(1, 0, 0))
                    .with_import(Import::new("xdc.platform", Some(Version::new(1, 0, 1)))),
            )
            .unwrap_err();
        assert!(matches!(err, MetaError::VersionMismatch { .. }));
        assert!(!reg.has("ti.platforms.tiva"));
    }

    #[test]
    fn record_cycle_rejected() {
        let mut reg = Registry::new();
        let a = reg.add_record("p.A", None).unwrap();
        let b = reg.declare_record("p.B").unwrap();
        reg.init_record(b, "p.B", Some(a)).unwrap();
        let c = reg.declare_record("p.C").unwrap();
        assert!(reg.init_record(c, "p.C", Some(c)).is_err());
    }

    #[test]
    fn frozen_registry_rejects_bindings() {
        let mut reg = with_packages();
        reg.freeze();
        assert!(reg.is_frozen());
        assert!(matches!(reg.declare_record("x.Y"), Err(MetaError::Frozen { .. })));
        assert!(reg.has("xdc.platform"));
    }

    #[test]
    fn prefix_listing() {
        let mut reg = Registry::new();
        reg.add_record("xdc.platform.IPlatform.Board", None).unwrap();
        reg.add_record("xdc.platform.IPlatform.Memory", None).unwrap();
        reg.add_record("xdc.platform.IPlatformX", None).unwrap();
        let names: Vec<_> = reg
            .names_with_prefix("xdc.platform.IPlatform.")
            .map(|(n, _)| n)
            .collect();
        assert_eq!(
            names,
            vec!["xdc.platform.IPlatform.Board", "xdc.platform.IPlatform.Memory"]
        );
    }
}
