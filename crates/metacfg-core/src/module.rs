//! Module descriptors.
//!
//! A module composes four records bound under its qualified name:
//! `<module>.Module` (module-level config), `<module>.Instance`,
//! `<module>.Params`, and `<module>.Object` (the in-place layout of an
//! instance). Interfaces are modules flagged [`ModuleFlags::ABSTRACT`].

use bitflags::bitflags;

use crate::descriptor::{FieldDecl, Signature};
use crate::hooks::Capsule;
use crate::id::{InstanceId, ModuleId, PackageId, RecordId};
use crate::value::FieldSet;

bitflags! {
    /// Module capability bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModuleFlags: u32 {
        /// Instances may be created with `create`.
        const INSTANCES = 1 << 0;
        /// Instances may be constructed into caller-owned storage.
        const STATIC_OBJECTS = 1 << 1;
        /// Object size varies per instance.
        const PER_INSTANCE_SIZE = 1 << 2;
        /// Instances delegate to another module.
        const DELEGATE = 1 << 3;
        /// Exists only at configuration time.
        const HOST_ONLY = 1 << 4;
        /// An interface: declares members, cannot be instantiated.
        const ABSTRACT = 1 << 5;
        /// Unknown params keys are stored verbatim.
        const OPEN = 1 << 6;
        /// No target runtime support is generated.
        const NO_RUNTIME = 1 << 7;
    }
}

impl ModuleFlags {
    /// Parse a kebab-case flag name as used in declaration files.
    pub fn from_kebab(name: &str) -> Option<Self> {
        let flag = match name {
            "instances" => Self::INSTANCES,
            "static-objects" => Self::STATIC_OBJECTS,
            "per-instance-size" => Self::PER_INSTANCE_SIZE,
            "delegate" => Self::DELEGATE,
            "host-only" => Self::HOST_ONLY,
            "abstract" => Self::ABSTRACT,
            "open" => Self::OPEN,
            "no-runtime" => Self::NO_RUNTIME,
            _ => return None,
        };
        Some(flag)
    }

    /// Kebab-case names of the set flags.
    pub fn names(self) -> Vec<&'static str> {
        const ALL: [(ModuleFlags, &str); 8] = [
            (ModuleFlags::INSTANCES, "instances"),
            (ModuleFlags::STATIC_OBJECTS, "static-objects"),
            (ModuleFlags::PER_INSTANCE_SIZE, "per-instance-size"),
            (ModuleFlags::DELEGATE, "delegate"),
            (ModuleFlags::HOST_ONLY, "host-only"),
            (ModuleFlags::ABSTRACT, "abstract"),
            (ModuleFlags::OPEN, "open"),
            (ModuleFlags::NO_RUNTIME, "no-runtime"),
        ];
        ALL.iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

/// A function a module declares itself (interfaces mostly).
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    /// `None` declares a generic meta-function.
    pub signature: Option<Signature>,
    pub optional: bool,
}

/// Everything needed to register a module.
#[derive(Debug, Clone, Default)]
pub struct ModuleSpec {
    /// Name relative to the owning package, e.g. `Platform`.
    pub name: String,
    /// Interface this module inherits from, qualified or relative.
    pub inherits: Option<String>,
    /// Extension script reference handed to the hook loader.
    pub capsule: Option<String>,
    pub flags: ModuleFlags,
    /// Module-level config fields.
    pub config: Vec<FieldDecl>,
    pub instance: Vec<FieldDecl>,
    pub params: Vec<FieldDecl>,
    pub functions: Vec<FunctionSpec>,
}

impl ModuleSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: ModuleFlags::INSTANCES,
            ..Self::default()
        }
    }

    pub fn inherits(mut self, interface: impl Into<String>) -> Self {
        self.inherits = Some(interface.into());
        self
    }

    pub fn capsule(mut self, script: impl Into<String>) -> Self {
        self.capsule = Some(script.into());
        self
    }

    pub fn flags(mut self, flags: ModuleFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn config_field(mut self, field: FieldDecl) -> Self {
        self.config.push(field);
        self
    }

    /// Declare an instance field that is also a construction parameter.
    pub fn instance_param(mut self, field: FieldDecl) -> Self {
        self.params.push(field.clone());
        self.instance.push(field);
        self
    }

    pub fn instance_field(mut self, field: FieldDecl) -> Self {
        self.instance.push(field);
        self
    }

    pub fn function(mut self, function: FunctionSpec) -> Self {
        self.functions.push(function);
        self
    }
}

/// Module-level mutable state: config values and the `PARAMS` defaults.
#[derive(Debug, Clone)]
pub struct ModuleState {
    pub config: FieldSet,
    /// Instance defaults copied into every new instance.
    pub params: FieldSet,
}

impl ModuleState {
    pub fn seal(&mut self) {
        self.config.seal();
        self.params.seal();
    }
}

/// The four records composing a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleRecords {
    pub module: RecordId,
    pub instance: RecordId,
    pub params: RecordId,
    pub object: RecordId,
}

/// A registered module descriptor.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) name: String,
    pub(crate) package: PackageId,
    pub(crate) flags: ModuleFlags,
    pub(crate) records: ModuleRecords,
    /// Interfaces satisfied, nearest first, outermost last.
    pub(crate) capability_chain: Vec<ModuleId>,
    pub(crate) capsule: Capsule,
    pub(crate) state: ModuleState,
    pub(crate) instances: Vec<InstanceId>,
    pub(crate) object_count: usize,
    pub(crate) used: bool,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> PackageId {
        self.package
    }

    pub fn flags(&self) -> ModuleFlags {
        self.flags
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(ModuleFlags::ABSTRACT)
    }

    pub fn records(&self) -> ModuleRecords {
        self.records
    }

    pub fn capability_chain(&self) -> &[ModuleId] {
        &self.capability_chain
    }

    pub fn capsule(&self) -> &Capsule {
        &self.capsule
    }

    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    /// Live instances created with `create`, in ordinal order.
    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    /// Number of objects bound with `construct`.
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    pub fn is_used(&self) -> bool {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldFlag, TypeDesc};
    use crate::value::Value;

    #[test]
    fn flag_names() {
        let flags = ModuleFlags::INSTANCES | ModuleFlags::HOST_ONLY;
        assert_eq!(flags.names(), vec!["instances", "host-only"]);
        assert_eq!(ModuleFlags::from_kebab("static-objects"), Some(ModuleFlags::STATIC_OBJECTS));
        assert_eq!(ModuleFlags::from_kebab("multiple"), None);
        assert_eq!(ModuleFlags::from_kebab("STATIC_OBJECTS"), None);
        assert_eq!(ModuleFlags::from_name("STATIC_OBJECTS"), Some(ModuleFlags::STATIC_OBJECTS));
        for name in ModuleFlags::all().names() {
            assert_eq!(ModuleFlags::from_kebab(name).map(|f| f.names()), Some(vec![name]));
        }
    }

    #[test]
    fn instance_param_mirrors_into_params() {
        let spec = ModuleSpec::new("Platform").instance_param(FieldDecl::new(
            "clockRate",
            TypeDesc::Num,
            Value::Num(1.0),
            FieldFlag::WriteThenHidden,
        ));
        assert_eq!(spec.instance.len(), 1);
        assert_eq!(spec.params.len(), 1);
        assert_eq!(spec.params[0].name, "clockRate");
        assert!(spec.flags.contains(ModuleFlags::INSTANCES));
    }
}
