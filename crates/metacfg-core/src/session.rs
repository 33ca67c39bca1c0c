//! One configuration pass, from empty registry to frozen configuration.
//!
//! A [`ConfigPass`] owns the registry and the hook loader for the duration of
//! the pass and addresses modules by qualified name. [`ConfigPass::finish`]
//! finalizes any package still open, freezes the registry, and hands back a
//! read-only [`Configuration`].

use serde::Serialize;

use crate::error::Result;
use crate::factory::{ObjectSlot, Params};
use crate::hooks::HookLoader;
use crate::id::{InstanceId, ModuleId, PackageId};
use crate::instance::{Instance, InstanceSummary};
use crate::module::ModuleSpec;
use crate::package::{Package, Version};
use crate::registry::Registry;
use crate::value::Value;

/// A configuration pass in progress.
pub struct ConfigPass {
    registry: Registry,
    loader: Box<dyn HookLoader>,
    /// Statically constructed objects, in construction order.
    objects: Vec<ObjectSlot>,
}

impl ConfigPass {
    pub fn new(loader: impl HookLoader + 'static) -> Self {
        Self {
            registry: Registry::new(),
            loader: Box::new(loader),
            objects: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Direct registry access for front ends that declare typedef records.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Register a package. Its imports must already be registered.
    pub fn add_package(&mut self, package: Package) -> Result<PackageId> {
        self.registry.add_package(package)
    }

    pub fn register_module(&mut self, package: PackageId, spec: ModuleSpec) -> Result<ModuleId> {
        self.registry.register_module(package, spec, self.loader.as_ref())
    }

    /// Run `module$meta$init` for the package's modules and close it.
    pub fn finish_package(&mut self, package: PackageId) -> Result<()> {
        self.registry.finalize_package(package)
    }

    /// Mark `module` as used; returns the extra package dependencies it declared.
    pub fn use_module(&mut self, module: &str) -> Result<Vec<String>> {
        let id = self.registry.module_named(module)?;
        self.registry.use_module(id)
    }

    pub fn set_config(&mut self, module: &str, field: &str, value: Value) -> Result<()> {
        let id = self.registry.module_named(module)?;
        self.registry.set_module_config(id, field, value)
    }

    pub fn set_param(&mut self, module: &str, field: &str, value: Value) -> Result<()> {
        let id = self.registry.module_named(module)?;
        self.registry.set_module_param(id, field, value)
    }

    pub fn create(&mut self, module: &str, name: &str, params: Params) -> Result<InstanceId> {
        let id = self.registry.module_named(module)?;
        self.registry.create(id, name, params)
    }

    /// Construct a static object owned by the pass; returns its position.
    pub fn construct(&mut self, module: &str, name: &str, params: Params) -> Result<usize> {
        let id = self.registry.module_named(module)?;
        let mut slot = ObjectSlot::new();
        self.registry.construct(&mut slot, id, name, params)?;
        self.objects.push(slot);
        Ok(self.objects.len() - 1)
    }

    /// Finalize open packages, freeze the registry, and end the pass.
    pub fn finish(mut self) -> Result<Configuration> {
        let open: Vec<PackageId> = self
            .registry
            .packages()
            .filter(|(_, p)| !p.is_finalized())
            .map(|(id, _)| id)
            .collect();
        for id in open {
            self.registry.finalize_package(id)?;
        }
        self.registry.freeze();
        let objects = self.objects.into_iter().filter_map(ObjectSlot::into_instance).collect();
        Ok(Configuration {
            registry: self.registry,
            objects,
        })
    }
}

/// The sealed result of a configuration pass.
#[derive(Debug)]
pub struct Configuration {
    registry: Registry,
    objects: Vec<Instance>,
}

impl Configuration {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        self.registry.instance(id)
    }

    /// Registry-owned instances in creation order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.registry.instances().map(|(_, inst)| inst)
    }

    /// Statically constructed objects in construction order.
    pub fn objects(&self) -> &[Instance] {
        &self.objects
    }

    /// Find an instance or object by module and instance name.
    pub fn find(&self, module: &str, name: &str) -> Option<&Instance> {
        self.instances()
            .chain(self.objects.iter())
            .find(|inst| inst.module_name() == module && inst.name() == name)
    }

    /// Call a bound function on a sealed instance.
    pub fn call(&self, instance: &Instance, function: &str, args: &[Value]) -> Result<Value> {
        self.registry.call(instance, function, args)
    }

    pub fn summary(&self) -> ConfigurationSummary<'_> {
        ConfigurationSummary {
            packages: self
                .registry
                .packages()
                .map(|(_, p)| PackageSummary {
                    name: p.name(),
                    version: p.version(),
                    uses: p.use_deps(),
                })
                .collect(),
            instances: self.instances().map(Instance::summary).collect(),
            objects: self.objects.iter().map(Instance::summary).collect(),
        }
    }
}

/// JSON-friendly view of a finished pass.
#[derive(Debug, Serialize)]
pub struct ConfigurationSummary<'a> {
    pub packages: Vec<PackageSummary<'a>>,
    pub instances: Vec<InstanceSummary<'a>>,
    pub objects: Vec<InstanceSummary<'a>>,
}

#[derive(Debug, Serialize)]
pub struct PackageSummary<'a> {
    pub name: &'a str,
    pub version: &'a Version,
    pub uses: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDecl, FieldFlag, TypeDesc};
    use crate::error::MetaError;
    use crate::hooks::{Capsule, StaticLoader};
    use crate::module::ModuleFlags;

    fn pass() -> (ConfigPass, PackageId) {
        let loader = StaticLoader::new().with(
            "Timer.xs",
            Capsule::for_script("Timer.xs").with_use(|_, _| Ok(vec!["ti.sysbios.family".into()])),
        );
        let mut pass = ConfigPass::new(loader);
        let pkg = pass
            .add_package(Package::new("ti.sysbios.hal", Version::new(2, 0, 0)))
            .unwrap();
        let timer = ModuleSpec::new("Timer")
            .capsule("Timer.xs")
            .flags(ModuleFlags::INSTANCES | ModuleFlags::STATIC_OBJECTS)
            .config_field(FieldDecl::new("numTimers", TypeDesc::Num, Value::Num(4.0), FieldFlag::WriteOnce))
            .instance_param(FieldDecl::new("period", TypeDesc::Num, Value::Num(1000.0), FieldFlag::WriteOnce));
        pass.register_module(pkg, timer).unwrap();
        (pass, pkg)
    }

    #[test]
    fn full_pass() {
        let (mut pass, pkg) = pass();
        assert_eq!(pass.use_module("ti.sysbios.hal.Timer").unwrap(), vec!["ti.sysbios.family".to_string()]);
        pass.finish_package(pkg).unwrap();
        pass.set_config("ti.sysbios.hal.Timer", "numTimers", Value::Num(2.0)).unwrap();
        pass.set_param("ti.sysbios.hal.Timer", "period", Value::Num(500.0)).unwrap();
        pass.create("ti.sysbios.hal.Timer", "t0", Params::new()).unwrap();
        let pos = pass
            .construct("ti.sysbios.hal.Timer", "s0", Params::new().with("period", 10.0))
            .unwrap();
        assert_eq!(pos, 0);

        let config = pass.finish().unwrap();
        assert!(config.registry().is_frozen());
        let t0 = config.find("ti.sysbios.hal.Timer", "t0").unwrap();
        assert_eq!(t0.get("period").unwrap(), &Value::Num(500.0));
        assert_eq!(config.objects()[0].get("period").unwrap(), &Value::Num(10.0));

        let timer = config.registry().module_named("ti.sysbios.hal.Timer").unwrap();
        let state = config.registry().module(timer).state();
        assert!(state.config.is_sealed());
        assert_eq!(state.config.get("numTimers").unwrap(), &Value::Num(2.0));

        let pkg = config.registry().package(config.registry().module(timer).package());
        assert!(pkg.is_finalized());
        assert_eq!(pkg.use_deps(), ["ti.sysbios.family".to_string()]);

        let summary = serde_json::to_value(config.summary()).unwrap();
        assert_eq!(summary["packages"][0]["name"], "ti.sysbios.hal");
        assert_eq!(summary["instances"][0]["name"], "t0");
        assert_eq!(summary["objects"][0]["category"], "Object");
    }

    #[test]
    fn instances_need_a_finished_package() {
        let (mut pass, pkg) = pass();
        let err = pass.create("ti.sysbios.hal.Timer", "t0", Params::new()).unwrap_err();
        assert!(matches!(err, MetaError::Construction { .. }));
        let err = pass.construct("ti.sysbios.hal.Timer", "s0", Params::new()).unwrap_err();
        assert!(matches!(err, MetaError::Construction { .. }));

        pass.finish_package(pkg).unwrap();
        pass.create("ti.sysbios.hal.Timer", "t0", Params::new()).unwrap();
        let config = pass.finish().unwrap();
        assert_eq!(config.instances().count(), 1);
        assert!(config.objects().is_empty());
    }

    #[test]
    fn unknown_module_name() {
        let (mut pass, _) = pass();
        let err = pass.create("ti.sysbios.hal.Clock", "c0", Params::new()).unwrap_err();
        assert!(matches!(err, MetaError::UnresolvedReference { .. }));
    }
}
