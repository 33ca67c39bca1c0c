//! Module registration, `module$use`, and package finalization.

use crate::capability::{check_capabilities, interface_chain, resolved_fields};
use crate::descriptor::{FieldDecl, FieldFlag, FunctionDecl, TypeDesc};
use crate::error::{MetaError, Result, Site};
use crate::hooks::{Capsule, HookLoader, HookScope, MODULE_META_INIT, MODULE_USE, MODULE_VALIDATE};
use crate::id::{ModuleId, PackageId, RecordId};
use crate::module::{FunctionSpec, Module, ModuleFlags, ModuleRecords, ModuleSpec, ModuleState};
use crate::registry::{Binding, Registry};
use crate::value::{FieldSet, Value};

/// Record suffixes re-exported from interfaces are everything except these.
const MODULE_RECORDS: [&str; 4] = ["Module", "Instance", "Params", "Object"];

impl Registry {
    /// Register a module in `package`.
    ///
    /// Declares the module's four records, inherits them from the interface
    /// named by `spec.inherits`, loads and scans the capsule, checks the
    /// capability chain, runs `module$validate`, and finally binds the
    /// module under `<package>.<name>`. A second registration of the same
    /// qualified name fails before anything is bound.
    #[tracing::instrument(level = "debug", skip_all, fields(module = %spec.name))]
    pub fn register_module(
        &mut self,
        package: PackageId,
        spec: ModuleSpec,
        loader: &dyn HookLoader,
    ) -> Result<ModuleId> {
        let pkg_name = self.package(package).name().to_string();
        let qualified = format!("{pkg_name}.{}", spec.name);
        self.ensure_open(&qualified)?;
        if self.has(&qualified) {
            return Err(MetaError::DuplicateName { name: qualified });
        }
        if self.package(package).is_finalized() {
            return Err(MetaError::construction(
                &qualified,
                Site::Module,
                format!("package '{pkg_name}' is already finalized"),
            ));
        }

        let (interface, capability_chain) = match &spec.inherits {
            Some(name) => {
                let id = self.resolve_module(name, &pkg_name)?;
                if !self.module(id).is_abstract() {
                    return Err(MetaError::WrongKind {
                        name: name.clone(),
                        expected: "interface",
                        found: "module",
                    });
                }
                (Some(id), interface_chain(self, id))
            }
            None => (None, Vec::new()),
        };
        let parents = interface.map(|id| self.module(id).records());

        let records = ModuleRecords {
            module: self.declare_record(&format!("{qualified}.Module"))?,
            instance: self.declare_record(&format!("{qualified}.Instance"))?,
            params: self.declare_record(&format!("{qualified}.Params"))?,
            object: self.declare_record(&format!("{qualified}.Object"))?,
        };
        self.init_record(records.module, &format!("{qualified}.Module"), parents.map(|p| p.module))?;
        self.init_record(records.instance, &format!("{qualified}.Instance"), parents.map(|p| p.instance))?;
        self.init_record(records.params, &format!("{qualified}.Params"), parents.map(|p| p.params))?;
        self.init_record(records.object, &format!("{qualified}.Object"), Some(records.instance))?;

        let capsule = match &spec.capsule {
            Some(script) => loader.load(&qualified, script).map_err(|detail| {
                MetaError::construction(&qualified, Site::Hook("$capsule".into()), detail)
            })?,
            None => Capsule::empty(),
        };

        if spec.flags.contains(ModuleFlags::HOST_ONLY) {
            let hostonly = FieldDecl::new("$hostonly", TypeDesc::Num, Value::Num(1.0), FieldFlag::ReadOnly);
            for record in [records.module, records.instance, records.params] {
                self.record_mut(record)?.add_field(hostonly.clone())?;
            }
        }
        for field in spec.config {
            self.record_mut(records.module)?.add_field(field)?;
        }
        for field in spec.instance {
            self.record_mut(records.instance)?.add_field(field)?;
        }
        for field in spec.params {
            self.record_mut(records.params)?.add_field(field)?;
        }

        self.bind_functions(&qualified, &records, &spec.functions, &capsule, &capability_chain)?;

        for hook in capsule.lifecycle_hooks() {
            self.record_mut(records.module)?.add_function(FunctionDecl {
                name: hook.to_string(),
                signature: None,
                hook: None,
                optional: true,
            })?;
        }

        if !spec.flags.contains(ModuleFlags::ABSTRACT) {
            check_capabilities(self, &qualified, records.module, records.instance, &capability_chain)?;
        }

        self.inherit_typedefs(&qualified, &capability_chain)?;

        let state = ModuleState {
            config: self.field_set(&qualified, records.module)?,
            params: self.field_set(&format!("{qualified}.PARAMS"), records.params)?,
        };
        let module = Module {
            name: qualified.clone(),
            package,
            flags: spec.flags,
            records,
            capability_chain,
            capsule,
            state,
            instances: Vec::new(),
            object_count: 0,
            used: false,
        };

        if let Some(validator) = module.capsule.validator() {
            let _guard = self.context.enter(&pkg_name);
            let scope = HookScope::new(&self.context, &qualified);
            validator
                .validate(&scope, &module)
                .map_err(|detail| MetaError::construction(&qualified, Site::Hook(MODULE_VALIDATE.into()), detail))?;
        }

        let id = ModuleId::from_index(self.modules.len());
        self.bind(&qualified, Binding::Module(id))?;
        self.modules.push(module);
        self.packages[package.index()].push_module(id);
        tracing::debug!(module = %qualified, flags = ?spec.flags, "module registered");
        Ok(id)
    }

    /// Bind the module's own functions and the interface functions its
    /// capsule implements onto the Instance and Object records.
    fn bind_functions(
        &mut self,
        qualified: &str,
        records: &ModuleRecords,
        own: &[FunctionSpec],
        capsule: &Capsule,
        chain: &[ModuleId],
    ) -> Result<()> {
        let mut bound = Vec::new();
        for function in own {
            let signature = match &function.signature {
                Some(sig) => Some(self.add_signature(&format!("{qualified}$${}", function.name), sig.clone())?),
                None => None,
            };
            bound.push(FunctionDecl {
                name: function.name.clone(),
                signature,
                hook: capsule.function(&function.name),
                optional: function.optional,
            });
        }
        for &iface in chain {
            let declared = self.record(self.module(iface).records().instance).functions().to_vec();
            for function in declared {
                if bound.iter().any(|b| b.name == function.name) {
                    continue;
                }
                if let Some(hook) = capsule.function(&function.name) {
                    bound.push(FunctionDecl {
                        hook: Some(hook),
                        ..function
                    });
                }
            }
        }
        for function in bound {
            self.record_mut(records.instance)?.add_function(function.clone())?;
            self.record_mut(records.object)?.add_function(function)?;
        }
        Ok(())
    }

    /// Alias an interface's typedef records under the module's name,
    /// e.g. `xdc.platform.IPlatform.Board` as `ti.platforms.tiva.Platform.Board`.
    fn inherit_typedefs(&mut self, qualified: &str, chain: &[ModuleId]) -> Result<()> {
        let mut aliases = Vec::new();
        for &iface in chain {
            let prefix = format!("{}.", self.module(iface).name());
            for (name, binding) in self.names_with_prefix(&prefix) {
                let suffix = &name[prefix.len()..];
                if suffix.contains('.') || MODULE_RECORDS.contains(&suffix) {
                    continue;
                }
                if let Binding::Record(_) = binding {
                    aliases.push((format!("{qualified}.{suffix}"), binding));
                }
            }
        }
        for (alias, binding) in aliases {
            if !self.has(&alias) {
                self.bind(&alias, binding)?;
            }
        }
        Ok(())
    }

    /// Fresh field storage holding the resolved defaults of `record`.
    pub(crate) fn field_set(&self, owner: &str, record: RecordId) -> Result<FieldSet> {
        let mut set = FieldSet::new(owner);
        for field in resolved_fields(self, record) {
            set.bind(&field.name, field.default, field.flag)?;
        }
        Ok(set)
    }

    /// Mark a module as used and run its `module$use` hook once.
    ///
    /// Returns the package dependencies the hook declared; they are also
    /// recorded on the owning package.
    pub fn use_module(&mut self, module: ModuleId) -> Result<Vec<String>> {
        self.ensure_open(self.module(module).name())?;
        if self.module(module).used {
            return Ok(Vec::new());
        }
        let Some(hook) = self.module(module).capsule.use_hook() else {
            self.modules[module.index()].used = true;
            return Ok(Vec::new());
        };
        let package = self.module(module).package;
        let pkg_name = self.package(package).name().to_string();
        let name = self.module(module).name().to_string();
        let deps = {
            let _guard = self.context.enter(&pkg_name);
            let scope = HookScope::new(&self.context, &name);
            hook.on_use(&scope, &self.modules[module.index()])
                .map_err(|detail| MetaError::construction(&name, Site::Hook(MODULE_USE.into()), detail))?
        };
        self.modules[module.index()].used = true;
        for dep in &deps {
            self.packages[package.index()].add_use_dep(dep);
        }
        tracing::debug!(module = %name, ?deps, "module used");
        Ok(deps)
    }

    /// Run `module$meta$init` for every module of `package`, in
    /// registration order, and close the package to new modules.
    pub fn finalize_package(&mut self, package: PackageId) -> Result<()> {
        let pkg = self.package(package);
        self.ensure_open(pkg.name())?;
        if pkg.is_finalized() {
            return Ok(());
        }
        let pkg_name = pkg.name().to_string();
        let modules = pkg.modules().to_vec();
        for id in modules {
            let Some(hook) = self.module(id).capsule.module_initializer() else {
                continue;
            };
            let name = self.module(id).name().to_string();
            let _guard = self.context.enter(&pkg_name);
            let scope = HookScope::new(&self.context, &name);
            hook.init_module(&scope, &mut self.modules[id.index()].state)
                .map_err(|detail| MetaError::construction(&name, Site::Hook(MODULE_META_INIT.into()), detail))?;
        }
        self.packages[package.index()].finalize();
        tracing::info!(package = %pkg_name, "package finalized");
        Ok(())
    }
}
