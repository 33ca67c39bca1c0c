//! The instance factory: `create`, `construct`, and bound-function calls.
//!
//! Both entry points run the same algorithm and differ only in who owns the
//! result. An instance is built in a local value and only appended (or bound
//! into its storage) once it is sealed, so a failure at any step leaves no
//! partial instance behind.

use crate::capability::{resolve_function, resolved_fields};
use crate::descriptor::FieldFlag;
use crate::error::{MetaError, Result, Site};
use crate::hooks::{HookScope, INSTANCE_META_INIT};
use crate::id::{InstanceId, ModuleId};
use crate::instance::{Category, Instance};
use crate::module::ModuleFlags;
use crate::registry::Registry;
use crate::value::Value;

/// Caller-supplied overrides, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an override.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Caller-reserved storage for an instance bound with `construct`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectSlot {
    bound: Option<Instance>,
}

impl ObjectSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.bound.as_ref()
    }

    pub fn into_instance(self) -> Option<Instance> {
        self.bound
    }
}

impl Registry {
    /// Create a registry-owned instance of `module`.
    #[tracing::instrument(level = "debug", skip(self, params))]
    pub fn create(&mut self, module: ModuleId, name: &str, params: Params) -> Result<InstanceId> {
        let index = self.module(module).instances().len();
        let instance = self.build_instance(module, name, &params, Category::Instance, index)?;
        let id = InstanceId::from_index(self.instances.len());
        tracing::debug!(instance = instance.label(), index, "instance created");
        self.instances.push(instance);
        self.modules[module.index()].instances.push(id);
        Ok(id)
    }

    /// Bind an instance of `module` into caller-owned `target` storage.
    #[tracing::instrument(level = "debug", skip(self, target, params))]
    pub fn construct(
        &mut self,
        target: &mut ObjectSlot,
        module: ModuleId,
        name: &str,
        params: Params,
    ) -> Result<()> {
        if target.is_bound() {
            return Err(MetaError::construction(
                format!("{}/{name}", self.module(module).name()),
                Site::Storage,
                "object storage is already bound",
            ));
        }
        let index = self.module(module).object_count();
        let instance = self.build_instance(module, name, &params, Category::Object, index)?;
        tracing::debug!(instance = instance.label(), index, "object constructed");
        target.bound = Some(instance);
        self.modules[module.index()].object_count += 1;
        Ok(())
    }

    fn build_instance(
        &self,
        module_id: ModuleId,
        name: &str,
        params: &Params,
        category: Category,
        index: usize,
    ) -> Result<Instance> {
        let module = self.module(module_id);
        let label = format!("{}/{name}", module.name());
        self.ensure_open(&label)?;

        let required = match category {
            Category::Instance => ModuleFlags::INSTANCES,
            Category::Object => ModuleFlags::STATIC_OBJECTS,
        };
        if module.is_abstract() {
            return Err(MetaError::construction(&label, Site::Module, "an interface cannot be instantiated"));
        }
        if !module.flags().contains(required) {
            return Err(MetaError::construction(
                &label,
                Site::Module,
                format!("module does not support {}", required.names().join(", ")),
            ));
        }
        let package = self.package(module.package());
        if !package.is_finalized() {
            return Err(MetaError::construction(
                &label,
                Site::Module,
                format!("package '{}' is not finalized", package.name()),
            ));
        }

        let mut instance = Instance::new(module_id, module.package(), module.name(), name, index, category);

        // (2) instance-record defaults, then module-level PARAMS
        for field in resolved_fields(self, module.records().instance) {
            instance.fields_mut().bind(&field.name, field.default, field.flag)?;
        }
        for slot in module.state().params.slots() {
            if instance.fields().contains(&slot.name) {
                instance.fields_mut().assign_meta(&slot.name, slot.value.clone())?;
            } else {
                instance.fields_mut().bind(&slot.name, slot.value.clone(), slot.flag)?;
            }
        }

        // (3) overrides
        let params_schema = resolved_fields(self, module.records().params);
        for (key, value) in params.iter() {
            match params_schema.iter().find(|f| f.name == key) {
                Some(decl) => {
                    if !decl.flag.is_writable() {
                        return Err(MetaError::construction(&label, Site::Field(key.into()), "parameter is read-only"));
                    }
                    if !decl.ty.accepts(value) {
                        return Err(MetaError::construction(
                            &label,
                            Site::Field(key.into()),
                            format!("expected {}, got {}", self.type_name(&decl.ty), value.kind_name()),
                        ));
                    }
                    if instance.fields().contains(key) {
                        instance.fields_mut().assign_meta(key, value.clone())?;
                    } else {
                        instance.fields_mut().bind(key, value.clone(), decl.flag)?;
                    }
                }
                None if module.flags().contains(ModuleFlags::OPEN) => {
                    instance.fields_mut().bind(key, value.clone(), FieldFlag::WriteOnce)?;
                }
                None => {
                    return Err(MetaError::UnknownParameter {
                        module: module.name().to_string(),
                        instance: name.to_string(),
                        key: key.to_string(),
                    })
                }
            }
        }

        // (4) instance$meta$init under the owning package
        if let Some(hook) = module.capsule().instance_initializer() {
            let _guard = self.context.enter(package.name());
            let scope = HookScope::new(&self.context, module.name());
            hook.init_instance(&scope, &mut instance, name)
                .map_err(|detail| MetaError::construction(&label, Site::Hook(INSTANCE_META_INIT.into()), detail))?;
        }

        // (5)
        instance.seal();
        Ok(instance)
    }

    /// Call a function bound on an instance's module.
    ///
    /// Omitted trailing arguments take their signature defaults. The hook
    /// runs with the module's package as the current context.
    pub fn call(&self, instance: &Instance, function: &str, args: &[Value]) -> Result<Value> {
        let module = self.module(instance.module());
        let decl = resolve_function(self, module.records().instance, function).ok_or_else(|| {
            MetaError::UnresolvedReference {
                name: format!("{}.{function}", module.name()),
                context: self.package(module.package()).name().to_string(),
            }
        })?;
        let hook = decl.hook.as_ref().ok_or_else(|| MetaError::Unimplemented {
            owner: module.name().to_string(),
            function: function.to_string(),
        })?;

        let mut call_args = args.to_vec();
        if let Some(sig) = decl.signature.map(|id| self.signature(id)) {
            if !sig.accepts_arity(args.len()) {
                return Err(MetaError::Arity {
                    function: function.to_string(),
                    expected: sig.arity_label(),
                    actual: args.len(),
                });
            }
            for (position, arg) in args.iter().enumerate() {
                let Some(ty) = sig.arg_type(position) else { continue };
                if !ty.accepts(arg) {
                    let param = sig
                        .params
                        .get(position)
                        .map_or_else(|| format!("#{position}"), |p| p.name.clone());
                    return Err(MetaError::ArgumentType {
                        function: function.to_string(),
                        param,
                        expected: self.type_name(ty),
                        found: arg.kind_name().to_string(),
                    });
                }
            }
            for param in sig.params.iter().skip(args.len()) {
                call_args.push(param.default.clone().unwrap_or_default());
            }
        }

        let pkg_name = self.package(module.package()).name();
        let _guard = self.context.enter(pkg_name);
        let scope = HookScope::new(&self.context, module.name());
        hook.invoke(&scope, &call_args).map_err(|detail| MetaError::CallFailed {
            function: function.to_string(),
            detail,
        })
    }
}
