//! Extension hooks and the hook loader contract.
//!
//! A module may reference an extension script (its *capsule*). The script
//! runtime lives outside this crate: a [`HookLoader`] turns a script
//! reference into a [`Capsule`], a lookup table from hook name to callable.
//! The engine looks hooks up by name and never assumes a hook is present.
//!
//! Hooks run with the owning package pushed as the current package context.
//! The push/pop is strictly nested and scoped by [`ContextGuard`], so the
//! context is restored even when a hook fails.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::instance::Instance;
use crate::module::{Module, ModuleState};
use crate::value::Value;

/// Invoked once after all fields are registered; may veto registration.
pub const MODULE_VALIDATE: &str = "module$validate";
/// Invoked once at package finalization; may rewrite module-level defaults.
pub const MODULE_META_INIT: &str = "module$meta$init";
/// Invoked for every instance before it is sealed.
pub const INSTANCE_META_INIT: &str = "instance$meta$init";
/// Invoked when a module is used; returns extra package dependencies.
pub const MODULE_USE: &str = "module$use";

/// Outcome of a hook. Errors are plain messages; the engine attaches the
/// hook name and target when converting them.
pub type HookResult<T = ()> = std::result::Result<T, String>;

/// Validates a fully registered module.
pub trait Validator {
    fn validate(&self, scope: &HookScope<'_>, module: &Module) -> HookResult;
}

impl<F> Validator for F
where
    F: Fn(&HookScope<'_>, &Module) -> HookResult,
{
    fn validate(&self, scope: &HookScope<'_>, module: &Module) -> HookResult {
        self(scope, module)
    }
}

/// Rewrites module-level defaults at package finalization.
///
/// [`FieldSet::assign_meta`](crate::value::FieldSet::assign_meta) reaches
/// `r` and `rh` fields as well.
pub trait ModuleInitializer {
    fn init_module(&self, scope: &HookScope<'_>, state: &mut ModuleState) -> HookResult;
}

impl<F> ModuleInitializer for F
where
    F: Fn(&HookScope<'_>, &mut ModuleState) -> HookResult,
{
    fn init_module(&self, scope: &HookScope<'_>, state: &mut ModuleState) -> HookResult {
        self(scope, state)
    }
}

/// Finishes a freshly populated instance before it is sealed.
///
/// [`Instance::assign_meta`] writes fields regardless of their flags.
pub trait InstanceInitializer {
    fn init_instance(&self, scope: &HookScope<'_>, instance: &mut Instance, name: &str) -> HookResult;
}

impl<F> InstanceInitializer for F
where
    F: Fn(&HookScope<'_>, &mut Instance, &str) -> HookResult,
{
    fn init_instance(&self, scope: &HookScope<'_>, instance: &mut Instance, name: &str) -> HookResult {
        self(scope, instance, name)
    }
}

/// Declares package dependencies discovered when a module is used.
pub trait UseHook {
    fn on_use(&self, scope: &HookScope<'_>, module: &Module) -> HookResult<Vec<String>>;
}

impl<F> UseHook for F
where
    F: Fn(&HookScope<'_>, &Module) -> HookResult<Vec<String>>,
{
    fn on_use(&self, scope: &HookScope<'_>, module: &Module) -> HookResult<Vec<String>> {
        self(scope, module)
    }
}

/// A native implementation of a bound function.
#[derive(Clone)]
pub struct NativeFn(Rc<dyn Fn(&HookScope<'_>, &[Value]) -> HookResult<Value>>);

impl NativeFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&HookScope<'_>, &[Value]) -> HookResult<Value> + 'static,
    {
        NativeFn(Rc::new(f))
    }

    pub fn invoke(&self, scope: &HookScope<'_>, args: &[Value]) -> HookResult<Value> {
        (self.0)(scope, args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeFn(..)")
    }
}

/// One entry of a capsule's lookup table.
#[derive(Clone)]
pub enum Hook {
    Validate(Rc<dyn Validator>),
    ModuleMetaInit(Rc<dyn ModuleInitializer>),
    InstanceMetaInit(Rc<dyn InstanceInitializer>),
    Use(Rc<dyn UseHook>),
    Native(NativeFn),
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Hook::Validate(_) => "Validate",
            Hook::ModuleMetaInit(_) => "ModuleMetaInit",
            Hook::InstanceMetaInit(_) => "InstanceMetaInit",
            Hook::Use(_) => "Use",
            Hook::Native(_) => "Native",
        };
        write!(f, "Hook::{kind}")
    }
}

/// The loaded form of an extension script: hook name → callable.
#[derive(Debug, Clone, Default)]
pub struct Capsule {
    script: Option<String>,
    table: HashMap<String, Hook>,
}

impl Capsule {
    /// A capsule with no hooks, for modules without an extension script.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_script(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            table: HashMap::new(),
        }
    }

    /// The script reference this capsule was loaded from.
    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn insert(&mut self, name: impl Into<String>, hook: Hook) {
        self.table.insert(name.into(), hook);
    }

    pub fn with_validate<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookScope<'_>, &Module) -> HookResult + 'static,
    {
        self.insert(MODULE_VALIDATE, Hook::Validate(Rc::new(f)));
        self
    }

    pub fn with_module_meta_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookScope<'_>, &mut ModuleState) -> HookResult + 'static,
    {
        self.insert(MODULE_META_INIT, Hook::ModuleMetaInit(Rc::new(f)));
        self
    }

    pub fn with_instance_meta_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookScope<'_>, &mut Instance, &str) -> HookResult + 'static,
    {
        self.insert(INSTANCE_META_INIT, Hook::InstanceMetaInit(Rc::new(f)));
        self
    }

    pub fn with_use<F>(mut self, f: F) -> Self
    where
        F: Fn(&HookScope<'_>, &Module) -> HookResult<Vec<String>> + 'static,
    {
        self.insert(MODULE_USE, Hook::Use(Rc::new(f)));
        self
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&HookScope<'_>, &[Value]) -> HookResult<Value> + 'static,
    {
        self.insert(name, Hook::Native(NativeFn::new(f)));
        self
    }

    /// Presence check by name.
    pub fn lookup(&self, name: &str) -> Option<&Hook> {
        self.table.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn validator(&self) -> Option<Rc<dyn Validator>> {
        match self.lookup(MODULE_VALIDATE) {
            Some(Hook::Validate(h)) => Some(Rc::clone(h)),
            _ => None,
        }
    }

    pub fn module_initializer(&self) -> Option<Rc<dyn ModuleInitializer>> {
        match self.lookup(MODULE_META_INIT) {
            Some(Hook::ModuleMetaInit(h)) => Some(Rc::clone(h)),
            _ => None,
        }
    }

    pub fn instance_initializer(&self) -> Option<Rc<dyn InstanceInitializer>> {
        match self.lookup(INSTANCE_META_INIT) {
            Some(Hook::InstanceMetaInit(h)) => Some(Rc::clone(h)),
            _ => None,
        }
    }

    pub fn use_hook(&self) -> Option<Rc<dyn UseHook>> {
        match self.lookup(MODULE_USE) {
            Some(Hook::Use(h)) => Some(Rc::clone(h)),
            _ => None,
        }
    }

    /// A native function hook, if one is registered under `name`.
    pub fn function(&self, name: &str) -> Option<NativeFn> {
        match self.lookup(name) {
            Some(Hook::Native(f)) => Some(f.clone()),
            _ => None,
        }
    }

    /// Names of the four lifecycle hooks present in this capsule.
    pub fn lifecycle_hooks(&self) -> Vec<&'static str> {
        [MODULE_USE, MODULE_META_INIT, INSTANCE_META_INIT, MODULE_VALIDATE]
            .into_iter()
            .filter(|name| self.has(name))
            .collect()
    }
}

/// Loads the capsule behind an extension-script reference.
pub trait HookLoader {
    /// Load the capsule for `module` from `script`.
    fn load(&self, module: &str, script: &str) -> HookResult<Capsule>;
}

/// An in-memory loader keyed by script reference.
#[derive(Debug, Default)]
pub struct StaticLoader {
    capsules: HashMap<String, Capsule>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, script: impl Into<String>, capsule: Capsule) -> Self {
        self.capsules.insert(script.into(), capsule);
        self
    }
}

impl HookLoader for StaticLoader {
    fn load(&self, module: &str, script: &str) -> HookResult<Capsule> {
        self.capsules
            .get(script)
            .cloned()
            .ok_or_else(|| format!("extension script '{script}' for '{module}' not found"))
    }
}

/// The stack of current-package names used to scope hook invocations.
#[derive(Debug, Default)]
pub struct PackageContext {
    stack: RefCell<Vec<String>>,
}

impl PackageContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `package` as current until the returned guard is dropped.
    pub fn enter(&self, package: &str) -> ContextGuard<'_> {
        self.stack.borrow_mut().push(package.to_string());
        ContextGuard {
            context: self,
            package: package.to_string(),
        }
    }

    pub fn current(&self) -> Option<String> {
        self.stack.borrow().last().cloned()
    }

    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

/// Pops the package pushed by [`PackageContext::enter`] on drop.
#[must_use = "the package context is popped when the guard is dropped"]
pub struct ContextGuard<'a> {
    context: &'a PackageContext,
    package: String,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.context.stack.borrow_mut().pop();
        debug_assert_eq!(popped.as_deref(), Some(self.package.as_str()));
    }
}

/// What a hook can see of its invocation context.
pub struct HookScope<'a> {
    context: &'a PackageContext,
    module: &'a str,
}

impl<'a> HookScope<'a> {
    pub fn new(context: &'a PackageContext, module: &'a str) -> Self {
        Self { context, module }
    }

    /// The package pushed for this invocation.
    pub fn current_package(&self) -> Option<String> {
        self.context.current()
    }

    /// Qualified name of the module the hook belongs to.
    pub fn module(&self) -> &str {
        self.module
    }
}
