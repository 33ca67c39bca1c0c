//! Instances produced by the factory.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::id::{ModuleId, PackageId};
use crate::value::{FieldSet, Slot, Value};

/// How an instance came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    /// Allocated by `create` and owned by the registry.
    Instance,
    /// Bound in place by `construct` into caller-owned storage.
    Object,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Instance => f.write_str("Instance"),
            Category::Object => f.write_str("Object"),
        }
    }
}

/// A configuration object bound to exactly one module.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    module: ModuleId,
    package: PackageId,
    module_name: String,
    name: String,
    index: usize,
    category: Category,
    fields: FieldSet,
}

impl Instance {
    pub(crate) fn new(
        module: ModuleId,
        package: PackageId,
        module_name: &str,
        name: &str,
        index: usize,
        category: Category,
    ) -> Self {
        Self {
            module,
            package,
            module_name: module_name.to_string(),
            name: name.to_string(),
            index,
            category,
            fields: FieldSet::new(format!("{module_name}/{name}")),
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn package(&self) -> PackageId {
        self.package
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// The name passed to `create`/`construct`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordinal among sibling instances (or objects) of the same module.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// `<module>/<name>`, used in diagnostics.
    pub fn label(&self) -> &str {
        self.fields.owner()
    }

    pub fn is_sealed(&self) -> bool {
        self.fields.is_sealed()
    }

    pub fn get(&self, field: &str) -> Result<&Value> {
        self.fields.get(field)
    }

    pub fn raw(&self, field: &str) -> Option<&Value> {
        self.fields.raw(field)
    }

    /// Write a field. Fails once the instance is sealed.
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        self.fields.set(field, value)
    }

    /// Write a field from the module's meta-domain (`instance$meta$init`).
    ///
    /// Ignores field flags; fails once the instance is sealed.
    pub fn assign_meta(&mut self, field: &str, value: Value) -> Result<()> {
        self.fields.assign_meta(field, value)
    }

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    pub(crate) fn seal(&mut self) {
        self.fields.seal();
    }

    /// SHA-256 over the canonical JSON of the field slots.
    ///
    /// Covers names, values and flags but not the instance name, ordinal or
    /// category, so `create` and `construct` with the same inputs agree.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self.fields.slots()).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// A serializable snapshot of the externally visible fields.
    pub fn summary(&self) -> InstanceSummary<'_> {
        InstanceSummary {
            module: &self.module_name,
            name: &self.name,
            index: self.index,
            category: self.category,
            fields: self.fields.visible().collect(),
            fingerprint: self.fingerprint(),
        }
    }
}

/// JSON-friendly view of an instance.
#[derive(Debug, Serialize)]
pub struct InstanceSummary<'a> {
    pub module: &'a str,
    pub name: &'a str,
    pub index: usize,
    pub category: Category,
    pub fields: Vec<&'a Slot>,
    pub fingerprint: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::FieldFlag;

    fn sample(name: &str, category: Category) -> Instance {
        let mut inst = Instance::new(
            ModuleId::from_index(0),
            PackageId::from_index(0),
            "ti.platforms.tiva.Platform",
            name,
            0,
            category,
        );
        inst.fields_mut()
            .bind("clockRate", Value::Num(1.0), FieldFlag::WriteThenHidden)
            .unwrap();
        inst
    }

    #[test]
    fn fingerprint_ignores_identity() {
        let a = sample("p0", Category::Instance);
        let b = sample("o0", Category::Object);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn fingerprint_tracks_values() {
        let a = sample("p0", Category::Instance);
        let mut b = sample("p0", Category::Instance);
        b.set("clockRate", Value::Num(2.5)).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn sealed_summary_hides_hidden_fields() {
        let mut inst = sample("p0", Category::Instance);
        inst.seal();
        let summary = inst.summary();
        assert!(summary.fields.is_empty());
        assert_eq!(summary.module, "ti.platforms.tiva.Platform");
        assert_eq!(inst.label(), "ti.platforms.tiva.Platform/p0");
    }
}
