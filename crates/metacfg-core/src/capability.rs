//! Capability inheritance: record chains and interface conformance.
//!
//! The chain is data, not a type hierarchy. A record's chain is the record
//! followed by its parents; defaults and functions resolve most-derived
//! first. A module's capability chain lists the interfaces it satisfies,
//! nearest first and outermost last.

use std::collections::HashSet;

use crate::descriptor::{FieldDecl, FunctionDecl};
use crate::error::{MetaError, Result};
use crate::id::{ModuleId, RecordId};
use crate::registry::Registry;

/// `record`, then its parent, grandparent, and so on.
pub fn record_chain(registry: &Registry, record: RecordId) -> Vec<RecordId> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = Some(record);
    while let Some(id) = cursor {
        if !seen.insert(id) {
            break;
        }
        chain.push(id);
        cursor = registry.record(id).parent();
    }
    chain
}

/// The flattened schema of `record`.
///
/// Fields appear in order of first declaration, outermost ancestor first;
/// each carries the most-derived declaration of its name.
pub fn resolved_fields(registry: &Registry, record: RecordId) -> Vec<FieldDecl> {
    let mut fields: Vec<FieldDecl> = Vec::new();
    for id in record_chain(registry, record).into_iter().rev() {
        for field in registry.record(id).fields() {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => *existing = field.clone(),
                None => fields.push(field.clone()),
            }
        }
    }
    fields
}

/// The most-derived declaration of field `name`.
pub fn resolve_field<'r>(registry: &'r Registry, record: RecordId, name: &str) -> Option<&'r FieldDecl> {
    record_chain(registry, record)
        .into_iter()
        .find_map(|id| registry.record(id).field(name))
}

/// The most-derived binding of function `name`.
pub fn resolve_function<'r>(
    registry: &'r Registry,
    record: RecordId,
    name: &str,
) -> Option<&'r FunctionDecl> {
    record_chain(registry, record)
        .into_iter()
        .find_map(|id| registry.record(id).function(name))
}

/// Starting at `interface`, follow each interface's own chain outward.
pub fn interface_chain(registry: &Registry, interface: ModuleId) -> Vec<ModuleId> {
    let mut chain = vec![interface];
    chain.extend(registry.module(interface).capability_chain().iter().copied());
    chain
}

/// Whether `name` is declared in `chain` before (more derived than) `level`.
fn declared_below(registry: &Registry, chain: &[RecordId], level: RecordId, name: &str) -> bool {
    chain
        .iter()
        .take_while(|id| **id != level)
        .any(|id| registry.record(*id).field(name).is_some())
}

fn bound_below<'r>(
    registry: &'r Registry,
    chain: &[RecordId],
    level: RecordId,
    name: &str,
) -> Option<&'r FunctionDecl> {
    chain
        .iter()
        .take_while(|id| **id != level)
        .find_map(|id| registry.record(*id).function(name))
}

/// Verify that a module's records satisfy every interface in `chain`.
///
/// Walks outer-to-inner. A required field is satisfied when a record more
/// derived than the interface declares it, or when the interface itself
/// supplies a default. A function is satisfied when the module binds it
/// with a hook; interfaces may mark functions optional.
pub fn check_capabilities(
    registry: &Registry,
    module: &str,
    module_record: RecordId,
    instance_record: RecordId,
    chain: &[ModuleId],
) -> Result<()> {
    let module_chain = record_chain(registry, module_record);
    let instance_chain = record_chain(registry, instance_record);

    for &iface_id in chain.iter().rev() {
        let iface = registry.module(iface_id);
        let levels = [
            (iface.records().module, &module_chain),
            (iface.records().instance, &instance_chain),
        ];
        for (level, own_chain) in levels {
            let declared = registry.record(level);
            for field in declared.fields().iter().filter(|f| f.required) {
                let supplied = declared_below(registry, own_chain, level, &field.name)
                    || !field.default.is_undefined();
                if !supplied {
                    return Err(violation(module, iface.name(), format!("field '{}'", field.name)));
                }
            }
            for function in declared.functions() {
                let bound = bound_below(registry, own_chain, level, &function.name);
                let implemented = bound.is_some_and(FunctionDecl::is_implemented);
                if !implemented && !function.optional {
                    return Err(violation(
                        module,
                        iface.name(),
                        format!("function '{}'", function.name),
                    ));
                }
            }
        }
        tracing::debug!(module, interface = iface.name(), "capabilities satisfied");
    }
    Ok(())
}

fn violation(module: &str, interface: &str, member: String) -> MetaError {
    MetaError::CapabilityViolation {
        module: module.to_string(),
        interface: interface.to_string(),
        member,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldFlag, TypeDesc};
    use crate::value::Value;

    fn field(name: &str, default: Value) -> FieldDecl {
        FieldDecl::new(name, TypeDesc::Num, default, FieldFlag::WriteOnce)
    }

    #[test]
    fn most_derived_default_wins() {
        let mut reg = Registry::new();
        let base = reg.add_record("i.IBase.Instance", None).unwrap();
        let mid = reg.add_record("i.IMid.Instance", Some(base)).unwrap();
        let leaf = reg.add_record("p.Leaf.Instance", Some(mid)).unwrap();
        reg.record_mut(base).unwrap().add_field(field("clockRate", Value::Num(1.0))).unwrap();
        reg.record_mut(base).unwrap().add_field(field("cores", Value::Num(1.0))).unwrap();
        reg.record_mut(mid).unwrap().add_field(field("clockRate", Value::Num(2.0))).unwrap();
        reg.record_mut(leaf).unwrap().add_field(field("clockRate", Value::Num(3.0))).unwrap();
        reg.record_mut(leaf).unwrap().add_field(field("extra", Value::Null)).unwrap();

        assert_eq!(record_chain(&reg, leaf), vec![leaf, mid, base]);
        let fields = resolved_fields(&reg, leaf);
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["clockRate", "cores", "extra"]);
        assert_eq!(fields[0].default, Value::Num(3.0));
        assert_eq!(resolve_field(&reg, mid, "clockRate").unwrap().default, Value::Num(2.0));
        assert!(resolve_field(&reg, base, "extra").is_none());
    }
}
