//! Lowering of parsed declarations into object model calls.

use metacfg_core::{
    ConfigPass, FieldDecl, FunctionSpec, Import, ModuleFlags, ModuleSpec, Package, PackageId,
    Registry, Signature, TypeDesc, Value, Version,
};

use crate::error::{DeclError, Result};
use crate::package_decl::{FieldEntry, FunctionEntry, ModuleDecl, PackageDecl, RecordDecl};
use crate::types::{parse_type, TypeScope};

/// Largest integer magnitude a `num` holds exactly.
const MAX_EXACT_INT: u64 = 1 << 53;

/// Convert a TOML value into an object model value.
///
/// Integers become numbers and must fit in 2^53; datetimes become their
/// RFC 3339 string.
pub fn toml_to_value(value: &toml::Value) -> Result<Value> {
    Ok(match value {
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Integer(i) => {
            if i.unsigned_abs() > MAX_EXACT_INT {
                return Err(DeclError::invalid(format!("integer {i} exceeds the 2^53 range of num")));
            }
            Value::Num(*i as f64)
        }
        toml::Value::Float(f) => Value::Num(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_value).collect::<Result<_>>()?),
        toml::Value::Table(table) => Value::Record(
            table
                .iter()
                .map(|(k, v)| Ok::<_, DeclError>((k.clone(), toml_to_value(v)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

/// The package descriptor a declaration describes, without its modules.
pub fn lower_package(decl: &PackageDecl) -> Result<Package> {
    let header = &decl.package;
    let mut package = Package::new(&header.name, Version::parse(&header.version)?);
    if let Some(date) = &header.build_date {
        package = package.with_build_date(date);
    }
    for import in &decl.imports {
        let min = import.min_version.as_deref().map(Version::parse).transpose()?;
        package = package.with_import(Import::new(&import.name, min));
    }
    Ok(package)
}

/// Register a declared package and its modules, then finalize it.
///
/// Imports must already be registered. Capsule references are rewritten
/// relative to the package tree root (`ti/platforms/tiva/Platform.xs`).
#[tracing::instrument(level = "debug", skip_all, fields(package = %decl.package.name))]
pub fn register_package(pass: &mut ConfigPass, decl: &PackageDecl) -> Result<PackageId> {
    let name = decl.package.name.as_str();
    let pid = pass.add_package(lower_package(decl)?)?;
    declare_records(pass, name, TypeScope::package(name), &decl.records)?;

    for module in &decl.modules {
        let qualified = format!("{name}.{}", module.name);
        let interface = match &module.inherits {
            Some(iface) => Some(pass.registry().resolve_module(iface, name)?),
            None => None,
        };
        let interface_name = interface.map(|id| pass.registry().module(id).name().to_string());
        let scope = TypeScope {
            package: name,
            module: Some(&qualified),
            interface: interface_name.as_deref(),
        };
        declare_records(pass, &qualified, scope, &module.records)?;
        let spec = module_spec(pass.registry(), scope, module)?;
        pass.register_module(pid, spec)?;
    }

    pass.finish_package(pid)?;
    Ok(pid)
}

/// Bind typedef records under `prefix`.
///
/// All records are declared before any is initialised, so fields and
/// `extends` may refer to records later in the same list.
fn declare_records(
    pass: &mut ConfigPass,
    prefix: &str,
    scope: TypeScope<'_>,
    records: &[RecordDecl],
) -> Result<()> {
    let mut declared = Vec::with_capacity(records.len());
    for record in records {
        let qualified = format!("{prefix}.{}", record.name);
        declared.push((pass.registry_mut().declare_record(&qualified)?, qualified, record));
    }
    for (id, qualified, record) in declared {
        let parent = match &record.extends {
            Some(base) => match parse_type(base, pass.registry(), scope)? {
                TypeDesc::Record(parent) => Some(parent),
                _ => {
                    return Err(DeclError::invalid(format!(
                        "record '{qualified}' can only extend another record, not '{base}'"
                    )))
                }
            },
            None => None,
        };
        pass.registry_mut().init_record(id, &qualified, parent)?;
        for entry in &record.fields {
            let field = field_decl(pass.registry(), scope, entry)?;
            pass.registry_mut().record_mut(id)?.add_field(field)?;
        }
        tracing::debug!(record = %qualified, "typedef declared");
    }
    Ok(())
}

/// Build the registration spec for a declared module.
pub fn module_spec(registry: &Registry, scope: TypeScope<'_>, decl: &ModuleDecl) -> Result<ModuleSpec> {
    let mut spec = ModuleSpec::new(&decl.name).flags(module_flags(decl)?);
    if let Some(iface) = &decl.inherits {
        spec = spec.inherits(iface);
    }
    if let Some(capsule) = &decl.capsule {
        spec = spec.capsule(format!("{}/{capsule}", scope.package.replace('.', "/")));
    }
    for entry in &decl.config {
        spec = spec.config_field(field_decl(registry, scope, entry)?);
    }
    for entry in &decl.instance {
        let field = field_decl(registry, scope, entry)?;
        spec = if entry.param {
            spec.instance_param(field)
        } else {
            spec.instance_field(field)
        };
    }
    for entry in &decl.functions {
        spec = spec.function(function_spec(registry, scope, entry)?);
    }
    Ok(spec)
}

fn module_flags(decl: &ModuleDecl) -> Result<ModuleFlags> {
    let Some(names) = &decl.flags else {
        return Ok(ModuleFlags::INSTANCES);
    };
    names.iter().try_fold(ModuleFlags::empty(), |acc, name| {
        ModuleFlags::from_kebab(name)
            .map(|flag| acc | flag)
            .ok_or_else(|| DeclError::invalid(format!("unknown flag '{name}' on module '{}'", decl.name)))
    })
}

fn field_decl(registry: &Registry, scope: TypeScope<'_>, entry: &FieldEntry) -> Result<FieldDecl> {
    let ty = parse_type(&entry.ty, registry, scope)?;
    let default = entry.default.as_ref().map(toml_to_value).transpose()?.unwrap_or_default();
    if !ty.accepts(&default) {
        return Err(DeclError::invalid(format!(
            "default of field '{}' is a {}, expected {}",
            entry.name,
            default.kind_name(),
            registry.type_name(&ty)
        )));
    }
    let field = FieldDecl::new(&entry.name, ty, default, entry.flag);
    Ok(if entry.required { field.required() } else { field })
}

fn function_spec(registry: &Registry, scope: TypeScope<'_>, entry: &FunctionEntry) -> Result<FunctionSpec> {
    let signature = if entry.meta {
        None
    } else {
        let mut sig = Signature::new(&entry.name, entry.returns);
        for arg in &entry.args {
            let ty = parse_type(&arg.ty, registry, scope)?;
            sig = sig.arg(&arg.name, ty, arg.default.as_ref().map(toml_to_value).transpose()?);
        }
        if let Some(variadic) = &entry.variadic {
            sig = sig.variadic(parse_type(variadic, registry, scope)?);
        }
        Some(sig)
    };
    Ok(FunctionSpec {
        name: entry.name.clone(),
        signature,
        optional: entry.optional,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacfg_core::{Capsule, FieldFlag, MetaError, StaticLoader};

    const XDC_PLATFORM: &str = r#"
[package]
name = "xdc.platform"
version = "1.0.1"

[[module]]
name = "IPlatform"
flags = ["abstract"]

[[module.record]]
name = "Board"

[[module.record.field]]
name = "boardName"
type = "string"

[[module.config]]
name = "BOARD"
type = "Board"
flag = "wh"
required = true

[[module.instance]]
name = "clockRate"
type = "num"
default = 1
flag = "wh"

[[module.function]]
name = "getExeContext"
args = [{ name = "prog", type = "obj" }]
"#;

    const TIVA: &str = r#"
[package]
name = "ti.platforms.tiva"
version = "1.0.0"

[[import]]
name = "xdc.platform"
min-version = "1.0.1"

[[module]]
name = "Platform"
inherits = "IPlatform"
capsule = "Platform.xs"
flags = ["instances", "static-objects"]

[[module.config]]
name = "BOARD"
type = "Board"
default = { boardName = "EK-TM4C1294XL" }
flag = "wh"
"#;

    fn loader() -> StaticLoader {
        StaticLoader::new().with(
            "ti/platforms/tiva/Platform.xs",
            Capsule::for_script("ti/platforms/tiva/Platform.xs")
                .with_function("getExeContext", |_, _| Ok(Value::Null)),
        )
    }

    #[test]
    fn oversized_integers_rejected() {
        let exact: toml::Value = toml::from_str("n = 9007199254740992").unwrap();
        assert_eq!(
            toml_to_value(&exact).unwrap().member("n"),
            Some(&Value::Num(9_007_199_254_740_992.0))
        );
        let nested: toml::Value = toml::from_str("n = [1, 9007199254740993]").unwrap();
        let err = toml_to_value(&nested).unwrap_err();
        assert!(err.to_string().contains("9007199254740993"));
        let negative: toml::Value = toml::from_str("n = -9007199254740993").unwrap();
        assert!(toml_to_value(&negative).is_err());
    }

    #[test]
    fn toml_values_convert() {
        let table: toml::Value = toml::from_str("a = 1\nb = [true, 2.5]\n[c]\nd = \"x\"\n").unwrap();
        let value = toml_to_value(&table).unwrap();
        assert_eq!(value.member("a"), Some(&Value::Num(1.0)));
        assert_eq!(
            value.member("b"),
            Some(&Value::Array(vec![Value::Bool(true), Value::Num(2.5)]))
        );
        assert_eq!(value.member("c").and_then(|c| c.member("d")), Some(&Value::from("x")));
    }

    #[test]
    fn lowers_interface_and_implementation() {
        let mut pass = ConfigPass::new(loader());
        register_package(&mut pass, &PackageDecl::parse(XDC_PLATFORM).unwrap()).unwrap();
        let tiva = register_package(&mut pass, &PackageDecl::parse(TIVA).unwrap()).unwrap();

        let reg = pass.registry();
        assert!(reg.package(tiva).is_finalized());
        let id = reg.module_named("ti.platforms.tiva.Platform").unwrap();
        let module = reg.module(id);
        assert_eq!(module.flags(), ModuleFlags::INSTANCES | ModuleFlags::STATIC_OBJECTS);
        assert_eq!(module.capsule().script(), Some("ti/platforms/tiva/Platform.xs"));
        assert_eq!(module.state().params.raw("clockRate"), Some(&Value::Num(1.0)));
        assert_eq!(module.state().config.flag("BOARD"), Some(FieldFlag::WriteThenHidden));

        let board = reg.resolve_record("xdc.platform.IPlatform.Board", "").unwrap();
        assert!(reg.has("ti.platforms.tiva.Platform.Board"));
        assert_eq!(reg.record(board).field("boardName").unwrap().ty, TypeDesc::Str);
    }

    #[test]
    fn missing_implementation_field_surfaces_violation() {
        let mut pass = ConfigPass::new(loader());
        register_package(&mut pass, &PackageDecl::parse(XDC_PLATFORM).unwrap()).unwrap();
        let without_board = TIVA.split("[[module.config]]").next().unwrap();
        let err = register_package(&mut pass, &PackageDecl::parse(without_board).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            DeclError::Meta(MetaError::CapabilityViolation { ref member, .. }) if member == "field 'BOARD'"
        ));
    }

    #[test]
    fn bad_default_and_flag_rejected() {
        let mut pass = ConfigPass::new(StaticLoader::new());
        let bad_default = r#"
[package]
name = "a"
version = "1.0.0"

[[module]]
name = "M"

[[module.config]]
name = "count"
type = "num"
default = "three"
"#;
        let err = register_package(&mut pass, &PackageDecl::parse(bad_default).unwrap()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid declaration: default of field 'count' is a string, expected num"
        );

        let decl = ModuleDecl {
            name: "N".into(),
            inherits: None,
            capsule: None,
            flags: Some(vec!["sometimes".into()]),
            records: vec![],
            config: vec![],
            instance: vec![],
            functions: vec![],
        };
        assert!(module_spec(pass.registry(), TypeScope::package("a"), &decl).is_err());
    }
}
