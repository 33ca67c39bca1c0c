//! Type string parser.
//!
//! Grammar:
//!
//! ```text
//! type   := base ("[]")*
//! base   := "bool" | "num" | "num(" ctype ")" | "string" | "obj" | "fxn"
//!         | "map<" type ">" | record-name
//! ```
//!
//! Record names resolve against the enclosing module first, then its
//! interface, then through the registry's usual package and import search.

use metacfg_core::{Binding, RecordId, Registry, TypeDesc};

use crate::error::{DeclError, Result};

/// Where a type string is being resolved from.
#[derive(Debug, Clone, Copy)]
pub struct TypeScope<'a> {
    /// Requesting package.
    pub package: &'a str,
    /// Qualified name of the enclosing module, if any.
    pub module: Option<&'a str>,
    /// Qualified name of the interface the enclosing module inherits.
    pub interface: Option<&'a str>,
}

impl<'a> TypeScope<'a> {
    pub fn package(package: &'a str) -> Self {
        Self {
            package,
            module: None,
            interface: None,
        }
    }
}

/// Parse a type string into a descriptor.
pub fn parse_type(input: &str, registry: &Registry, scope: TypeScope<'_>) -> Result<TypeDesc> {
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid(input, "empty type"));
    }

    if let Some(elem) = s.strip_suffix("[]") {
        return Ok(TypeDesc::Array(Box::new(parse_type(elem, registry, scope)?)));
    }
    if let Some(rest) = s.strip_prefix("map<") {
        let elem = rest
            .strip_suffix('>')
            .ok_or_else(|| invalid(input, "unterminated map<...>"))?;
        return Ok(TypeDesc::Map(Box::new(parse_type(elem, registry, scope)?)));
    }
    if let Some(rest) = s.strip_prefix("num(") {
        let ctype = rest
            .strip_suffix(')')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| invalid(input, "expected num(<ctype>)"))?;
        return Ok(TypeDesc::CNum(format!("({ctype})")));
    }

    let ty = match s {
        "bool" => TypeDesc::Bool,
        "num" => TypeDesc::Num,
        "string" => TypeDesc::Str,
        "obj" => TypeDesc::Opaque,
        "fxn" => TypeDesc::Fxn,
        name => TypeDesc::Record(resolve_record(name, registry, scope).ok_or_else(|| {
            invalid(input, format!("no record named '{name}' visible from '{}'", scope.package))
        })?),
    };
    Ok(ty)
}

fn resolve_record(name: &str, registry: &Registry, scope: TypeScope<'_>) -> Option<RecordId> {
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '$') {
        return None;
    }
    let local = [scope.module, scope.interface]
        .into_iter()
        .flatten()
        .find_map(|m| registry.lookup(&format!("{m}.{name}")));
    let binding = match local {
        Some(binding) => binding,
        None => registry.resolve_strict(name, scope.package).ok()?,
    };
    match binding {
        Binding::Record(id) => Some(id),
        _ => None,
    }
}

fn invalid(ty: &str, detail: impl Into<String>) -> DeclError {
    DeclError::InvalidType {
        ty: ty.to_string(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metacfg_core::{Package, Version};

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.add_package(Package::new("xdc.platform", Version::new(1, 0, 1)))
            .unwrap();
        reg.add_record("xdc.platform.IPlatform.Board", None).unwrap();
        reg.add_record("xdc.platform.IPlatform.Memory", None).unwrap();
        reg
    }

    const XDC: TypeScope<'static> = TypeScope {
        package: "xdc.platform",
        module: Some("xdc.platform.IPlatform"),
        interface: None,
    };

    #[test]
    fn scalars_and_composites() {
        let reg = registry();
        assert_eq!(parse_type("bool", &reg, XDC).unwrap(), TypeDesc::Bool);
        assert_eq!(
            parse_type("num(xdc_Double)", &reg, XDC).unwrap(),
            TypeDesc::CNum("(xdc_Double)".into())
        );
        assert_eq!(
            parse_type("string[][]", &reg, XDC).unwrap(),
            TypeDesc::Array(Box::new(TypeDesc::Array(Box::new(TypeDesc::Str))))
        );
        assert_eq!(
            parse_type("map<num>", &reg, XDC).unwrap(),
            TypeDesc::Map(Box::new(TypeDesc::Num))
        );
    }

    #[test]
    fn record_names_resolve_module_first() {
        let reg = registry();
        let board = reg.resolve_record("xdc.platform.IPlatform.Board", "").unwrap();
        assert_eq!(parse_type("Board", &reg, XDC).unwrap(), TypeDesc::Record(board));
        assert_eq!(
            parse_type("IPlatform.Board", &reg, TypeScope::package("xdc.platform")).unwrap(),
            TypeDesc::Record(board)
        );
        let tiva = TypeScope {
            package: "ti.platforms.tiva",
            module: Some("ti.platforms.tiva.Platform"),
            interface: Some("xdc.platform.IPlatform"),
        };
        assert_eq!(parse_type("Board", &reg, tiva).unwrap(), TypeDesc::Record(board));
        let arr = parse_type("map<IPlatform.Memory>", &reg, XDC).unwrap();
        assert_eq!(reg.type_name(&arr), "map<xdc.platform.IPlatform.Memory>");
    }

    #[test]
    fn unknown_or_malformed_types() {
        let reg = registry();
        assert!(matches!(parse_type("Nope", &reg, XDC), Err(DeclError::InvalidType { .. })));
        assert!(parse_type("map<num", &reg, XDC).is_err());
        assert!(parse_type("num()", &reg, XDC).is_err());
        assert!(parse_type(" ", &reg, XDC).is_err());
        assert!(parse_type("xdc.platform", &reg, XDC).is_err());
    }
}
