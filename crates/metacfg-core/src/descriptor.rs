//! Type descriptors: scalars, structured records, and function signatures.
//!
//! A record descriptor is initialised once with its qualified name and an
//! optional parent record. The parent edge is the capability-inheritance
//! edge; field defaults resolve most-derived first along it (see
//! [`crate::capability`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};
use crate::hooks::NativeFn;
use crate::id::{RecordId, SignatureId};
use crate::value::Value;

/// Access flag of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldFlag {
    /// `r`: never writable by configuration code.
    #[serde(rename = "r")]
    ReadOnly,
    /// `w`: writable until sealed, readable afterwards.
    #[serde(rename = "w")]
    WriteOnce,
    /// `rh`: never writable, unreadable once sealed.
    #[serde(rename = "rh")]
    Hidden,
    /// `wh`: writable until sealed, unreadable afterwards.
    #[serde(rename = "wh")]
    WriteThenHidden,
}

impl FieldFlag {
    pub fn is_writable(self) -> bool {
        matches!(self, FieldFlag::WriteOnce | FieldFlag::WriteThenHidden)
    }

    pub fn is_hidden(self) -> bool {
        matches!(self, FieldFlag::Hidden | FieldFlag::WriteThenHidden)
    }

    pub fn code(self) -> &'static str {
        match self {
            FieldFlag::ReadOnly => "r",
            FieldFlag::WriteOnce => "w",
            FieldFlag::Hidden => "rh",
            FieldFlag::WriteThenHidden => "wh",
        }
    }
}

impl FromStr for FieldFlag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "r" => Ok(FieldFlag::ReadOnly),
            "w" => Ok(FieldFlag::WriteOnce),
            "rh" => Ok(FieldFlag::Hidden),
            "wh" => Ok(FieldFlag::WriteThenHidden),
            other => Err(format!("unknown field flag '{other}' (expected r, w, rh or wh)")),
        }
    }
}

impl fmt::Display for FieldFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The type of a field, argument, or variadic tail.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Bool,
    Num,
    /// A number with a target C type, e.g. `(xdc_Double)`.
    CNum(String),
    Str,
    /// Any value.
    Opaque,
    /// A callable meta-function reference.
    Fxn,
    Record(RecordId),
    Array(Box<TypeDesc>),
    Map(Box<TypeDesc>),
}

impl TypeDesc {
    /// Shallow conformance check of a value against this type.
    ///
    /// `Undefined` and `Null` conform to every type. Record members are not
    /// checked against the record's schema.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Undefined | Value::Null) => true,
            (TypeDesc::Opaque, _) => true,
            (TypeDesc::Bool, Value::Bool(_)) => true,
            (TypeDesc::Num | TypeDesc::CNum(_), Value::Num(_)) => true,
            (TypeDesc::Str | TypeDesc::Fxn, Value::Str(_)) => true,
            (TypeDesc::Record(_), Value::Record(_)) => true,
            (TypeDesc::Array(elem), Value::Array(items)) => items.iter().all(|v| elem.accepts(v)),
            (TypeDesc::Map(elem), Value::Record(map)) => map.values().all(|v| elem.accepts(v)),
            _ => false,
        }
    }
}

/// A declared field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeDesc,
    pub default: Value,
    pub flag: FieldFlag,
    /// Declared `required` on an interface: concrete modules must supply it.
    pub required: bool,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: TypeDesc, default: Value, flag: FieldFlag) -> Self {
        Self {
            name: name.into(),
            ty,
            default,
            flag,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A positional parameter of a function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeDesc,
    /// Default used when the argument is omitted; `None` makes it mandatory.
    pub default: Option<Value>,
}

/// A function signature: ordered parameters, optional variadic tail, return arity.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub variadic: Option<TypeDesc>,
    pub returns: u8,
}

impl Signature {
    pub fn new(name: impl Into<String>, returns: u8) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            variadic: None,
            returns,
        }
    }

    /// Append a parameter.
    pub fn arg(mut self, name: impl Into<String>, ty: TypeDesc, default: Option<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty,
            default,
        });
        self
    }

    pub fn variadic(mut self, ty: TypeDesc) -> Self {
        self.variadic = Some(ty);
        self
    }

    /// Minimum argument count: everything up to the last parameter without a default.
    pub fn required_args(&self) -> usize {
        self.params.iter().rposition(|p| p.default.is_none()).map_or(0, |i| i + 1)
    }

    /// Declared type of the argument at `position`, falling back to the variadic tail.
    pub fn arg_type(&self, position: usize) -> Option<&TypeDesc> {
        self.params.get(position).map(|p| &p.ty).or(self.variadic.as_ref())
    }

    pub fn accepts_arity(&self, n: usize) -> bool {
        n >= self.required_args() && (n <= self.params.len() || self.variadic.is_some())
    }

    /// Human-readable arity, e.g. `1..2` or `2+`.
    pub fn arity_label(&self) -> String {
        let min = self.required_args();
        match (&self.variadic, self.params.len()) {
            (Some(_), _) => format!("{min}+"),
            (None, max) if max == min => format!("{min}"),
            (None, max) => format!("{min}..{max}"),
        }
    }
}

/// A function bound on a record.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    /// `None` for generic meta-functions (extension hooks).
    pub signature: Option<SignatureId>,
    pub hook: Option<NativeFn>,
    /// On interfaces: whether implementing modules may leave the hook absent.
    pub optional: bool,
}

impl FunctionDecl {
    pub fn is_implemented(&self) -> bool {
        self.hook.is_some()
    }
}

/// A structured record descriptor.
#[derive(Debug, Clone, Default)]
pub struct RecordDesc {
    name: String,
    parent: Option<RecordId>,
    initialized: bool,
    fields: Vec<FieldDecl>,
    functions: Vec<FunctionDecl>,
}

impl RecordDesc {
    /// A forward-declared record, bound by name but not yet initialised.
    pub fn declared(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<RecordId> {
        self.parent
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Establish the qualified name and inheritance edge. Allowed once.
    pub(crate) fn init(&mut self, name: impl Into<String>, parent: Option<RecordId>) -> Result<()> {
        let name = name.into();
        if self.initialized {
            return Err(MetaError::DuplicateName { name });
        }
        self.name = name;
        self.parent = parent;
        self.initialized = true;
        Ok(())
    }

    /// Append a field; rejects a second declaration of the same name.
    pub fn add_field(&mut self, field: FieldDecl) -> Result<()> {
        if self.field(&field.name).is_some() {
            return Err(MetaError::DuplicateField {
                descriptor: self.name.clone(),
                field: field.name,
            });
        }
        self.fields.push(field);
        Ok(())
    }

    /// Bind a function. An absent hook leaves the entry unimplemented.
    pub fn add_function(&mut self, function: FunctionDecl) -> Result<()> {
        if self.function(&function.name).is_some() {
            return Err(MetaError::DuplicateField {
                descriptor: self.name.clone(),
                field: function.name,
            });
        }
        self.functions.push(function);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn functions(&self) -> &[FunctionDecl] {
        &self.functions
    }
}
