//! Configuration values and flagged field storage.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::descriptor::FieldFlag;
use crate::error::{MetaError, Result};

/// A configuration value.
///
/// `Undefined` marks a field that has been declared without a default and
/// never assigned; it is distinct from an explicit `Null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Array(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Build a record value from `(key, value)` pairs.
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up a member of a record value.
    pub fn member(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(map) => map.get(key),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Num(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Record(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Num(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// One named, flagged value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub name: String,
    pub value: Value,
    pub flag: FieldFlag,
}

/// Ordered, flagged field storage shared by instances and module-level state.
///
/// External writes go through [`FieldSet::set`], which enforces field flags
/// and the seal bit. Meta-domain writes go through [`FieldSet::assign_meta`],
/// which enforces only the seal bit.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet {
    owner: String,
    slots: Vec<Slot>,
    sealed: bool,
}

impl FieldSet {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            slots: Vec::new(),
            sealed: false,
        }
    }

    /// Qualified name of the entity owning these fields.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Flag of a declared field.
    pub fn flag(&self, name: &str) -> Option<FieldFlag> {
        self.position(name).map(|i| self.slots[i].flag)
    }

    /// Read a field as external configuration code sees it.
    ///
    /// Hidden fields stop being readable once the set is sealed.
    pub fn get(&self, name: &str) -> Result<&Value> {
        let slot = self.slot(name)?;
        if self.sealed && slot.flag.is_hidden() {
            return Err(MetaError::Hidden {
                owner: self.owner.clone(),
                field: name.to_string(),
            });
        }
        Ok(&slot.value)
    }

    /// Read a field regardless of visibility (downstream code generation).
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.slots[i].value)
    }

    /// Write a field as external configuration code.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let owner = self.owner.clone();
        let sealed = self.sealed;
        let slot = self.slot_mut(name)?;
        if sealed || !slot.flag.is_writable() {
            return Err(MetaError::ReadOnly {
                owner,
                field: name.to_string(),
            });
        }
        slot.value = value;
        Ok(())
    }

    /// Insert or overwrite a slot, bypassing field flags.
    pub(crate) fn bind(&mut self, name: &str, value: Value, flag: FieldFlag) -> Result<()> {
        if self.sealed {
            return Err(MetaError::ReadOnly {
                owner: self.owner.clone(),
                field: name.to_string(),
            });
        }
        match self.position(name) {
            Some(i) => {
                self.slots[i].value = value;
                self.slots[i].flag = flag;
            }
            None => self.slots.push(Slot {
                name: name.to_string(),
                value,
                flag,
            }),
        }
        Ok(())
    }

    /// Write a field from the owning module's meta-domain.
    ///
    /// Used by the factory and by extension hooks. Field flags restrict
    /// external configuration code only, so `r` and `rh` fields accept the
    /// write; the seal bit and the declared schema still apply.
    pub fn assign_meta(&mut self, name: &str, value: Value) -> Result<()> {
        let flag = self.slot(name)?.flag;
        self.bind(name, value, flag)
    }

    /// Set the seal bit. Sealing twice is harmless.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// All slots in declaration order, hidden ones included.
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slots visible to external readers.
    pub fn visible(&self) -> impl Iterator<Item = &Slot> {
        let sealed = self.sealed;
        self.slots
            .iter()
            .filter(move |s| !(sealed && s.flag.is_hidden()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    fn slot(&self, name: &str) -> Result<&Slot> {
        self.position(name)
            .map(|i| &self.slots[i])
            .ok_or_else(|| self.unknown(name))
    }

    fn slot_mut(&mut self, name: &str) -> Result<&mut Slot> {
        match self.position(name) {
            Some(i) => Ok(&mut self.slots[i]),
            None => Err(self.unknown(name)),
        }
    }

    fn unknown(&self, name: &str) -> MetaError {
        MetaError::UnresolvedReference {
            name: format!("{}.{}", self.owner, name),
            context: self.owner.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FieldSet {
        let mut set = FieldSet::new("pkg.Mod");
        set.bind("deviceName", Value::Undefined, FieldFlag::WriteThenHidden).unwrap();
        set.bind("clockRate", Value::Num(1.0), FieldFlag::WriteOnce).unwrap();
        set.bind("$hostonly", Value::Num(1.0), FieldFlag::ReadOnly).unwrap();
        set
    }

    #[test]
    fn writable_fields_accept_writes_before_seal() {
        let mut set = sample();
        set.set("clockRate", Value::Num(2.5)).unwrap();
        assert_eq!(set.get("clockRate").unwrap(), &Value::Num(2.5));
    }

    #[test]
    fn read_only_field_rejects_write() {
        let mut set = sample();
        let err = set.set("$hostonly", Value::Num(0.0)).unwrap_err();
        assert!(matches!(err, MetaError::ReadOnly { .. }));
    }

    #[test]
    fn every_write_after_seal_fails() {
        let mut set = sample();
        set.seal();
        set.seal();
        for name in ["deviceName", "clockRate", "$hostonly"] {
            let err = set.set(name, Value::Null).unwrap_err();
            assert!(matches!(err, MetaError::ReadOnly { .. }), "{name}");
        }
    }

    #[test]
    fn hidden_fields_disappear_after_seal() {
        let mut set = sample();
        assert!(set.get("deviceName").is_ok());
        set.seal();
        assert!(matches!(
            set.get("deviceName"),
            Err(MetaError::Hidden { .. })
        ));
        assert_eq!(set.raw("deviceName"), Some(&Value::Undefined));
        let visible: Vec<_> = set.visible().map(|s| s.name.as_str()).collect();
        assert_eq!(visible, vec!["clockRate", "$hostonly"]);
    }

    #[test]
    fn meta_writes_ignore_flags_until_sealed() {
        let mut set = sample();
        set.bind("nameFormat", Value::from("%s"), FieldFlag::Hidden).unwrap();
        set.assign_meta("nameFormat", Value::from("ti_%s")).unwrap();
        set.assign_meta("$hostonly", Value::Num(0.0)).unwrap();
        assert_eq!(set.raw("nameFormat"), Some(&Value::from("ti_%s")));
        assert_eq!(set.flag("nameFormat"), Some(FieldFlag::Hidden));
        assert!(matches!(
            set.assign_meta("undeclared", Value::Null),
            Err(MetaError::UnresolvedReference { .. })
        ));

        set.seal();
        assert!(matches!(
            set.assign_meta("nameFormat", Value::Null),
            Err(MetaError::ReadOnly { .. })
        ));
    }

    #[test]
    fn unknown_field_is_unresolved() {
        let set = sample();
        assert!(matches!(
            set.get("nope"),
            Err(MetaError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn display_record() {
        let v = Value::record([("id", Value::from("0")), ("rev", Value::Null)]);
        assert_eq!(v.to_string(), "{id: \"0\", rev: null}");
        assert_eq!(v.member("id"), Some(&Value::from("0")));
    }
}
