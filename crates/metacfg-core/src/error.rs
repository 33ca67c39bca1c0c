//! Error types for the configuration object model.
//!
//! Every error is fatal to the configuration pass that raised it. Each
//! variant carries the qualified name of the offending descriptor and, where
//! one exists, the field or function identifier.

use std::fmt;

/// Where inside a construction the failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    /// A field of the instance being built.
    Field(String),
    /// A named extension hook (e.g. `instance$meta$init`).
    Hook(String),
    /// The target object storage passed to `construct`.
    Storage,
    /// The module itself (flags, abstractness).
    Module,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Field(name) => write!(f, "field '{name}'"),
            Site::Hook(name) => write!(f, "hook '{name}'"),
            Site::Storage => write!(f, "object storage"),
            Site::Module => write!(f, "module"),
        }
    }
}

/// Errors raised by registry, descriptor, factory and resolver operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetaError {
    /// A name was bound twice.
    #[error("duplicate name: '{name}' is already bound")]
    DuplicateName { name: String },

    /// A name could not be found, absolutely or relative to the requesting package.
    #[error("unresolved reference '{name}' (from package '{context}')")]
    UnresolvedReference { name: String, context: String },

    /// A name resolved, but to a different kind of entity.
    #[error("'{name}' is a {found}, expected a {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A descriptor declares the same field twice.
    #[error("duplicate field '{field}' in '{descriptor}'")]
    DuplicateField { descriptor: String, field: String },

    /// A module does not satisfy a member of an interface in its capability chain.
    #[error("module '{module}' does not satisfy {member} required by '{interface}'")]
    CapabilityViolation {
        module: String,
        interface: String,
        member: String,
    },

    /// A params key names no field and the module is closed to extension.
    #[error("unknown parameter '{key}' for instance '{instance}' of '{module}'")]
    UnknownParameter {
        module: String,
        instance: String,
        key: String,
    },

    /// Instance or module construction failed.
    #[error("construction of '{target}' failed at {site}: {detail}")]
    Construction {
        target: String,
        site: Site,
        detail: String,
    },

    /// An imported package is older than the declared minimum.
    #[error("package '{package}' requires '{import}' >= {required}, found {actual}")]
    VersionMismatch {
        package: String,
        import: String,
        required: semver::Version,
        actual: semver::Version,
    },

    /// A write to a read-only or sealed field.
    #[error("field '{field}' of '{owner}' is read-only")]
    ReadOnly { owner: String, field: String },

    /// An external read of a hidden field.
    #[error("field '{field}' of '{owner}' is hidden")]
    Hidden { owner: String, field: String },

    /// A binding attempted after the registry was frozen.
    #[error("registry is frozen; cannot bind '{name}'")]
    Frozen { name: String },

    /// A bound function has no native hook.
    #[error("function '{function}' of '{owner}' is not implemented")]
    Unimplemented { owner: String, function: String },

    /// A bound function was called with the wrong number of arguments.
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    Arity {
        function: String,
        expected: String,
        actual: usize,
    },

    /// A bound function was called with an argument of the wrong type.
    #[error("argument '{param}' of '{function}' expected {expected}, got {found}")]
    ArgumentType {
        function: String,
        param: String,
        expected: String,
        found: String,
    },

    /// A native function hook reported an error.
    #[error("call to '{function}' failed: {detail}")]
    CallFailed { function: String, detail: String },
}

impl MetaError {
    pub(crate) fn construction(target: impl Into<String>, site: Site, detail: impl Into<String>) -> Self {
        MetaError::Construction {
            target: target.into(),
            site,
            detail: detail.into(),
        }
    }
}

/// Result type alias for object model operations.
pub type Result<T> = std::result::Result<T, MetaError>;
