//! Configuration object model for embedded build configuration.
//!
//! Stores typed package, module and instance descriptors, turns named
//! parameters into validated, sealed configuration objects, and resolves
//! capability inheritance from abstract interfaces (for example an
//! `xdc.platform.IPlatform` interface satisfied by a concrete
//! `ti.platforms.tiva.Platform` module).
//!
//! ## Modules
//!
//! - [`registry`]: Qualified-name bindings over typed arenas
//! - [`descriptor`]: Field types, flags, records and function signatures
//! - [`module`]: Module specs, flags and the four composed records
//! - [`capability`]: Record chains and interface conformance checks
//! - [`factory`]: `create`, `construct` and bound-function calls
//! - [`hooks`]: Extension capsules, the loader contract, package context
//! - [`session`]: One configuration pass ending in a frozen [`Configuration`]
//!
//! Everything is single-threaded. Hook closures are reference counted and
//! the current-package context is a nested stack restored by RAII guards.

pub mod capability;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod id;
pub mod instance;
pub mod module;
pub mod package;
mod registration;
pub mod registry;
pub mod session;
pub mod value;

// Re-export key types for convenience
pub use descriptor::{FieldDecl, FieldFlag, FunctionDecl, RecordDesc, Signature, TypeDesc};
pub use error::{MetaError, Result, Site};
pub use factory::{ObjectSlot, Params};
pub use hooks::{Capsule, HookLoader, HookResult, HookScope, StaticLoader};
pub use id::{InstanceId, ModuleId, PackageId, RecordId, SignatureId};
pub use instance::{Category, Instance};
pub use module::{FunctionSpec, Module, ModuleFlags, ModuleSpec, ModuleState};
pub use package::{Import, Package, Version};
pub use registry::{Binding, Registry};
pub use session::{ConfigPass, Configuration};
pub use value::{FieldSet, Value};
