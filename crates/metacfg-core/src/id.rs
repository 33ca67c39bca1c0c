//! Typed arena handles.
//!
//! Descriptors live in per-kind arenas inside the [`Registry`](crate::Registry);
//! everything else refers to them by index. A handle is only meaningful for
//! the registry that issued it.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Self {
                debug_assert!(index <= u32::MAX as usize);
                Self(index as u32)
            }

            /// Position of this entry in its arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Handle to a structured record descriptor.
    RecordId,
    "record"
);
define_id!(
    /// Handle to a function signature.
    SignatureId,
    "fxn"
);
define_id!(
    /// Handle to a package descriptor.
    PackageId,
    "package"
);
define_id!(
    /// Handle to a module descriptor.
    ModuleId,
    "module"
);
define_id!(
    /// Handle to a registry-owned instance.
    InstanceId,
    "instance"
);
