//! Package descriptors and import version constraints.

use serde::Serialize;

use crate::id::ModuleId;

/// A semantic version triple.
pub type Version = semver::Version;

/// An `(imported-package, minimum-version)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Import {
    pub name: String,
    /// `None` accepts any version.
    pub min_version: Option<Version>,
}

impl Import {
    pub fn new(name: impl Into<String>, min_version: Option<Version>) -> Self {
        Self {
            name: name.into(),
            min_version,
        }
    }

    /// Whether `actual` satisfies this import's minimum.
    pub fn accepts(&self, actual: &Version) -> bool {
        self.min_version.as_ref().map_or(true, |min| actual >= min)
    }
}

/// A versioned unit grouping modules.
#[derive(Debug, Clone, Serialize)]
pub struct Package {
    name: String,
    version: Version,
    build_date: Option<String>,
    imports: Vec<Import>,
    #[serde(skip)]
    modules: Vec<ModuleId>,
    use_deps: Vec<String>,
    finalized: bool,
}

impl Package {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            build_date: None,
            imports: Vec::new(),
            modules: Vec::new(),
            use_deps: Vec::new(),
            finalized: false,
        }
    }

    pub fn with_build_date(mut self, date: impl Into<String>) -> Self {
        self.build_date = Some(date.into());
        self
    }

    pub fn with_import(mut self, import: Import) -> Self {
        self.imports.push(import);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn build_date(&self) -> Option<&str> {
        self.build_date.as_deref()
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    /// Modules in registration order.
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    /// Packages reported by `module$use` hooks, first occurrence order.
    pub fn use_deps(&self) -> &[String] {
        &self.use_deps
    }

    /// Whether no more modules may be registered.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn push_module(&mut self, id: ModuleId) {
        self.modules.push(id);
    }

    pub(crate) fn add_use_dep(&mut self, dep: &str) {
        if dep != self.name && !self.use_deps.iter().any(|d| d == dep) {
            self.use_deps.push(dep.to_string());
        }
    }

    pub(crate) fn finalize(&mut self) {
        self.finalized = true;
    }
}
