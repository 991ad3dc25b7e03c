//! Dependency Keys
//!
//! A dependency key names one declaration-level fact: which declaration, and
//! which aspect of it (its interface or its implementation). Keys are plain
//! immutable values; equality and hashing cover both fields.
//!
//! The exact set of designator kinds is dictated by whatever layer extracts
//! per-file facts from source. The graph only treats two of them specially:
//! `SourceFileProvide` (the node standing for a whole file) and
//! `ExternalDepend` (something outside every tracked file).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which aspect of a declaration a key refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeclAspect {
    /// Changes here can affect users of the declaration.
    Interface,
    /// Changes here only affect the declaring file.
    Implementation,
}

impl fmt::Display for DeclAspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclAspect::Interface => f.write_str("interface"),
            DeclAspect::Implementation => f.write_str("implementation"),
        }
    }
}

/// What kind of declaration a key designates, and its name(s).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Designator {
    /// A top-level name visible at module scope.
    TopLevel { name: String },
    /// A nominal type, identified by its mangled context.
    Nominal { context: String },
    /// Any member of a nominal type, used when the member name is unknown.
    PotentialMember { context: String },
    /// A named member of a nominal type.
    Member { context: String, name: String },
    /// A member looked up dynamically by name.
    DynamicLookup { name: String },
    /// A dependency on something outside all tracked files.
    ExternalDepend { name: String },
    /// The file itself, as a provider of everything it declares.
    SourceFileProvide { name: String },
}

impl Designator {
    pub fn top_level(name: impl Into<String>) -> Self {
        Designator::TopLevel { name: name.into() }
    }

    pub fn nominal(context: impl Into<String>) -> Self {
        Designator::Nominal {
            context: context.into(),
        }
    }

    pub fn potential_member(context: impl Into<String>) -> Self {
        Designator::PotentialMember {
            context: context.into(),
        }
    }

    pub fn member(context: impl Into<String>, name: impl Into<String>) -> Self {
        Designator::Member {
            context: context.into(),
            name: name.into(),
        }
    }

    pub fn dynamic_lookup(name: impl Into<String>) -> Self {
        Designator::DynamicLookup { name: name.into() }
    }

    pub fn external_depend(name: impl Into<String>) -> Self {
        Designator::ExternalDepend { name: name.into() }
    }

    pub fn source_file_provide(name: impl Into<String>) -> Self {
        Designator::SourceFileProvide { name: name.into() }
    }

    /// Short tag for the designator kind, used in logs and exports.
    pub fn kind(&self) -> &'static str {
        match self {
            Designator::TopLevel { .. } => "top-level",
            Designator::Nominal { .. } => "nominal",
            Designator::PotentialMember { .. } => "potential-member",
            Designator::Member { .. } => "member",
            Designator::DynamicLookup { .. } => "dynamic-lookup",
            Designator::ExternalDepend { .. } => "external-depend",
            Designator::SourceFileProvide { .. } => "source-file-provide",
        }
    }
}

impl fmt::Display for Designator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Designator::TopLevel { name }
            | Designator::DynamicLookup { name }
            | Designator::ExternalDepend { name }
            | Designator::SourceFileProvide { name } => write!(f, "{} `{}`", self.kind(), name),
            Designator::Nominal { context } | Designator::PotentialMember { context } => {
                write!(f, "{} `{}`", self.kind(), context)
            }
            Designator::Member { context, name } => {
                write!(f, "{} `{}.{}`", self.kind(), context, name)
            }
        }
    }
}

/// Aspect-qualified identity of a dependency fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyKey {
    aspect: DeclAspect,
    designator: Designator,
}

impl DependencyKey {
    pub fn new(aspect: DeclAspect, designator: Designator) -> Self {
        Self { aspect, designator }
    }

    /// The key a use of an external dependency is recorded against.
    ///
    /// Users always depend on the interface of an external dependency.
    pub fn external(name: impl Into<String>) -> Self {
        Self::new(DeclAspect::Interface, Designator::external_depend(name))
    }

    pub fn aspect(&self) -> DeclAspect {
        self.aspect
    }

    pub fn designator(&self) -> &Designator {
        &self.designator
    }

    /// The same designator with the other aspect.
    pub fn with_aspect(&self, aspect: DeclAspect) -> Self {
        Self::new(aspect, self.designator.clone())
    }

    pub fn is_interface(&self) -> bool {
        self.aspect == DeclAspect::Interface
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.aspect, self.designator)
    }
}
