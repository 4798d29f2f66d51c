//! Errors found by the analyzer and their provenance.

use itertools::Itertools;

use crate::ir::{ClassKind, ClassName, MethodName, Namespace};

/// A reference to a method of a class.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, derive_more::Display)]
#[display("{owner}.{name}")]
pub struct MethodRef {
    /// The class declaring the method.
    pub owner: ClassName,
    /// The namespace of the method.
    pub namespace: Namespace,
    /// The name of the method.
    pub name: MethodName,
}

impl MethodRef {
    /// Creates a new [`MethodRef`].
    #[must_use]
    pub fn new(owner: ClassName, namespace: Namespace, name: MethodName) -> Self {
        Self {
            owner,
            namespace,
            name,
        }
    }
}

/// What caused something to be needed.
#[derive(Debug, PartialEq, Eq, Hash, Clone, derive_more::Display)]
pub enum Origin {
    /// A requirement given to the analyzer, tagged with the component that created it.
    #[display("{_0}")]
    Core(String),
    /// The class itself, e.g., a class referring to its parents.
    #[display("class {_0}")]
    Class(ClassName),
    /// The body of a method.
    #[display("method {_0}")]
    Method(MethodRef),
    /// Members exported to JavaScript.
    #[display("exported members")]
    Exports,
}

/// An error found by the analyzer.
///
/// Analysis errors do not stop the analysis. They are collected in the resulting
/// [`Analysis`](super::Analysis), which must not be linked if it contains any.
#[derive(thiserror::Error, Debug, PartialEq, Eq, Hash, Clone)]
pub enum Error {
    /// The class universe does not define `java.lang.Object`.
    #[error("Fatal error: java.lang.Object is missing")]
    MissingJavaLangObjectClass,
    /// `java.lang.Object` is not a class without parents.
    #[error("Fatal error: java.lang.Object is invalid (it must be a Class with no super class nor interfaces)")]
    InvalidJavaLangObjectClass,
    /// The classes extend or implement each other in a cycle.
    #[error("Fatal error: cycle in inheritance chain involving {}", .classes.iter().join(", "))]
    CycleInInheritanceChain {
        /// The classes on the cycle, in inheritance order.
        classes: Vec<ClassName>,
        /// The origin of the error.
        origin: Origin,
    },
    /// A class that does not exist is referred to.
    #[error("Referring to non-existent class {class}")]
    MissingClass {
        /// The missing class.
        class: ClassName,
        /// What referred to it.
        origin: Origin,
    },
    /// A class does not declare the super class its kind requires.
    #[error("{class} (of kind {kind}) is missing a super class")]
    MissingSuperClass {
        /// The class.
        class: ClassName,
        /// The kind of the class.
        kind: ClassKind,
        /// The origin of the error.
        origin: Origin,
    },
    /// A class extends a class of a kind it cannot extend.
    #[error("{super_class} (of kind {super_kind}) is not a valid super class of {class} (of kind {kind})")]
    InvalidSuperClass {
        /// The super class.
        super_class: ClassName,
        /// The kind of the super class.
        super_kind: ClassKind,
        /// The subclass.
        class: ClassName,
        /// The kind of the subclass.
        kind: ClassKind,
        /// The origin of the error.
        origin: Origin,
    },
    /// A class implements something that is not an interface of a compatible kind.
    #[error("{interface} (of kind {interface_kind}) is not a valid interface implemented by {class} (of kind {kind})")]
    InvalidImplementedInterface {
        /// The implemented class.
        interface: ClassName,
        /// The kind of the implemented class.
        interface_kind: ClassKind,
        /// The implementing class.
        class: ClassName,
        /// The kind of the implementing class.
        kind: ClassKind,
        /// The origin of the error.
        origin: Origin,
    },
    /// A class that is not a module is accessed as a module.
    #[error("Cannot access module for non-module {class}")]
    NotAModule {
        /// The accessed class.
        class: ClassName,
        /// What accessed it.
        origin: Origin,
    },
    /// A method that does not exist is called.
    #[error("Referring to non-existent method {method}")]
    MissingMethod {
        /// The missing method.
        method: MethodRef,
        /// What called it.
        origin: Origin,
    },
    /// More than one interface provides the default implementation of a method.
    #[error("Conflicting default methods: {}", .methods.iter().join(" "))]
    ConflictingDefaultMethods {
        /// The conflicting methods, in the ancestor order of the class being resolved.
        methods: Vec<MethodRef>,
        /// What called the method.
        origin: Origin,
    },
    /// More than one top-level export has the same name.
    #[error("Conflicting top-level exports for name {name} from {}", .owners.iter().join(", "))]
    ConflictingTopLevelExport {
        /// The exported name.
        name: String,
        /// The exporting classes, repeated if a class exports the name more than once.
        owners: Vec<ClassName>,
    },
}

impl Error {
    /// Returns what caused the error, if it has a cause inside the program.
    #[must_use]
    pub fn origin(&self) -> Option<&Origin> {
        match self {
            Self::MissingJavaLangObjectClass
            | Self::InvalidJavaLangObjectClass
            | Self::ConflictingTopLevelExport { .. } => None,
            Self::CycleInInheritanceChain { origin, .. }
            | Self::MissingClass { origin, .. }
            | Self::MissingSuperClass { origin, .. }
            | Self::InvalidSuperClass { origin, .. }
            | Self::InvalidImplementedInterface { origin, .. }
            | Self::NotAModule { origin, .. }
            | Self::MissingMethod { origin, .. }
            | Self::ConflictingDefaultMethods { origin, .. } => Some(origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprits() {
        let cycle = Error::CycleInInheritanceChain {
            classes: vec![ClassName::new("A"), ClassName::new("B")],
            origin: Origin::Class(ClassName::new("B")),
        };
        assert_eq!(
            cycle.to_string(),
            "Fatal error: cycle in inheritance chain involving A, B"
        );

        let missing = Error::MissingMethod {
            method: MethodRef::new(
                ClassName::new("A"),
                Namespace::Public,
                MethodName::new("foo__V"),
            ),
            origin: Origin::Core("tests".to_owned()),
        };
        assert_eq!(
            missing.to_string(),
            "Referring to non-existent method A.foo__V"
        );
        assert_eq!(
            missing.origin().map(ToString::to_string),
            Some("tests".to_owned())
        );
    }

    #[test]
    fn root_errors_have_no_origin() {
        assert!(Error::MissingJavaLangObjectClass.origin().is_none());
        let conflict = Error::ConflictingTopLevelExport {
            name: "foo".to_owned(),
            owners: vec![ClassName::new("A"), ClassName::new("A")],
        };
        assert!(conflict.origin().is_none());
        assert_eq!(
            conflict.to_string(),
            "Conflicting top-level exports for name foo from A, A"
        );
    }
}
