//! Symbol requirements, the roots of the reachability analysis.

use std::ops::Add;

use crate::ir::{ClassName, FieldName, MethodName};

/// Something the linked program must contain, regardless of what the program itself uses.
///
/// Requirements are plain data interpreted by the analyzer. They are combined with `+`.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub enum SymbolRequirement {
    /// The singleton instance of a module class is accessed.
    AccessModule {
        /// The component that created the requirement.
        origin: String,
        /// The module class.
        module: ClassName,
    },
    /// Instances of a class are created with the given constructor.
    InstantiateClass {
        /// The component that created the requirement.
        origin: String,
        /// The class.
        class: ClassName,
        /// The constructor.
        ctor: MethodName,
    },
    /// Values are tested against the class.
    InstanceTests {
        /// The component that created the requirement.
        origin: String,
        /// The class.
        class: ClassName,
    },
    /// The run-time type data of the class is needed.
    ClassData {
        /// The component that created the requirement.
        origin: String,
        /// The class.
        class: ClassName,
    },
    /// A static field is read or written.
    AccessStaticField {
        /// The component that created the requirement.
        origin: String,
        /// The class declaring the field.
        class: ClassName,
        /// The field.
        field: FieldName,
    },
    /// An instance method is called.
    CallMethod {
        /// The component that created the requirement.
        origin: String,
        /// The class of the receiver.
        class: ClassName,
        /// The method.
        method: MethodName,
        /// Whether the implementation of `class` is called, without dynamic dispatch.
        statically: bool,
    },
    /// A public static method is called.
    CallStaticMethod {
        /// The component that created the requirement.
        origin: String,
        /// The class.
        class: ClassName,
        /// The method.
        method: MethodName,
    },
    /// The requirement is satisfied if possible; the classes it refers to may not exist.
    Optional(Box<SymbolRequirement>),
    /// All of the requirements.
    Multiple(Vec<SymbolRequirement>),
    /// Nothing.
    #[default]
    NoRequirement,
}

impl SymbolRequirement {
    /// The empty requirement.
    #[must_use]
    pub fn none() -> Self {
        Self::NoRequirement
    }

    /// Combines several requirements.
    pub fn multiple(requirements: impl IntoIterator<Item = SymbolRequirement>) -> Self {
        requirements.into_iter().fold(Self::NoRequirement, Add::add)
    }

    /// Checks if the requirement requires nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::NoRequirement => true,
            Self::Optional(inner) => inner.is_empty(),
            Self::Multiple(all) => all.iter().all(Self::is_empty),
            _ => false,
        }
    }
}

impl Add for SymbolRequirement {
    type Output = SymbolRequirement;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Self::NoRequirement, it) | (it, Self::NoRequirement) => it,
            (Self::Multiple(mut lhs), Self::Multiple(rhs)) => {
                lhs.extend(rhs);
                Self::Multiple(lhs)
            }
            (Self::Multiple(mut lhs), rhs) => {
                lhs.push(rhs);
                Self::Multiple(lhs)
            }
            (lhs, Self::Multiple(mut rhs)) => {
                rhs.insert(0, lhs);
                Self::Multiple(rhs)
            }
            (lhs, rhs) => Self::Multiple(vec![lhs, rhs]),
        }
    }
}

/// Creates [`SymbolRequirement`]s tagged with the component that needs them.
#[derive(Debug, Clone)]
pub struct RequirementFactory {
    origin: String,
}

impl RequirementFactory {
    /// Creates a factory for the given component.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    /// The component the requirements are created for.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Requires accessing a module.
    #[must_use]
    pub fn access_module(&self, module: ClassName) -> SymbolRequirement {
        SymbolRequirement::AccessModule {
            origin: self.origin.clone(),
            module,
        }
    }

    /// Requires creating instances of a class.
    #[must_use]
    pub fn instantiate_class(&self, class: ClassName, ctor: MethodName) -> SymbolRequirement {
        SymbolRequirement::InstantiateClass {
            origin: self.origin.clone(),
            class,
            ctor,
        }
    }

    /// Requires testing values against a class.
    #[must_use]
    pub fn instance_tests(&self, class: ClassName) -> SymbolRequirement {
        SymbolRequirement::InstanceTests {
            origin: self.origin.clone(),
            class,
        }
    }

    /// Requires the run-time type data of a class.
    #[must_use]
    pub fn class_data(&self, class: ClassName) -> SymbolRequirement {
        SymbolRequirement::ClassData {
            origin: self.origin.clone(),
            class,
        }
    }

    /// Requires accessing a static field.
    #[must_use]
    pub fn access_static_field(&self, class: ClassName, field: FieldName) -> SymbolRequirement {
        SymbolRequirement::AccessStaticField {
            origin: self.origin.clone(),
            class,
            field,
        }
    }

    /// Requires calling a method with dynamic dispatch.
    #[must_use]
    pub fn call_method(&self, class: ClassName, method: MethodName) -> SymbolRequirement {
        SymbolRequirement::CallMethod {
            origin: self.origin.clone(),
            class,
            method,
            statically: false,
        }
    }

    /// Requires calling the implementation of a method found from `class`.
    #[must_use]
    pub fn call_method_statically(
        &self,
        class: ClassName,
        method: MethodName,
    ) -> SymbolRequirement {
        SymbolRequirement::CallMethod {
            origin: self.origin.clone(),
            class,
            method,
            statically: true,
        }
    }

    /// Requires calling a public static method.
    #[must_use]
    pub fn call_static_method(&self, class: ClassName, method: MethodName) -> SymbolRequirement {
        SymbolRequirement::CallStaticMethod {
            origin: self.origin.clone(),
            class,
            method,
        }
    }

    /// Requires calling a method on the instance of a module.
    #[must_use]
    pub fn call_on_module(&self, module: ClassName, method: MethodName) -> SymbolRequirement {
        self.access_module(module.clone()) + self.call_method(module, method)
    }

    /// Makes a requirement optional.
    #[must_use]
    pub fn optional(&self, requirement: SymbolRequirement) -> SymbolRequirement {
        SymbolRequirement::Optional(Box::new(requirement))
    }

    /// Combines several requirements.
    pub fn multiple(
        &self,
        requirements: impl IntoIterator<Item = SymbolRequirement>,
    ) -> SymbolRequirement {
        SymbolRequirement::multiple(requirements)
    }

    /// The empty requirement.
    #[must_use]
    pub fn none(&self) -> SymbolRequirement {
        SymbolRequirement::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_flattens() {
        let factory = RequirementFactory::new("tests");
        let a = factory.class_data(ClassName::new("A"));
        let b = factory.class_data(ClassName::new("B"));
        let c = factory.class_data(ClassName::new("C"));
        let combined = a.clone() + factory.none() + b.clone() + c.clone();
        assert_eq!(combined, SymbolRequirement::Multiple(vec![a, b, c]));
    }

    #[test]
    fn emptiness() {
        let factory = RequirementFactory::new("tests");
        assert!(factory.none().is_empty());
        assert!(factory.multiple([factory.none(), factory.none()]).is_empty());
        assert!(factory.optional(factory.none()).is_empty());
        assert!(!factory
            .call_on_module(ClassName::new("M"), MethodName::new("main__V"))
            .is_empty());
    }
}
