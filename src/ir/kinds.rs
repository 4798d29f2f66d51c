//! Kinds of classes.

/// The kind of a class, which determines how it is instantiated, dispatched and emitted.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum ClassKind {
    /// A regular class.
    Class,
    /// A singleton object, accessed through a lazily initialized module accessor.
    ModuleClass,
    /// An interface.
    Interface,
    /// A class whose instances are represented by primitive values at run time.
    HijackedClass,
    /// A class defined in the program but instantiated as a JavaScript class.
    JSClass,
    /// A singleton JavaScript object defined in the program.
    JSModuleClass,
    /// A JavaScript class provided by the environment.
    NativeJSClass,
    /// A singleton JavaScript object provided by the environment.
    NativeJSModuleClass,
    /// A JavaScript type that only exists for type checking.
    AbstractJSType,
}

impl ClassKind {
    /// Checks if instances of this kind dispatch methods through [`Namespace::Public`] tables.
    ///
    /// [`Namespace::Public`]: crate::ir::Namespace::Public
    #[must_use]
    pub const fn is_class(self) -> bool {
        matches!(self, Self::Class | Self::ModuleClass | Self::HijackedClass)
    }

    /// Checks if this is one of the JavaScript kinds.
    #[must_use]
    pub const fn is_js_type(self) -> bool {
        matches!(
            self,
            Self::JSClass
                | Self::JSModuleClass
                | Self::NativeJSClass
                | Self::NativeJSModuleClass
                | Self::AbstractJSType
        )
    }

    /// Checks if this is a JavaScript class whose code is part of the program.
    #[must_use]
    pub const fn is_js_class(self) -> bool {
        matches!(self, Self::JSClass | Self::JSModuleClass)
    }

    /// Checks if this is a JavaScript class provided by the environment.
    #[must_use]
    pub const fn is_native_js_class(self) -> bool {
        matches!(self, Self::NativeJSClass | Self::NativeJSModuleClass)
    }

    /// Checks if classes of this kind are singletons.
    #[must_use]
    pub const fn is_module(self) -> bool {
        matches!(
            self,
            Self::ModuleClass | Self::JSModuleClass | Self::NativeJSModuleClass
        )
    }

    /// Checks if the kind requires an emitted module accessor.
    #[must_use]
    pub const fn has_module_accessor(self) -> bool {
        matches!(self, Self::ModuleClass | Self::JSModuleClass)
    }

    /// Checks if a class of this kind must declare a super class.
    /// Only `java.lang.Object` is exempt among the kinds that return `true`.
    #[must_use]
    pub const fn requires_super_class(self) -> bool {
        !matches!(self, Self::Interface | Self::AbstractJSType)
    }

    /// Checks if `super_kind` is an acceptable kind for the super class of a class of this kind.
    #[must_use]
    pub const fn accepts_super_class(self, super_kind: ClassKind) -> bool {
        match self {
            Self::Class | Self::ModuleClass | Self::HijackedClass => {
                matches!(super_kind, Self::Class)
            }
            Self::Interface => false,
            Self::JSClass
            | Self::JSModuleClass
            | Self::NativeJSClass
            | Self::NativeJSModuleClass
            | Self::AbstractJSType => matches!(super_kind, Self::JSClass | Self::NativeJSClass),
        }
    }

    /// Checks if a class of this kind may extend `java.lang.Object` directly. Only the
    /// roots of the JavaScript hierarchy provided by the environment may do so among the
    /// JavaScript kinds.
    #[must_use]
    pub const fn accepts_object_super_class(self) -> bool {
        matches!(
            self,
            Self::Class
                | Self::ModuleClass
                | Self::HijackedClass
                | Self::NativeJSClass
                | Self::NativeJSModuleClass
                | Self::AbstractJSType
        )
    }

    /// The only kind a class of this kind can implement as an interface.
    #[must_use]
    pub const fn interface_kind(self) -> ClassKind {
        if self.is_js_type() {
            Self::AbstractJSType
        } else {
            Self::Interface
        }
    }

    /// Returns the kind to emit when the module accessor is never used.
    #[must_use]
    pub const fn without_module_accessor(self) -> ClassKind {
        match self {
            Self::ModuleClass => Self::Class,
            Self::JSModuleClass => Self::JSClass,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn js_and_class_kinds_are_disjoint(kind in any::<ClassKind>()) {
            assert!(!(kind.is_class() && kind.is_js_type()));
        }

        #[test]
        fn degraded_kind_has_no_accessor(kind in any::<ClassKind>()) {
            assert!(!kind.without_module_accessor().has_module_accessor());
        }
    }

    #[test]
    fn super_class_rules() {
        use ClassKind::*;
        for sub in [Class, ModuleClass, HijackedClass] {
            assert!(sub.accepts_super_class(Class));
            for bad in [Interface, ModuleClass, JSClass, NativeJSClass] {
                assert!(!sub.accepts_super_class(bad));
            }
        }
        for sub in [JSClass, JSModuleClass, NativeJSClass, NativeJSModuleClass, AbstractJSType] {
            assert!(sub.accepts_super_class(JSClass));
            assert!(sub.accepts_super_class(NativeJSClass));
            for bad in [Class, Interface, AbstractJSType, JSModuleClass] {
                assert!(!sub.accepts_super_class(bad));
            }
        }
    }

    #[test]
    fn only_native_js_roots_extend_object() {
        use ClassKind::*;
        for kind in [NativeJSClass, NativeJSModuleClass, AbstractJSType, Class, ModuleClass] {
            assert!(kind.accepts_object_super_class());
        }
        for kind in [JSClass, JSModuleClass, Interface] {
            assert!(!kind.accepts_object_super_class());
        }
    }
}
