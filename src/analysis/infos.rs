//! Lightweight per-class metadata consumed by the analyzer.
//!
//! Metadata describes the shape of a class and, for each method body, which classes and
//! members the body refers to. It never contains the bodies themselves.

use std::collections::BTreeMap;

use bitflags::bitflags;
use itertools::Itertools;

use crate::ir::{
    AnyFieldDef, ClassDef, ClassKind, ClassName, FieldName, MemberFlags, MethodName, Namespace,
    TopLevelExportDef, Tree, TypeRef,
};

/// The metadata of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMetadata {
    /// The encoded name of the class.
    pub name: ClassName,
    /// The kind of the class.
    pub kind: ClassKind,
    /// The declared super class.
    pub super_class: Option<ClassName>,
    /// The declared interfaces, in declaration order.
    pub interfaces: Vec<ClassName>,
    /// The signatures of the fields with encoded names.
    pub fields: Vec<FieldMetadata>,
    /// The classes appearing in the types of instance fields.
    pub referenced_field_classes: Vec<ClassName>,
    /// The declared methods.
    pub methods: Vec<MethodMetadata>,
    /// What the JS constructor and the members exported on instances refer to.
    pub exported_members: Vec<ReachabilityInfo>,
    /// The top-level exports.
    pub top_level_exports: Vec<TopLevelExportInfo>,
}

impl ClassMetadata {
    /// Gets the metadata of a declared method.
    #[must_use]
    pub fn method(&self, namespace: Namespace, name: &MethodName) -> Option<&MethodMetadata> {
        self.methods
            .iter()
            .find(|m| m.namespace == namespace && &m.name == name)
    }

    /// Checks if the class declares a static initializer.
    #[must_use]
    pub fn has_static_initializer(&self) -> bool {
        self.method(
            Namespace::StaticConstructor,
            &MethodName::static_initializer(),
        )
        .is_some()
    }
}

/// The signature of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// The name of the field.
    pub name: FieldName,
    /// The flags of the field.
    pub flags: MemberFlags,
    /// The type of the field.
    pub tpe: TypeRef,
}

/// The metadata of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMetadata {
    /// The namespace of the method.
    pub namespace: Namespace,
    /// The encoded name of the method.
    pub name: MethodName,
    /// Whether the method has no body.
    pub is_abstract: bool,
    /// What the body refers to.
    pub reachability: ReachabilityInfo,
}

/// The metadata of a top-level export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelExportInfo {
    /// The external name.
    pub export_name: String,
    /// What the export refers to.
    pub reachability: ReachabilityInfo,
}

bitflags! {
    /// How a piece of code uses a class.
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
    pub struct UsageFlags: u8 {
        /// Creates instances of the class.
        const INSTANTIATED = 0x01;
        /// Reads the singleton instance of the module class.
        const MODULE_ACCESSED = 0x02;
        /// Tests whether values are instances of the class.
        const INSTANCE_TESTS = 0x04;
        /// Needs the run-time type data of the class.
        const DATA_ACCESSED = 0x08;
        /// Reads or writes a static field of the class.
        const STATIC_FIELD_USED = 0x10;
        /// Reads or writes a private field of the JavaScript class.
        const PRIVATE_JS_FIELD_USED = 0x20;
    }
}

/// Everything a piece of code does with one class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassUsage {
    /// Usages that are not method calls.
    pub flags: UsageFlags,
    /// Methods called with dynamic dispatch on receivers of the class type.
    pub methods_called: Vec<MethodName>,
    /// Methods of the class called without dynamic dispatch.
    pub methods_called_statically: Vec<(Namespace, MethodName)>,
}

/// Everything a piece of code refers to, by class.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReachabilityInfo {
    /// The usages of each class, in class name order.
    pub by_class: BTreeMap<ClassName, ClassUsage>,
}

impl ReachabilityInfo {
    /// Creates an empty [`ReachabilityInfo`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks if the code refers to nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_class.is_empty()
    }

    fn usage(&mut self, class: &ClassName) -> &mut ClassUsage {
        self.by_class.entry(class.clone()).or_default()
    }

    fn add_flags(&mut self, class: &ClassName, flags: UsageFlags) -> &mut Self {
        self.usage(class).flags |= flags;
        self
    }

    /// Records the creation of an instance with the given constructor.
    pub fn instantiate(&mut self, class: &ClassName, ctor: &MethodName) -> &mut Self {
        self.add_flags(class, UsageFlags::INSTANTIATED)
            .call_method_statically(class, Namespace::Constructor, ctor)
    }

    /// Records the creation of an instance of a JavaScript class.
    pub fn instantiate_js(&mut self, class: &ClassName) -> &mut Self {
        self.add_flags(class, UsageFlags::INSTANTIATED)
    }

    /// Records an access to a module instance.
    pub fn access_module(&mut self, class: &ClassName) -> &mut Self {
        self.add_flags(class, UsageFlags::MODULE_ACCESSED)
    }

    /// Records an instance test or a cast.
    pub fn use_instance_tests(&mut self, class: &ClassName) -> &mut Self {
        self.add_flags(class, UsageFlags::INSTANCE_TESTS)
    }

    /// Records a use of the run-time type data.
    pub fn access_data(&mut self, class: &ClassName) -> &mut Self {
        self.add_flags(class, UsageFlags::DATA_ACCESSED)
    }

    /// Records a use of a static field.
    pub fn use_static_field(&mut self, class: &ClassName) -> &mut Self {
        self.add_flags(class, UsageFlags::STATIC_FIELD_USED)
    }

    /// Records a use of a private JavaScript field.
    pub fn use_private_js_field(&mut self, class: &ClassName) -> &mut Self {
        self.add_flags(class, UsageFlags::PRIVATE_JS_FIELD_USED)
    }

    /// Records a dynamically dispatched call.
    pub fn call_method(&mut self, class: &ClassName, method: &MethodName) -> &mut Self {
        let usage = self.usage(class);
        if !usage.methods_called.contains(method) {
            usage.methods_called.push(method.clone());
        }
        self
    }

    /// Records a statically bound call.
    pub fn call_method_statically(
        &mut self,
        class: &ClassName,
        namespace: Namespace,
        method: &MethodName,
    ) -> &mut Self {
        let usage = self.usage(class);
        if !usage
            .methods_called_statically
            .iter()
            .any(|(ns, m)| *ns == namespace && m == method)
        {
            usage
                .methods_called_statically
                .push((namespace, method.clone()));
        }
        self
    }

    /// Records the run-time type needs of a type used in an instance test or a cast.
    fn use_type_test(&mut self, tpe: &TypeRef) {
        match tpe.base_and_depth() {
            (TypeRef::Class(class), 0) => {
                self.use_instance_tests(class);
            }
            (TypeRef::Class(class), _) => {
                self.access_data(class);
            }
            _ => {}
        }
    }

    fn use_type_data(&mut self, tpe: &TypeRef) {
        if let Some(class) = tpe.base_class() {
            self.access_data(class);
        }
    }

    /// Records everything a tree refers to.
    pub fn traverse(&mut self, tree: &Tree) -> &mut Self {
        tree.walk(&mut |node| match node {
            Tree::New { class, ctor, .. } => {
                self.instantiate(class, ctor);
            }
            Tree::LoadModule(class) | Tree::LoadJSModule(class) => {
                self.access_module(class);
            }
            Tree::SelectStatic { class, .. } => {
                self.use_static_field(class);
            }
            Tree::SelectPrivateJSField { class, .. } => {
                self.use_private_js_field(class);
            }
            Tree::Apply {
                receiver_class,
                method,
                ..
            } => {
                self.call_method(receiver_class, method);
            }
            Tree::ApplyStatically {
                class,
                namespace,
                method,
                ..
            }
            | Tree::ApplyStatic {
                class,
                namespace,
                method,
                ..
            } => {
                self.call_method_statically(class, *namespace, method);
            }
            Tree::IsInstanceOf { test: tpe, .. } | Tree::AsInstanceOf { target: tpe, .. } => {
                self.use_type_test(tpe);
            }
            Tree::ClassOf(tpe) | Tree::NewArray { tpe, .. } => self.use_type_data(tpe),
            Tree::LoadJSConstructor(class) => {
                self.instantiate_js(class);
            }
            _ => {}
        });
        self
    }

    /// Creates the [`ReachabilityInfo`] of a tree.
    #[must_use]
    pub fn of_tree(tree: &Tree) -> Self {
        let mut info = Self::new();
        info.traverse(tree);
        info
    }
}

/// Generates the metadata of a class from its full definition.
#[must_use]
pub fn generate_class_metadata(class: &ClassDef) -> ClassMetadata {
    let fields = class
        .fields
        .iter()
        .filter_map(|field| match field {
            AnyFieldDef::Field(f) => Some(FieldMetadata {
                name: f.name.clone(),
                flags: f.flags,
                tpe: f.tpe.clone(),
            }),
            AnyFieldDef::JSField(_) => None,
        })
        .collect();

    let referenced_field_classes = class
        .fields
        .iter()
        .filter_map(|field| match field {
            AnyFieldDef::Field(f) if f.is_static() => None,
            AnyFieldDef::Field(f) => f.tpe.base_class(),
            AnyFieldDef::JSField(f) => f.tpe.base_class(),
        })
        .unique()
        .cloned()
        .collect();

    let methods = class
        .methods
        .iter()
        .map(|m| MethodMetadata {
            namespace: m.namespace,
            name: m.name.clone(),
            is_abstract: m.is_abstract(),
            reachability: m
                .body
                .as_ref()
                .map(ReachabilityInfo::of_tree)
                .unwrap_or_default(),
        })
        .collect();

    let exported_members = class
        .js_constructor
        .iter()
        .map(|ctor| ReachabilityInfo::of_tree(&ctor.body))
        .chain(class.exported_members.iter().map(|member| {
            let mut info = ReachabilityInfo::of_tree(&member.body);
            for param in &member.params {
                info.use_type_data(&param.ptpe);
            }
            info
        }))
        .collect();

    let top_level_exports = class
        .top_level_exports
        .iter()
        .map(|export| {
            let mut reachability = ReachabilityInfo::new();
            match export {
                TopLevelExportDef::Module { .. } => {
                    reachability.access_module(&class.name);
                }
                TopLevelExportDef::JSClass { .. } => {
                    reachability.instantiate_js(&class.name);
                }
                TopLevelExportDef::Method { body, .. } => {
                    reachability.traverse(body);
                }
                TopLevelExportDef::Field { .. } => {
                    reachability.use_static_field(&class.name);
                }
            }
            TopLevelExportInfo {
                export_name: export.export_name().to_owned(),
                reachability,
            }
        })
        .collect();

    ClassMetadata {
        name: class.name.clone(),
        kind: class.kind,
        super_class: class.super_class.clone(),
        interfaces: class.interfaces.clone(),
        fields,
        referenced_field_classes,
        methods,
        exported_members,
        top_level_exports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{FieldDef, PrimitiveType},
        tests::{class_def, method_def},
    };

    #[test]
    fn body_references_are_collected() {
        let body = Tree::Block(vec![
            Tree::New {
                class: ClassName::new("A"),
                ctor: MethodName::no_arg_constructor(),
                args: Vec::new(),
            },
            Tree::Apply {
                receiver_class: ClassName::new("B"),
                receiver: Box::new(Tree::LoadModule(ClassName::new("B"))),
                method: MethodName::new("foo__V"),
                args: vec![Tree::IsInstanceOf {
                    expr: Box::new(Tree::This),
                    test: TypeRef::Class(ClassName::new("C")).array_of(1),
                }],
            },
        ]);
        let info = ReachabilityInfo::of_tree(&body);

        let a = &info.by_class[&ClassName::new("A")];
        assert!(a.flags.contains(UsageFlags::INSTANTIATED));
        assert_eq!(
            a.methods_called_statically,
            vec![(Namespace::Constructor, MethodName::no_arg_constructor())]
        );

        let b = &info.by_class[&ClassName::new("B")];
        assert!(b.flags.contains(UsageFlags::MODULE_ACCESSED));
        assert_eq!(b.methods_called, vec![MethodName::new("foo__V")]);

        let c = &info.by_class[&ClassName::new("C")];
        assert_eq!(c.flags, UsageFlags::DATA_ACCESSED);
    }

    #[test]
    fn field_classes_skip_statics_and_primitives() {
        let mut class = class_def("A", Some("O"), Vec::new());
        class.fields = vec![
            AnyFieldDef::Field(FieldDef {
                flags: MemberFlags::empty(),
                name: FieldName::new("b"),
                tpe: TypeRef::Class(ClassName::new("B")),
            }),
            AnyFieldDef::Field(FieldDef {
                flags: MemberFlags::STATIC,
                name: FieldName::new("c"),
                tpe: TypeRef::Class(ClassName::new("C")),
            }),
            AnyFieldDef::Field(FieldDef {
                flags: MemberFlags::MUTABLE,
                name: FieldName::new("i"),
                tpe: TypeRef::Primitive(PrimitiveType::Int),
            }),
        ];
        let metadata = generate_class_metadata(&class);
        assert_eq!(metadata.referenced_field_classes, vec![ClassName::new("B")]);
        assert_eq!(metadata.fields.len(), 3);
    }

    #[test]
    fn abstract_methods_have_empty_reachability() {
        let class = class_def(
            "A",
            Some("O"),
            vec![method_def(Namespace::Public, MethodName::new("foo__V"), None)],
        );
        let metadata = generate_class_metadata(&class);
        let foo = metadata
            .method(Namespace::Public, &MethodName::new("foo__V"))
            .unwrap();
        assert!(foo.is_abstract);
        assert!(foo.reachability.is_empty());
    }
}
