use proptest::prelude::*;

use crate::{
    analysis::{RequirementFactory, SymbolRequirement},
    ir::{ClassDef, ClassKind, ClassName, MethodDef, MethodName, Namespace, PrimitiveType, Tree, TypeRef},
};

pub(crate) fn requirements() -> RequirementFactory {
    RequirementFactory::new("tests")
}

#[must_use]
pub(crate) fn object_class_def() -> ClassDef {
    ClassDef::new(ClassName::object(), ClassKind::Class, None).with_method(MethodDef::new(
        Namespace::Constructor,
        MethodName::no_arg_constructor(),
        Some(Tree::Skip),
    ))
}

/// A class with a trivial no-argument constructor.
#[must_use]
pub(crate) fn class_def(name: &str, super_class: Option<&str>, methods: Vec<MethodDef>) -> ClassDef {
    let mut class = ClassDef::new(name, ClassKind::Class, super_class.map(ClassName::new))
        .with_method(MethodDef::new(
            Namespace::Constructor,
            MethodName::no_arg_constructor(),
            Some(Tree::Skip),
        ));
    class.methods.extend(methods);
    class
}

#[must_use]
pub(crate) fn interface_def(name: &str) -> ClassDef {
    ClassDef::new(name, ClassKind::Interface, None)
}

#[must_use]
pub(crate) fn method_def(namespace: Namespace, name: MethodName, body: Option<Tree>) -> MethodDef {
    MethodDef::new(namespace, name, body)
}

pub(crate) fn instantiate(class: &str) -> SymbolRequirement {
    requirements().instantiate_class(ClassName::new(class), MethodName::no_arg_constructor())
}

pub(crate) fn call_method(class: &str, method: &str) -> SymbolRequirement {
    requirements().call_method(ClassName::new(class), MethodName::new(method))
}

pub(crate) fn arb_class_name() -> impl Strategy<Value = ClassName> {
    prop_oneof![
        Just(ClassName::object()),
        Just(ClassName::new(ClassName::STRING)),
        prop::string::string_regex(r"L[a-zA-Z][a-zA-Z0-9]{0,8}")
            .expect("The regex is invalid")
            .prop_map(ClassName::new),
    ]
}

pub(crate) fn arb_non_array_type_ref() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        any::<PrimitiveType>().prop_map(TypeRef::Primitive),
        arb_class_name().prop_map(TypeRef::Class),
    ]
}

prop_compose! {
    fn arb_array_type_ref()(
        t in arb_non_array_type_ref(),
        dim in 1..=4_u8,
    ) -> TypeRef {
        t.array_of(dim)
    }
}

pub(crate) fn arb_type_ref() -> impl Strategy<Value = TypeRef> {
    prop_oneof![
        Just(TypeRef::Void),
        arb_non_array_type_ref(),
        arb_array_type_ref(),
    ]
}
