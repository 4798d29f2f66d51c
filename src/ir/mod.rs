//! The intermediate representation consumed by the linker.

pub mod kinds;
pub mod names;
pub mod trees;

pub use kinds::ClassKind;
pub use names::{
    ClassName, FieldName, InvalidTypeRef, LocalName, MethodName, Namespace, PrimitiveType, TypeRef,
};
pub use trees::{
    AnyFieldDef, ClassDef, ExportedMemberDef, ExportedMemberKind, FieldDef, JSConstructorDef,
    JSFieldDef, Literal, MemberFlags, MethodDef, ParamDef, TopLevelExportDef, Tree, Version,
};
