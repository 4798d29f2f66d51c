//! Encoded names of classes, members and types.
//!
//! Method names embed their signature: `simple__P1__P2__R` where each `P` is the encoded
//! [`TypeRef`] of a parameter and `R` the encoded result type. Constructors are named
//! `init___` followed by their parameter types and the static initializer is `clinit___`.
//! A name ending in `__` (without a result type) is a reflective proxy.

use std::{fmt::Display, str::FromStr};

use itertools::Itertools;

/// The encoded name of a class.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, derive_more::Display)]
#[display("{_0}")]
pub struct ClassName(String);

impl ClassName {
    /// The encoded name of `java.lang.Object`.
    pub const OBJECT: &'static str = "O";
    /// The encoded name of `java.lang.String`.
    pub const STRING: &'static str = "T";

    /// Creates a new [`ClassName`] from its encoded form.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The name of `java.lang.Object`, the root of every class hierarchy.
    #[must_use]
    pub fn object() -> Self {
        Self::new(Self::OBJECT)
    }

    /// Returns the encoded form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if this is `java.lang.Object`.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.0 == Self::OBJECT
    }
}

impl From<&str> for ClassName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The encoded name of a field.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, derive_more::Display)]
#[display("{_0}")]
pub struct FieldName(String);

impl FieldName {
    /// Creates a new [`FieldName`].
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Returns the encoded form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The name of a local variable or a parameter.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, derive_more::Display)]
#[display("{_0}")]
pub struct LocalName(String);

impl LocalName {
    /// Creates a new [`LocalName`].
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for LocalName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// The encoded name of a method, including its signature.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, derive_more::Display)]
#[display("{_0}")]
pub struct MethodName(String);

const SEPARATOR: &str = "__";

impl MethodName {
    /// The prefix shared by all constructor names.
    pub const CONSTRUCTOR_PREFIX: &'static str = "init___";
    /// The name of the static initializer of a class.
    pub const STATIC_INITIALIZER: &'static str = "clinit___";

    /// Creates a new [`MethodName`] from its encoded form.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Builds the encoded name of a method from its parts.
    #[cfg(test)]
    pub(crate) fn from_signature(simple_name: &str, params: &[TypeRef], result: &TypeRef) -> Self {
        let encoded = std::iter::once(simple_name.to_owned())
            .chain(params.iter().map(TypeRef::descriptor))
            .chain(std::iter::once(result.descriptor()))
            .join(SEPARATOR);
        Self(encoded)
    }

    /// Builds the encoded name of a constructor with the given parameter types.
    #[cfg(test)]
    pub(crate) fn constructor(params: &[TypeRef]) -> Self {
        let params = params.iter().map(TypeRef::descriptor).join(SEPARATOR);
        Self(format!("{}{params}", Self::CONSTRUCTOR_PREFIX))
    }

    /// The name of the constructor without parameters.
    #[must_use]
    pub fn no_arg_constructor() -> Self {
        Self::new(Self::CONSTRUCTOR_PREFIX)
    }

    /// The name of the static initializer.
    #[must_use]
    pub fn static_initializer() -> Self {
        Self::new(Self::STATIC_INITIALIZER)
    }

    /// Returns the encoded form of the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if the method is a constructor.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.0.starts_with(Self::CONSTRUCTOR_PREFIX)
    }

    /// Checks if the method is the static initializer.
    #[must_use]
    pub fn is_static_initializer(&self) -> bool {
        self.0 == Self::STATIC_INITIALIZER
    }

    /// Checks if the name denotes a reflective proxy, i.e., it has no result type.
    #[must_use]
    pub fn is_reflective_proxy(&self) -> bool {
        self.0.ends_with(SEPARATOR) && !self.is_constructor() && !self.is_static_initializer()
    }

    /// The name of the method in source, without the signature.
    #[cfg(test)]
    pub(crate) fn simple_name(&self) -> &str {
        self.0.split(SEPARATOR).next().unwrap_or_default()
    }

    /// Returns the result type encoded in the name.
    /// Constructors, static initializers and reflective proxies have no result type.
    #[must_use]
    pub fn result_type(&self) -> Option<TypeRef> {
        if self.is_constructor() || self.is_static_initializer() || self.is_reflective_proxy() {
            return None;
        }
        let (_, result) = self.0.rsplit_once(SEPARATOR)?;
        result.parse().ok()
    }

    /// Returns the parameter types and the result type encoded in the name.
    /// Constructors and the static initializer return `void`; reflective proxies return
    /// `java.lang.Object`.
    #[must_use]
    pub fn signature(&self) -> (Vec<TypeRef>, TypeRef) {
        let parse_all = |encoded: &str| {
            encoded
                .split(SEPARATOR)
                .filter(|it| !it.is_empty())
                .filter_map(|it| it.parse().ok())
                .collect_vec()
        };
        if self.is_static_initializer() {
            return (Vec::new(), TypeRef::Void);
        }
        if let Some(params) = self.0.strip_prefix(Self::CONSTRUCTOR_PREFIX) {
            return (parse_all(params), TypeRef::Void);
        }
        if self.is_reflective_proxy() {
            let params = self
                .0
                .split_once(SEPARATOR)
                .map_or_else(Vec::new, |(_, rest)| parse_all(rest));
            return (params, TypeRef::Class(ClassName::object()));
        }
        let mut types = self
            .0
            .split_once(SEPARATOR)
            .map_or_else(Vec::new, |(_, rest)| parse_all(rest));
        let result = types.pop().unwrap_or(TypeRef::Void);
        (types, result)
    }

    /// Returns the name of the reflective proxy that dispatches to this method.
    #[must_use]
    pub fn reflective_proxy_name(&self) -> Option<MethodName> {
        if self.is_constructor() || self.is_static_initializer() || self.is_reflective_proxy() {
            return None;
        }
        let pos = self.0.rfind(SEPARATOR)?;
        Some(Self::new(&self.0[..pos + SEPARATOR.len()]))
    }

    /// Checks if this method is a candidate target of the given reflective proxy.
    #[must_use]
    pub fn reflective_proxy_matches(&self, proxy: &MethodName) -> bool {
        self.reflective_proxy_name().as_ref() == Some(proxy)
    }
}

impl From<&str> for MethodName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A primitive type.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum PrimitiveType {
    /// The `boolean` type.
    Boolean,
    /// The `char` type.
    Char,
    /// The `byte` type.
    Byte,
    /// The `short` type.
    Short,
    /// The `int` type.
    Int,
    /// The `long` type.
    Long,
    /// The `float` type.
    Float,
    /// The `double` type.
    Double,
}

impl PrimitiveType {
    /// Returns the one-letter encoding of the type.
    #[must_use]
    pub const fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Char => 'C',
            Self::Byte => 'B',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }
}

impl TryFrom<char> for PrimitiveType {
    type Error = InvalidTypeRef;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'Z' => Ok(Self::Boolean),
            'C' => Ok(Self::Char),
            'B' => Ok(Self::Byte),
            'S' => Ok(Self::Short),
            'I' => Ok(Self::Int),
            'J' => Ok(Self::Long),
            'F' => Ok(Self::Float),
            'D' => Ok(Self::Double),
            _ => Err(InvalidTypeRef),
        }
    }
}

/// A reference to a type as it appears in a signature.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone)]
pub enum TypeRef {
    /// No value.
    Void,
    /// A primitive type.
    Primitive(PrimitiveType),
    /// A class or interface type.
    Class(ClassName),
    /// An array type.
    Array(Box<TypeRef>),
}

impl TypeRef {
    /// Returns the encoded form of the type.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            Self::Void => "V".to_owned(),
            Self::Primitive(p) => p.descriptor().to_string(),
            Self::Class(name) => name.as_str().to_owned(),
            Self::Array(elem) => format!("[{}", elem.descriptor()),
        }
    }

    /// Creates an array type of `self` with `dim` dimensions.
    #[must_use]
    pub fn array_of(self, dim: u8) -> Self {
        (0..dim).fold(self, |acc, _| Self::Array(Box::new(acc)))
    }

    /// Returns the innermost element type and the number of array dimensions.
    #[must_use]
    pub fn base_and_depth(&self) -> (&TypeRef, usize) {
        let mut current = self;
        let mut depth = 0;
        while let Self::Array(elem) = current {
            current = elem;
            depth += 1;
        }
        (current, depth)
    }

    /// Returns the class whose run-time type data this type needs, if any.
    #[must_use]
    pub fn base_class(&self) -> Option<&ClassName> {
        match self.base_and_depth().0 {
            Self::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Primitive(p) => write!(f, "{}", p.descriptor()),
            Self::Class(name) => name.fmt(f),
            Self::Array(elem) => write!(f, "{elem}[]"),
        }
    }
}

/// An error indicating that an encoded type is invalid.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("Invalid type reference")]
pub struct InvalidTypeRef;

impl FromStr for TypeRef {
    type Err = InvalidTypeRef;

    fn from_str(encoded: &str) -> Result<Self, Self::Err> {
        let mut chars = encoded.chars();
        match (chars.next(), chars.as_str()) {
            (None, _) => Err(InvalidTypeRef),
            (Some('V'), "") => Ok(Self::Void),
            (Some('['), elem) => match elem.parse()? {
                Self::Void => Err(InvalidTypeRef),
                elem => Ok(Self::Array(Box::new(elem))),
            },
            (Some(c), "") => Ok(PrimitiveType::try_from(c)
                .map_or_else(|_| Self::Class(ClassName::new(encoded)), Self::Primitive)),
            _ => Ok(Self::Class(ClassName::new(encoded))),
        }
    }
}

/// The namespace of a method. Methods with the same name in different namespaces are distinct.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, derive_more::Display)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
pub enum Namespace {
    /// Dynamically dispatched instance methods.
    #[display("public")]
    Public,
    /// Private instance methods, always statically bound.
    #[display("private")]
    Private,
    /// Public static methods.
    #[display("public static")]
    PublicStatic,
    /// Private static methods.
    #[display("private static")]
    PrivateStatic,
    /// Constructors.
    #[display("constructor")]
    Constructor,
    /// The static initializer.
    #[display("static constructor")]
    StaticConstructor,
}

impl Namespace {
    /// All namespaces, in ordinal order.
    pub const ALL: [Namespace; 6] = [
        Self::Public,
        Self::Private,
        Self::PublicStatic,
        Self::PrivateStatic,
        Self::Constructor,
        Self::StaticConstructor,
    ];

    /// The index of the namespace in [`Namespace::ALL`].
    #[must_use]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Checks if methods in this namespace have no receiver.
    #[must_use]
    pub const fn is_static(self) -> bool {
        matches!(
            self,
            Self::PublicStatic | Self::PrivateStatic | Self::StaticConstructor
        )
    }

    /// Checks if methods in this namespace are private.
    #[must_use]
    pub const fn is_private(self) -> bool {
        matches!(self, Self::Private | Self::PrivateStatic)
    }
}
