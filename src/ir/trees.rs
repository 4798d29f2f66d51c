//! Full class definitions, including method bodies.

use bitflags::bitflags;

use super::{ClassKind, ClassName, FieldName, LocalName, MethodName, Namespace, TypeRef};

/// A class definition as produced by the front end.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// The encoded name of the class.
    pub name: ClassName,
    /// The kind of the class.
    pub kind: ClassKind,
    /// The super class. Only `java.lang.Object`, interfaces and abstract JS types have none.
    pub super_class: Option<ClassName>,
    /// The directly implemented interfaces, in declaration order.
    pub interfaces: Vec<ClassName>,
    /// The fields declared in the class.
    pub fields: Vec<AnyFieldDef>,
    /// The methods declared in the class.
    pub methods: Vec<MethodDef>,
    /// The constructor of a JS class.
    pub js_constructor: Option<JSConstructorDef>,
    /// Members exported to JavaScript on instances of the class.
    pub exported_members: Vec<ExportedMemberDef>,
    /// Definitions exported at the top level of the emitted module.
    pub top_level_exports: Vec<TopLevelExportDef>,
}

impl ClassDef {
    /// Creates a class without parents other than `super_class` and without members.
    pub fn new(name: impl Into<ClassName>, kind: ClassKind, super_class: Option<ClassName>) -> Self {
        Self {
            name: name.into(),
            kind,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            js_constructor: None,
            exported_members: Vec::new(),
            top_level_exports: Vec::new(),
        }
    }

    /// Adds implemented interfaces.
    #[must_use]
    pub fn with_interfaces<I, N>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<ClassName>,
    {
        self.interfaces.extend(interfaces.into_iter().map(Into::into));
        self
    }

    /// Adds a field.
    #[must_use]
    pub fn with_field(mut self, field: AnyFieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Sets the constructor of a JavaScript class.
    #[must_use]
    pub fn with_js_constructor(mut self, ctor: JSConstructorDef) -> Self {
        self.js_constructor = Some(ctor);
        self
    }

    /// Adds a member exported on instances.
    #[must_use]
    pub fn with_exported_member(mut self, member: ExportedMemberDef) -> Self {
        self.exported_members.push(member);
        self
    }

    /// Adds a top-level export.
    #[must_use]
    pub fn with_top_level_export(mut self, export: TopLevelExportDef) -> Self {
        self.top_level_exports.push(export);
        self
    }

    /// Gets a method of the class by its namespace and name.
    #[must_use]
    pub fn get_method(&self, namespace: Namespace, name: &MethodName) -> Option<&MethodDef> {
        self.methods
            .iter()
            .find(|m| m.namespace == namespace && &m.name == name)
    }

    /// Checks if the class declares a static initializer.
    #[must_use]
    pub fn has_static_initializer(&self) -> bool {
        self.methods.iter().any(|m| {
            m.namespace == Namespace::StaticConstructor && m.name.is_static_initializer()
        })
    }

    /// Checks if the class must be analyzed even when nothing refers to it.
    #[must_use]
    pub fn has_entry_points(&self) -> bool {
        self.has_static_initializer() || !self.top_level_exports.is_empty()
    }
}

bitflags! {
    /// The flags of a field.
    #[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// The field belongs to the class rather than to its instances.
        const STATIC = 0x01;
        /// The field can be assigned after construction.
        const MUTABLE = 0x02;
    }
}

/// A field definition.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyFieldDef {
    /// A field with an encoded name.
    /// Instance fields of JavaScript classes are private JavaScript fields.
    Field(FieldDef),
    /// A public JavaScript field with a computed name.
    JSField(JSFieldDef),
}

/// A field with an encoded name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// The flags of the field.
    pub flags: MemberFlags,
    /// The name of the field.
    pub name: FieldName,
    /// The type of the field.
    pub tpe: TypeRef,
}

impl FieldDef {
    /// Checks if the field is static.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }
}

/// A JavaScript field whose name is only known at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct JSFieldDef {
    /// The expression computing the name of the field.
    pub name: Tree,
    /// The type of the field.
    pub tpe: TypeRef,
}

/// A parameter of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    /// The name of the parameter.
    pub name: LocalName,
    /// The type of the parameter.
    pub ptpe: TypeRef,
}

/// A method definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// The namespace of the method.
    pub namespace: Namespace,
    /// The encoded name of the method.
    pub name: MethodName,
    /// The parameters.
    pub params: Vec<ParamDef>,
    /// The result type.
    pub result_type: TypeRef,
    /// The body of the method. [`None`] if the method is abstract.
    pub body: Option<Tree>,
    /// The version of the method, used by incremental back ends.
    pub version: Option<Version>,
}

impl MethodDef {
    /// Creates a method whose parameters and result type are derived from its encoded name.
    /// Parameters are named `x0`, `x1`, ...
    pub fn new(namespace: Namespace, name: impl Into<MethodName>, body: Option<Tree>) -> Self {
        let name = name.into();
        let (params, result_type) = name.signature();
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, ptpe)| ParamDef {
                name: LocalName::new(format!("x{i}")),
                ptpe,
            })
            .collect();
        Self {
            namespace,
            name,
            params,
            result_type,
            body,
            version: None,
        }
    }

    /// Checks if the method is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.body.is_none()
    }
}

/// The constructor of a JavaScript class.
#[derive(Debug, Clone, PartialEq)]
pub struct JSConstructorDef {
    /// The parameters.
    pub params: Vec<ParamDef>,
    /// The body, including the call to the super constructor.
    pub body: Tree,
}

/// A method or property exported to JavaScript on instances of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedMemberDef {
    /// The name under which the member is visible from JavaScript.
    pub name: String,
    /// Whether the member is a method or a property.
    pub kind: ExportedMemberKind,
    /// The parameters of a method, or the parameter of a property setter.
    pub params: Vec<ParamDef>,
    /// The body.
    pub body: Tree,
}

/// The kind of an [`ExportedMemberDef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportedMemberKind {
    /// A method.
    Method,
    /// A property.
    Property,
}

/// A definition exported at the top level of the emitted module.
#[derive(Debug, Clone, PartialEq)]
pub enum TopLevelExportDef {
    /// Exports the singleton instance of a module class.
    Module {
        /// The external name.
        export_name: String,
    },
    /// Exports the constructor of a JavaScript class.
    JSClass {
        /// The external name.
        export_name: String,
    },
    /// Exports a static function.
    Method {
        /// The external name.
        export_name: String,
        /// The parameters.
        params: Vec<ParamDef>,
        /// The body.
        body: Tree,
    },
    /// Exports a static field.
    Field {
        /// The external name.
        export_name: String,
        /// The exported static field of the class.
        field: FieldName,
    },
}

impl TopLevelExportDef {
    /// The external name of the export.
    #[must_use]
    pub fn export_name(&self) -> &str {
        match self {
            Self::Module { export_name }
            | Self::JSClass { export_name }
            | Self::Method { export_name, .. }
            | Self::Field { export_name, .. } => export_name,
        }
    }
}

/// An opaque token identifying the content of a definition.
/// Equal versions imply equal content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct Version(String);

impl Version {
    /// Creates a version from a token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// A boolean.
    Boolean(bool),
    /// An `int`.
    Int(i32),
    /// A `long`.
    Long(i64),
    /// A `double`.
    Double(f64),
    /// A string.
    String(String),
}

/// A node of a method body.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    /// Does nothing.
    Skip,
    /// A sequence of statements; the last one is the value of the block.
    Block(Vec<Tree>),
    /// Declares a local variable.
    VarDef {
        /// The name of the variable.
        name: LocalName,
        /// The initial value.
        rhs: Box<Tree>,
    },
    /// Reads a local variable or a parameter.
    VarRef(LocalName),
    /// The receiver of the enclosing method.
    This,
    /// A literal.
    Literal(Literal),
    /// The JavaScript `undefined` value.
    Undefined,
    /// A conditional.
    If {
        /// The condition.
        cond: Box<Tree>,
        /// The branch taken when the condition holds.
        thenp: Box<Tree>,
        /// The other branch.
        elsep: Box<Tree>,
    },
    /// Returns from the enclosing method.
    Return(Box<Tree>),
    /// Assigns a value to a variable or a field.
    Assign {
        /// The target.
        lhs: Box<Tree>,
        /// The value.
        rhs: Box<Tree>,
    },
    /// Creates an instance of a class.
    New {
        /// The instantiated class.
        class: ClassName,
        /// The constructor to invoke.
        ctor: MethodName,
        /// The arguments.
        args: Vec<Tree>,
    },
    /// Reads the instance of a module class.
    LoadModule(ClassName),
    /// Reads an instance field.
    Select {
        /// The class declaring the field.
        class: ClassName,
        /// The object whose field is read.
        qualifier: Box<Tree>,
        /// The field.
        field: FieldName,
    },
    /// Reads a static field.
    SelectStatic {
        /// The class declaring the field.
        class: ClassName,
        /// The field.
        field: FieldName,
    },
    /// Reads a private field of a JavaScript class.
    SelectPrivateJSField {
        /// The class declaring the field.
        class: ClassName,
        /// The object whose field is read.
        qualifier: Box<Tree>,
        /// The field.
        field: FieldName,
    },
    /// Calls an instance method with dynamic dispatch.
    Apply {
        /// The static type of the receiver.
        receiver_class: ClassName,
        /// The receiver.
        receiver: Box<Tree>,
        /// The method.
        method: MethodName,
        /// The arguments.
        args: Vec<Tree>,
    },
    /// Calls an instance method of a specific class, without dynamic dispatch.
    ApplyStatically {
        /// The class whose implementation is called.
        class: ClassName,
        /// Either [`Namespace::Public`] or [`Namespace::Private`].
        namespace: Namespace,
        /// The receiver.
        receiver: Box<Tree>,
        /// The method.
        method: MethodName,
        /// The arguments.
        args: Vec<Tree>,
    },
    /// Calls a static method.
    ApplyStatic {
        /// The class declaring the method.
        class: ClassName,
        /// Either [`Namespace::PublicStatic`] or [`Namespace::PrivateStatic`].
        namespace: Namespace,
        /// The method.
        method: MethodName,
        /// The arguments.
        args: Vec<Tree>,
    },
    /// Tests whether a value is an instance of a type.
    IsInstanceOf {
        /// The tested value.
        expr: Box<Tree>,
        /// The type tested against.
        test: TypeRef,
    },
    /// Casts a value to a type.
    AsInstanceOf {
        /// The value.
        expr: Box<Tree>,
        /// The target type.
        target: TypeRef,
    },
    /// Reads the run-time class of a type.
    ClassOf(TypeRef),
    /// Creates an array.
    NewArray {
        /// The type of the array.
        tpe: TypeRef,
        /// The length of each dimension.
        lengths: Vec<Tree>,
    },
    /// Reads the constructor of a JavaScript class.
    LoadJSConstructor(ClassName),
    /// Reads the instance of a JavaScript module class.
    LoadJSModule(ClassName),
}

impl Tree {
    /// Returns the direct children of the node, in evaluation order.
    #[must_use]
    pub fn children(&self) -> Vec<&Tree> {
        match self {
            Self::Skip
            | Self::VarRef(_)
            | Self::This
            | Self::Literal(_)
            | Self::Undefined
            | Self::LoadModule(_)
            | Self::SelectStatic { .. }
            | Self::ClassOf(_)
            | Self::LoadJSConstructor(_)
            | Self::LoadJSModule(_) => Vec::new(),
            Self::Block(stats) => stats.iter().collect(),
            Self::VarDef { rhs, .. } => vec![rhs.as_ref()],
            Self::If { cond, thenp, elsep } => {
                vec![cond.as_ref(), thenp.as_ref(), elsep.as_ref()]
            }
            Self::Return(expr)
            | Self::IsInstanceOf { expr, .. }
            | Self::AsInstanceOf { expr, .. } => vec![expr.as_ref()],
            Self::Assign { lhs, rhs } => vec![lhs.as_ref(), rhs.as_ref()],
            Self::New { args, .. } | Self::ApplyStatic { args, .. } => args.iter().collect(),
            Self::Select { qualifier, .. } | Self::SelectPrivateJSField { qualifier, .. } => {
                vec![qualifier.as_ref()]
            }
            Self::Apply { receiver, args, .. } | Self::ApplyStatically { receiver, args, .. } => {
                std::iter::once(receiver.as_ref()).chain(args).collect()
            }
            Self::NewArray { lengths, .. } => lengths.iter().collect(),
        }
    }

    /// Visits the tree in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Tree)) {
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            visit(tree);
            stack.extend(tree.children().into_iter().rev());
        }
    }
}
