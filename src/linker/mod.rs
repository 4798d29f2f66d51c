//! The linker: analysis followed by the assembly of the reachable program.

use crate::{
    analysis::{self, Analysis, AnalyzerConfig, MethodRef, RequirementFactory, SymbolRequirement},
    ir::{
        AnyFieldDef, ClassKind, ClassName, ExportedMemberDef, JSConstructorDef, MethodDef,
        MethodName, TopLevelExportDef, Version,
    },
    loader::{self, CachingInfoLoader, ClassSource},
};

mod assembler;
pub mod synthesizer;

pub use synthesizer::MethodSynthesizer;

/// The configuration of the linker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkerConfig {
    /// The configuration of the analyzer.
    pub analyzer: AnalyzerConfig,
    /// The maximum number of errors logged when linking fails. [`None`] logs all of them.
    pub max_reported_errors: Option<usize>,
}

impl LinkerConfig {
    /// Sets the analyzer configuration.
    #[must_use]
    pub fn with_analyzer(self, analyzer: AnalyzerConfig) -> Self {
        Self { analyzer, ..self }
    }

    /// Sets the maximum number of errors logged when linking fails.
    #[must_use]
    pub fn with_max_reported_errors(self, max: usize) -> Self {
        Self {
            max_reported_errors: Some(max),
            ..self
        }
    }
}

/// A method to call on a module after static initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleInitializer {
    /// Calls a method without arguments.
    VoidMainMethod {
        /// The module class.
        module: ClassName,
        /// The method, returning `void`.
        method: MethodName,
    },
    /// Calls a method with an array of strings.
    MainMethodWithArgs {
        /// The module class.
        module: ClassName,
        /// The method, taking a `String[]` and returning `void`.
        method: MethodName,
        /// The arguments.
        args: Vec<String>,
    },
}

impl ModuleInitializer {
    /// The module class.
    #[must_use]
    pub fn module(&self) -> &ClassName {
        match self {
            Self::VoidMainMethod { module, .. } | Self::MainMethodWithArgs { module, .. } => module,
        }
    }

    /// The called method.
    #[must_use]
    pub fn method(&self) -> &MethodName {
        match self {
            Self::VoidMainMethod { method, .. } | Self::MainMethodWithArgs { method, .. } => method,
        }
    }
}

/// An error that aborts linking.
#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    /// The analysis found errors in the program.
    #[error("There were linking errors ({} in total)", .0.errors().len())]
    Analysis(Box<Analysis>),
    /// A reachable method has no body. The analysis should have reported it.
    #[error("Reachable method {0} has no body")]
    MissingMethodBody(MethodRef),
    /// A class could not be loaded.
    #[error("Failed to load a class: {0}")]
    Load(#[from] loader::Error),
}

/// A class of the linked program, stripped of what is not reachable.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedClass {
    /// The name of the class.
    pub name: ClassName,
    /// The kind of the class. Modules that are never accessed are emitted as plain classes.
    pub kind: ClassKind,
    /// The super class.
    pub super_class: Option<ClassName>,
    /// The implemented interfaces.
    pub interfaces: Vec<ClassName>,
    /// The kept fields.
    pub fields: Vec<AnyFieldDef>,
    /// The reachable methods, declared ones first, then the synthesized ones.
    pub methods: Vec<MethodDef>,
    /// The constructor of a JavaScript class, if instances are created.
    pub js_constructor: Option<JSConstructorDef>,
    /// The members exported on instances, if instances are created.
    pub exported_members: Vec<ExportedMemberDef>,
    /// The top-level exports.
    pub top_level_exports: Vec<TopLevelExportDef>,
    /// Whether instances of the class or of its subclasses are created.
    pub has_instances: bool,
    /// Whether values are tested against the class.
    pub has_instance_tests: bool,
    /// Whether the run-time type data of the class is needed.
    pub has_runtime_type_info: bool,
    /// The ancestors of the class.
    pub ancestors: Vec<ClassName>,
    /// The version of the class definition.
    pub version: Option<Version>,
}

/// The linked program.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkingUnit {
    /// The linked classes, in name order.
    pub classes: Vec<LinkedClass>,
    /// The module initializers, in the order they must run.
    pub module_initializers: Vec<ModuleInitializer>,
}

impl LinkingUnit {
    /// Gets a linked class.
    #[must_use]
    pub fn class(&self, name: &ClassName) -> Option<&LinkedClass> {
        self.classes.iter().find(|it| &it.name == name)
    }
}

/// Links programs.
#[derive(Debug, Clone, Default)]
pub struct Linker {
    config: LinkerConfig,
}

impl Linker {
    /// Creates a linker.
    #[must_use]
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    /// The configuration of the linker.
    #[must_use]
    pub fn config(&self) -> &LinkerConfig {
        &self.config
    }

    /// Links the program needed by `requirements` and `module_initializers`.
    ///
    /// # Errors
    /// - [`LinkError::Analysis`] if the program has errors. They are logged before returning.
    /// - See [`LinkError`] for other errors.
    pub async fn link<S: ClassSource>(
        &self,
        loader: &CachingInfoLoader<S>,
        requirements: SymbolRequirement,
        module_initializers: Vec<ModuleInitializer>,
    ) -> Result<LinkingUnit, LinkError> {
        let factory = RequirementFactory::new("module initializers");
        let initializer_requirements = module_initializers
            .iter()
            .map(|it| factory.call_on_module(it.module().clone(), it.method().clone()));
        let requirements =
            requirements + SymbolRequirement::multiple(initializer_requirements);

        let analysis = analysis::analyze(self.config.analyzer, requirements, loader).await?;
        if !analysis.is_successful() {
            analysis::report::log_errors(&analysis, self.config.max_reported_errors);
            return Err(LinkError::Analysis(Box::new(analysis)));
        }

        let classes = assembler::assemble(&analysis, loader).await?;
        tracing::debug!(classes = classes.len(), "linked");
        Ok(LinkingUnit {
            classes,
            module_initializers,
        })
    }
}
