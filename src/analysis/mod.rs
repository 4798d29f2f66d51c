//! The reachability analysis.
//!
//! Starting from a set of [`SymbolRequirement`]s and the entry points of the class universe,
//! the analyzer computes which classes and methods the linked program needs, and validates
//! the class hierarchy on the way.

use std::{collections::BTreeMap, sync::Arc};

use itertools::Itertools;

use crate::{
    ir::{ClassKind, ClassName, MethodName, Namespace},
    loader::{self, CachingInfoLoader, ClassSource},
};

mod dispatch;
mod engine;
pub mod errors;
mod hierarchy;
pub mod infos;
pub mod report;
pub mod requirements;

pub use errors::{Error, MethodRef, Origin};
pub use infos::ClassMetadata;
pub use requirements::{RequirementFactory, SymbolRequirement};

/// The configuration of the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Whether default method bridges and reflective proxies may be created.
    /// Disable it when the input was already linked.
    pub allow_adding_synthetic_methods: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            allow_adding_synthetic_methods: true,
        }
    }
}

impl AnalyzerConfig {
    /// Sets whether synthetic methods may be created.
    #[must_use]
    pub fn with_synthetic_methods(self, allow: bool) -> Self {
        Self {
            allow_adding_synthetic_methods: allow,
        }
    }
}

/// Analyzes the class universe behind `loader`.
///
/// # Errors
/// Returns [`loader::Error`] if the metadata of a class cannot be loaded.
/// Problems in the analyzed program are reported in [`Analysis::errors`] instead.
pub async fn analyze<S: ClassSource>(
    config: AnalyzerConfig,
    requirements: SymbolRequirement,
    loader: &CachingInfoLoader<S>,
) -> Result<Analysis, loader::Error> {
    engine::run(config, requirements, loader).await
}

/// The result of the reachability analysis.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    classes: BTreeMap<ClassName, ClassInfo>,
    errors: Vec<Error>,
}

impl Analysis {
    pub(crate) fn new(classes: BTreeMap<ClassName, ClassInfo>, errors: Vec<Error>) -> Self {
        Self {
            classes,
            errors: errors.into_iter().unique().collect(),
        }
    }

    /// Returns the analyzed classes, in name order.
    pub fn class_infos(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    /// Gets an analyzed class.
    #[must_use]
    pub fn class_info(&self, name: &ClassName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    /// Gets an analyzed method.
    #[must_use]
    pub fn method_info(&self, method: &MethodRef) -> Option<&MethodInfo> {
        self.class_info(&method.owner)?
            .method_info(method.namespace, &method.name)
    }

    /// Returns the errors found, without duplicates, in the order they were found.
    #[must_use]
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Checks if the analysis found no errors.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.errors.is_empty()
    }
}

/// What the analysis knows about a class.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    name: ClassName,
    kind: ClassKind,
    exists: bool,
    super_class: Option<ClassName>,
    interfaces: Vec<ClassName>,
    ancestors: Vec<ClassName>,
    metadata: Option<Arc<ClassMetadata>>,
    is_instantiated: bool,
    is_any_subclass_instantiated: bool,
    is_module_accessed: bool,
    are_instance_tests_used: bool,
    is_data_accessed: bool,
    is_any_static_field_used: bool,
    is_any_private_js_field_used: bool,
    instantiated_from: Vec<Origin>,
    instantiated_subclasses: Vec<ClassName>,
    methods: [BTreeMap<MethodName, MethodInfo>; Namespace::ALL.len()],
    dynamic_calls: Vec<(MethodName, Origin)>,
}

impl ClassInfo {
    fn new(name: ClassName, kind: ClassKind, metadata: Option<Arc<ClassMetadata>>) -> Self {
        let mut methods: [BTreeMap<MethodName, MethodInfo>; Namespace::ALL.len()] =
            std::array::from_fn(|_| BTreeMap::new());
        for method in metadata.iter().flat_map(|it| it.methods.iter()) {
            methods[method.namespace.ordinal()].insert(
                method.name.clone(),
                MethodInfo::new(
                    name.clone(),
                    method.namespace,
                    method.name.clone(),
                    method.is_abstract,
                ),
            );
        }
        Self {
            ancestors: vec![name.clone()],
            name,
            kind,
            exists: metadata.is_some(),
            super_class: None,
            interfaces: Vec::new(),
            metadata,
            is_instantiated: false,
            is_any_subclass_instantiated: false,
            is_module_accessed: false,
            are_instance_tests_used: false,
            is_data_accessed: false,
            is_any_static_field_used: false,
            is_any_private_js_field_used: false,
            instantiated_from: Vec::new(),
            instantiated_subclasses: Vec::new(),
            methods,
            dynamic_calls: Vec::new(),
        }
    }

    /// A placeholder for a class that does not exist.
    fn non_existent(name: ClassName) -> Self {
        Self::new(name, ClassKind::Class, None)
    }

    /// The name of the class.
    #[must_use]
    pub fn name(&self) -> &ClassName {
        &self.name
    }

    /// The kind of the class.
    #[must_use]
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Checks if the class exists in the class universe.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// The super class after validation.
    #[must_use]
    pub fn super_class(&self) -> Option<&ClassName> {
        self.super_class.as_ref()
    }

    /// The implemented interfaces after validation, in declaration order.
    #[must_use]
    pub fn interfaces(&self) -> &[ClassName] {
        &self.interfaces
    }

    /// The class itself, followed by the ancestors of its super class and then those of
    /// each interface, without duplicates.
    #[must_use]
    pub fn ancestors(&self) -> &[ClassName] {
        &self.ancestors
    }

    /// Checks if `other` is the class itself or one of its ancestors.
    #[must_use]
    pub fn is_subclass_of(&self, other: &ClassName) -> bool {
        self.ancestors.contains(other)
    }

    /// The metadata the class was analyzed with.
    #[must_use]
    pub fn metadata(&self) -> Option<&Arc<ClassMetadata>> {
        self.metadata.as_ref()
    }

    /// Checks if instances of the class itself are created.
    #[must_use]
    pub fn is_instantiated(&self) -> bool {
        self.is_instantiated
    }

    /// Checks if instances of the class or of any of its subclasses are created.
    #[must_use]
    pub fn is_any_subclass_instantiated(&self) -> bool {
        self.is_any_subclass_instantiated
    }

    /// Checks if the module instance is accessed.
    #[must_use]
    pub fn is_module_accessed(&self) -> bool {
        self.is_module_accessed
    }

    /// Checks if values are tested against the class.
    #[must_use]
    pub fn are_instance_tests_used(&self) -> bool {
        self.are_instance_tests_used
    }

    /// Checks if the run-time type data of the class is needed.
    #[must_use]
    pub fn is_data_accessed(&self) -> bool {
        self.is_data_accessed
    }

    /// Checks if any static field is used.
    #[must_use]
    pub fn is_any_static_field_used(&self) -> bool {
        self.is_any_static_field_used
    }

    /// Checks if any private JavaScript field is used.
    #[must_use]
    pub fn is_any_private_js_field_used(&self) -> bool {
        self.is_any_private_js_field_used
    }

    /// What caused the class to be instantiated.
    #[must_use]
    pub fn instantiated_from(&self) -> &[Origin] {
        &self.instantiated_from
    }

    /// The instantiated classes that have this class as an ancestor, in instantiation order.
    #[must_use]
    pub fn instantiated_subclasses(&self) -> &[ClassName] {
        &self.instantiated_subclasses
    }

    /// Returns the methods in a namespace, in name order.
    pub fn method_infos(&self, namespace: Namespace) -> impl Iterator<Item = &MethodInfo> {
        self.methods[namespace.ordinal()].values()
    }

    /// Gets a method.
    #[must_use]
    pub fn method_info(&self, namespace: Namespace, name: &MethodName) -> Option<&MethodInfo> {
        self.methods[namespace.ordinal()].get(name)
    }

    fn method_info_mut(&mut self, namespace: Namespace, name: &MethodName) -> Option<&mut MethodInfo> {
        self.methods[namespace.ordinal()].get_mut(name)
    }

    fn add_method(&mut self, method: MethodInfo) {
        self.methods[method.namespace.ordinal()].insert(method.name.clone(), method);
    }

    /// Returns the reachable methods of all namespaces.
    pub fn reachable_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods
            .iter()
            .flat_map(BTreeMap::values)
            .filter(|m| m.is_reachable)
    }

    /// Checks if the class is needed in the linked program.
    #[must_use]
    pub fn is_needed_at_all(&self) -> bool {
        self.are_instance_tests_used
            || self.is_data_accessed
            || self.is_any_subclass_instantiated
            || self.is_module_accessed
            || self.is_any_static_field_used
            || self.is_any_private_js_field_used
            || self.reachable_methods().next().is_some()
    }
}

/// Why a method was created by the analyzer.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum MethodSyntheticKind {
    /// Forwards to the default method of the given interface.
    DefaultBridge(ClassName),
    /// Calls the given method of the same class with dynamic dispatch.
    ReflectiveProxy(MethodName),
}

/// What the analysis knows about a method.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    owner: ClassName,
    namespace: Namespace,
    name: MethodName,
    is_abstract: bool,
    exists: bool,
    is_reachable: bool,
    called_from: Vec<Origin>,
    synthetic_kind: Option<MethodSyntheticKind>,
}

impl MethodInfo {
    fn new(owner: ClassName, namespace: Namespace, name: MethodName, is_abstract: bool) -> Self {
        Self {
            owner,
            namespace,
            name,
            is_abstract,
            exists: true,
            is_reachable: false,
            called_from: Vec::new(),
            synthetic_kind: None,
        }
    }

    /// A placeholder for a method that was called but does not exist.
    fn non_existent(owner: ClassName, namespace: Namespace, name: MethodName) -> Self {
        Self {
            exists: false,
            ..Self::new(owner, namespace, name, false)
        }
    }

    fn synthetic(
        owner: ClassName,
        name: MethodName,
        synthetic_kind: MethodSyntheticKind,
    ) -> Self {
        Self {
            synthetic_kind: Some(synthetic_kind),
            ..Self::new(owner, Namespace::Public, name, false)
        }
    }

    /// The class declaring the method.
    #[must_use]
    pub fn owner(&self) -> &ClassName {
        &self.owner
    }

    /// The namespace of the method.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The name of the method.
    #[must_use]
    pub fn name(&self) -> &MethodName {
        &self.name
    }

    /// A reference to the method.
    #[must_use]
    pub fn method_ref(&self) -> MethodRef {
        MethodRef::new(self.owner.clone(), self.namespace, self.name.clone())
    }

    /// Checks if the method has no body.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Checks if the method exists. Calls to missing methods create non-existent ones.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Checks if the method is reachable.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.is_reachable
    }

    /// What caused the method to be reachable, without duplicates.
    #[must_use]
    pub fn called_from(&self) -> &[Origin] {
        &self.called_from
    }

    /// Why the method was created by the analyzer, if it was.
    #[must_use]
    pub fn synthetic_kind(&self) -> Option<&MethodSyntheticKind> {
        self.synthetic_kind.as_ref()
    }
}
