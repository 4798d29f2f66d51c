//! The worklist fixpoint driving the analysis.
//!
//! Work addressed to a class that is not linked yet is parked on the class until it is.
//! Loading metadata is the only suspension point: the worklist is drained synchronously,
//! then every load scheduled during that round is awaited at once and the results are
//! applied in the order the loads were scheduled.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Arc,
};

use futures::future::join_all;

use super::{
    Analysis, AnalyzerConfig, ClassInfo, MethodSyntheticKind, SymbolRequirement,
    errors::{Error, MethodRef, Origin},
    infos::{ClassMetadata, ReachabilityInfo, UsageFlags},
};
use crate::{
    ir::{ClassKind, ClassName, MethodName, Namespace},
    loader::{self, CachingInfoLoader, ClassSource},
};

/// The state of a class during the analysis.
#[derive(Debug)]
pub(super) enum ClassSlot {
    /// The metadata is being loaded.
    Loading { deferred: Vec<Work> },
    /// The metadata is loaded but some parents are not linked yet.
    Loaded {
        metadata: Option<Arc<ClassMetadata>>,
        deferred: Vec<Work>,
    },
    /// The class and all its ancestors are linked.
    Linked(Box<ClassInfo>),
    /// The class is on an inheritance cycle or inherits from one.
    Failed,
}

/// Something to do with a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum ClassAction {
    Instantiate,
    AccessModule,
    InstanceTests,
    AccessData,
    UseStaticField,
    UsePrivateJsField,
    /// A call with dynamic dispatch on receivers of the class type.
    CallMethod(MethodName),
    /// A call on an instance of exactly the class.
    CallMethodResolved(MethodName),
    CallMethodStatically(Namespace, MethodName),
    EntryPoints,
}

/// An item of the worklist.
#[derive(Debug, Clone)]
pub(super) struct Work {
    pub(super) class: ClassName,
    pub(super) action: ClassAction,
    pub(super) origin: Origin,
    /// Missing classes are not errors for optional work.
    pub(super) optional: bool,
}

impl Work {
    fn new(class: ClassName, action: ClassAction, origin: Origin) -> Self {
        Self {
            class,
            action,
            origin,
            optional: false,
        }
    }
}

pub(super) struct Analyzer {
    pub(super) config: AnalyzerConfig,
    pub(super) classes: BTreeMap<ClassName, ClassSlot>,
    pub(super) work: VecDeque<Work>,
    /// Classes whose metadata must be loaded in the next round, in scheduling order.
    pub(super) pending_loads: Vec<ClassName>,
    /// Loaded classes waiting to be linked, in loading order.
    pub(super) link_queue: Vec<ClassName>,
    pub(super) errors: Vec<Error>,
}

pub(super) async fn run<S: ClassSource>(
    config: AnalyzerConfig,
    requirements: SymbolRequirement,
    loader: &CachingInfoLoader<S>,
) -> Result<Analysis, loader::Error> {
    let entry_points = loader.classes_with_entry_points();
    if requirements.is_empty() && entry_points.is_empty() {
        tracing::debug!("nothing to analyze");
        return Ok(Analysis::default());
    }

    let mut analyzer = Analyzer::new(config);
    let object = ClassName::object();
    match loader.load_info(&object).await? {
        None => {
            return Ok(Analysis::new(
                BTreeMap::new(),
                vec![Error::MissingJavaLangObjectClass],
            ));
        }
        Some(metadata) if !is_valid_root(&metadata) => {
            return Ok(Analysis::new(
                BTreeMap::new(),
                vec![Error::InvalidJavaLangObjectClass],
            ));
        }
        Some(metadata) => {
            analyzer.on_loaded(object, Some(metadata));
            analyzer.link_loaded_classes();
        }
    }

    analyzer.require(requirements);
    for class in entry_points {
        analyzer.enqueue(class, ClassAction::EntryPoints, Origin::Exports);
    }

    let mut round = 0_usize;
    loop {
        analyzer.process_work();
        if analyzer.pending_loads.is_empty() {
            break;
        }
        round += 1;
        let names = std::mem::take(&mut analyzer.pending_loads);
        tracing::debug!(round, classes = names.len(), "loading class infos");
        let loaded = join_all(names.iter().map(|name| loader.load_info(name))).await;
        for (name, metadata) in names.into_iter().zip(loaded) {
            analyzer.on_loaded(name, metadata?);
        }
        analyzer.link_loaded_classes();
    }

    analyzer.check_top_level_exports();
    let analysis = analyzer.finish();
    tracing::debug!(
        rounds = round,
        classes = analysis.classes.len(),
        errors = analysis.errors().len(),
        "analysis finished"
    );
    Ok(analysis)
}

fn is_valid_root(metadata: &ClassMetadata) -> bool {
    metadata.kind == ClassKind::Class
        && metadata.super_class.is_none()
        && metadata.interfaces.is_empty()
}

impl Analyzer {
    fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            classes: BTreeMap::new(),
            work: VecDeque::new(),
            pending_loads: Vec::new(),
            link_queue: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn finish(self) -> Analysis {
        let classes = self
            .classes
            .into_iter()
            .filter_map(|(name, slot)| match slot {
                ClassSlot::Linked(info) => Some((name, *info)),
                _ => None,
            })
            .collect();
        Analysis::new(classes, self.errors)
    }

    pub(super) fn linked(&self, name: &ClassName) -> Option<&ClassInfo> {
        match self.classes.get(name) {
            Some(ClassSlot::Linked(info)) => Some(info),
            _ => None,
        }
    }

    pub(super) fn linked_mut(&mut self, name: &ClassName) -> Option<&mut ClassInfo> {
        match self.classes.get_mut(name) {
            Some(ClassSlot::Linked(info)) => Some(info),
            _ => None,
        }
    }

    pub(super) fn enqueue(&mut self, class: ClassName, action: ClassAction, origin: Origin) {
        self.work.push_back(Work::new(class, action, origin));
    }

    /// Schedules loading the metadata of a class nothing was sent to yet.
    pub(super) fn request_load(&mut self, name: ClassName) {
        if !self.classes.contains_key(&name) {
            self.classes.insert(
                name.clone(),
                ClassSlot::Loading {
                    deferred: Vec::new(),
                },
            );
            self.pending_loads.push(name);
        }
    }

    fn on_loaded(&mut self, name: ClassName, metadata: Option<Arc<ClassMetadata>>) {
        let deferred = match self.classes.remove(&name) {
            Some(ClassSlot::Loading { deferred }) => deferred,
            _ => Vec::new(),
        };
        tracing::trace!(class = %name, exists = metadata.is_some(), "class info loaded");
        self.classes
            .insert(name.clone(), ClassSlot::Loaded { metadata, deferred });
        self.link_queue.push(name);
    }

    fn require(&mut self, requirements: SymbolRequirement) {
        let mut stack = vec![(requirements, false)];
        while let Some((requirement, optional)) = stack.pop() {
            let (class, actions, origin) = match requirement {
                SymbolRequirement::AccessModule { origin, module } => {
                    (module, vec![ClassAction::AccessModule], origin)
                }
                SymbolRequirement::InstantiateClass {
                    origin,
                    class,
                    ctor,
                } => (
                    class,
                    vec![
                        ClassAction::Instantiate,
                        ClassAction::CallMethodStatically(Namespace::Constructor, ctor),
                    ],
                    origin,
                ),
                SymbolRequirement::InstanceTests { origin, class } => {
                    (class, vec![ClassAction::InstanceTests], origin)
                }
                SymbolRequirement::ClassData { origin, class } => {
                    (class, vec![ClassAction::AccessData], origin)
                }
                SymbolRequirement::AccessStaticField { origin, class, .. } => {
                    (class, vec![ClassAction::UseStaticField], origin)
                }
                SymbolRequirement::CallMethod {
                    origin,
                    class,
                    method,
                    statically,
                } => {
                    let action = if statically {
                        ClassAction::CallMethodStatically(Namespace::Public, method)
                    } else {
                        ClassAction::CallMethod(method)
                    };
                    (class, vec![action], origin)
                }
                SymbolRequirement::CallStaticMethod {
                    origin,
                    class,
                    method,
                } => (
                    class,
                    vec![ClassAction::CallMethodStatically(
                        Namespace::PublicStatic,
                        method,
                    )],
                    origin,
                ),
                SymbolRequirement::Optional(inner) => {
                    stack.push((*inner, true));
                    continue;
                }
                SymbolRequirement::Multiple(all) => {
                    stack.extend(all.into_iter().rev().map(|it| (it, optional)));
                    continue;
                }
                SymbolRequirement::NoRequirement => continue,
            };
            for action in actions {
                self.work.push_back(Work {
                    class: class.clone(),
                    action,
                    origin: Origin::Core(origin.clone()),
                    optional,
                });
            }
        }
    }

    /// Drains the worklist.
    fn process_work(&mut self) {
        while let Some(work) = self.work.pop_front() {
            match self.classes.get_mut(&work.class) {
                None => {
                    let name = work.class.clone();
                    self.classes.insert(
                        name.clone(),
                        ClassSlot::Loading {
                            deferred: vec![work],
                        },
                    );
                    self.pending_loads.push(name);
                }
                Some(ClassSlot::Loading { deferred } | ClassSlot::Loaded { deferred, .. }) => {
                    deferred.push(work);
                }
                Some(ClassSlot::Failed) => {
                    tracing::trace!(class = %work.class, action = ?work.action, "dropping work on failed class");
                }
                Some(ClassSlot::Linked(_)) => self.apply(work),
            }
        }
    }

    fn apply(&mut self, work: Work) {
        let Work {
            class,
            action,
            origin,
            optional,
        } = work;
        let Some(info) = self.linked_mut(&class) else {
            return;
        };
        if !info.exists {
            if !optional {
                self.errors.push(Error::MissingClass { class, origin });
            }
            return;
        }
        match action {
            ClassAction::Instantiate => self.instantiate(&class, origin),
            ClassAction::AccessModule => self.access_module(&class, origin),
            ClassAction::InstanceTests => info.are_instance_tests_used = true,
            ClassAction::AccessData => info.is_data_accessed = true,
            ClassAction::UseStaticField => info.is_any_static_field_used = true,
            ClassAction::UsePrivateJsField => info.is_any_private_js_field_used = true,
            ClassAction::CallMethod(method) => self.call_method(&class, method, origin),
            ClassAction::CallMethodResolved(method) => {
                self.call_method_resolved(&class, method, origin);
            }
            ClassAction::CallMethodStatically(namespace, method) => {
                self.call_method_statically(&class, namespace, method, origin);
            }
            ClassAction::EntryPoints => self.enter(&class),
        }
    }

    /// Queues everything a piece of code refers to.
    pub(super) fn follow(&mut self, info: &ReachabilityInfo, origin: &Origin) {
        const FLAG_ACTIONS: [(UsageFlags, ClassAction); 6] = [
            (UsageFlags::INSTANTIATED, ClassAction::Instantiate),
            (UsageFlags::MODULE_ACCESSED, ClassAction::AccessModule),
            (UsageFlags::INSTANCE_TESTS, ClassAction::InstanceTests),
            (UsageFlags::DATA_ACCESSED, ClassAction::AccessData),
            (UsageFlags::STATIC_FIELD_USED, ClassAction::UseStaticField),
            (
                UsageFlags::PRIVATE_JS_FIELD_USED,
                ClassAction::UsePrivateJsField,
            ),
        ];
        for (class, usage) in &info.by_class {
            for (flag, action) in &FLAG_ACTIONS {
                if usage.flags.contains(*flag) {
                    self.enqueue(class.clone(), action.clone(), origin.clone());
                }
            }
            for method in &usage.methods_called {
                self.enqueue(
                    class.clone(),
                    ClassAction::CallMethod(method.clone()),
                    origin.clone(),
                );
            }
            for (namespace, method) in &usage.methods_called_statically {
                self.enqueue(
                    class.clone(),
                    ClassAction::CallMethodStatically(*namespace, method.clone()),
                    origin.clone(),
                );
            }
        }
    }

    fn instantiate(&mut self, class: &ClassName, origin: Origin) {
        let Some(info) = self.linked_mut(class) else {
            return;
        };
        if !info.instantiated_from.contains(&origin) {
            info.instantiated_from.push(origin);
        }
        let kind = info.kind;
        if info.is_instantiated
            || !(kind.is_class() || kind.is_js_class() || kind.is_native_js_class())
        {
            return;
        }
        info.is_instantiated = true;
        tracing::trace!(%class, "instantiated");

        if kind.is_class() {
            let ancestors = info.ancestors.clone();
            for ancestor in &ancestors {
                self.subclass_instantiated(ancestor);
                if let Some(ancestor) = self.linked_mut(ancestor) {
                    ancestor.instantiated_subclasses.push(class.clone());
                }
            }
            let calls: Vec<_> = ancestors
                .iter()
                .filter_map(|ancestor| self.linked(ancestor))
                .flat_map(|ancestor| ancestor.dynamic_calls.iter().cloned())
                .collect();
            for (method, origin) in calls {
                self.call_method_resolved(class, method, origin);
            }
        } else if kind.is_js_class() {
            if let Some(super_class) = info.super_class.clone() {
                self.enqueue(
                    super_class,
                    ClassAction::Instantiate,
                    Origin::Class(class.clone()),
                );
            }
            self.subclass_instantiated(class);
            self.follow_exported_members(class);
        } else {
            self.subclass_instantiated(class);
        }
    }

    fn subclass_instantiated(&mut self, class: &ClassName) {
        let Some(info) = self.linked_mut(class) else {
            return;
        };
        let kind = info.kind;
        if info.is_any_subclass_instantiated {
            return;
        }
        info.is_any_subclass_instantiated = true;
        let Some(metadata) = info.metadata.clone() else {
            return;
        };
        if !kind.is_js_class() {
            self.follow_exported_members(class);
        }
        for field_class in &metadata.referenced_field_classes {
            self.enqueue(
                field_class.clone(),
                ClassAction::AccessData,
                Origin::Class(class.clone()),
            );
        }
    }

    fn follow_exported_members(&mut self, class: &ClassName) {
        let Some(metadata) = self.linked(class).and_then(|it| it.metadata.clone()) else {
            return;
        };
        for member in &metadata.exported_members {
            self.follow(member, &Origin::Exports);
        }
    }

    fn access_module(&mut self, class: &ClassName, origin: Origin) {
        let Some(info) = self.linked_mut(class) else {
            return;
        };
        let kind = info.kind;
        if !kind.is_module() {
            self.errors.push(Error::NotAModule {
                class: class.clone(),
                origin,
            });
            return;
        }
        if info.is_module_accessed {
            return;
        }
        info.is_module_accessed = true;
        self.instantiate(class, origin.clone());
        if kind.is_class() {
            self.enqueue(
                class.clone(),
                ClassAction::CallMethodStatically(
                    Namespace::Constructor,
                    MethodName::no_arg_constructor(),
                ),
                origin,
            );
        }
    }

    /// Records a call with dynamic dispatch on receivers of type `class`. Classes
    /// instantiated later replay the call once per origin.
    ///
    /// A method already called from another origin was resolved in every instantiated
    /// subclass, so only the new origin is recorded on those targets.
    fn call_method(&mut self, class: &ClassName, method: MethodName, origin: Origin) {
        let Some(info) = self.linked_mut(class) else {
            return;
        };
        if info.kind.is_js_type()
            || info
                .dynamic_calls
                .iter()
                .any(|(m, o)| m == &method && o == &origin)
        {
            return;
        }
        let resolved = info.dynamic_calls.iter().any(|(m, _)| m == &method);
        info.dynamic_calls.push((method.clone(), origin.clone()));
        let subclasses = info.instantiated_subclasses.clone();
        for subclass in &subclasses {
            if resolved {
                self.record_resolved_call(subclass, &method, &origin);
            } else {
                self.call_method_resolved(subclass, method.clone(), origin.clone());
            }
        }
    }

    fn call_method_statically(
        &mut self,
        class: &ClassName,
        namespace: Namespace,
        method: MethodName,
        origin: Origin,
    ) {
        if namespace == Namespace::Public {
            let target = self.lookup_method(class, &method, &origin);
            self.reach(&target, origin);
            return;
        }
        let Some(info) = self.linked(class) else {
            return;
        };
        let target = if info.method_info(namespace, &method).is_some() {
            MethodRef::new(class.clone(), namespace, method)
        } else {
            self.missing_method(class, namespace, method, &origin)
        };
        self.reach(&target, origin);
    }

    /// Marks a method reachable and queues what it refers to.
    pub(super) fn reach(&mut self, target: &MethodRef, origin: Origin) {
        let Some(info) = self.linked_mut(&target.owner) else {
            return;
        };
        let metadata = info.metadata.clone();
        let Some(method) = info.method_info_mut(target.namespace, &target.name) else {
            return;
        };
        if !method.called_from.contains(&origin) {
            method.called_from.push(origin);
        }
        if method.is_reachable {
            return;
        }
        method.is_reachable = true;
        let exists = method.exists;
        let synthetic_kind = method.synthetic_kind.clone();
        tracing::trace!(method = %target, "reachable");

        let from_method = Origin::Method(target.clone());
        match synthetic_kind {
            Some(MethodSyntheticKind::DefaultBridge(interface)) => self.enqueue(
                interface,
                ClassAction::CallMethodStatically(Namespace::Public, target.name.clone()),
                from_method,
            ),
            Some(MethodSyntheticKind::ReflectiveProxy(resolved)) => self.enqueue(
                target.owner.clone(),
                ClassAction::CallMethodResolved(resolved),
                from_method,
            ),
            None if exists => {
                if let Some(declared) = metadata
                    .as_ref()
                    .and_then(|it| it.method(target.namespace, &target.name))
                {
                    self.follow(&declared.reachability, &from_method);
                }
            }
            None => {}
        }
    }

    fn enter(&mut self, class: &ClassName) {
        let Some(metadata) = self.linked(class).and_then(|it| it.metadata.clone()) else {
            return;
        };
        if metadata.has_static_initializer() {
            self.enqueue(
                class.clone(),
                ClassAction::CallMethodStatically(
                    Namespace::StaticConstructor,
                    MethodName::static_initializer(),
                ),
                Origin::Core("static initializers".to_owned()),
            );
        }
        for export in &metadata.top_level_exports {
            self.follow(&export.reachability, &Origin::Exports);
        }
    }
}
