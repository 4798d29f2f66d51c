use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use irlinker::{
    analysis::{
        Analysis, AnalyzerConfig, ClassMetadata, Error, MethodRef, MethodSyntheticKind, Origin,
        RequirementFactory, SymbolRequirement, analyze,
    },
    ir::{
        ClassDef, ClassKind, ClassName, FieldName, MethodDef, MethodName, Namespace,
        TopLevelExportDef, Tree, TypeRef, Version,
    },
    loader::{self, CachingInfoLoader, ClassSource, class_sources::MemoryClassSource},
};
use proptest::prelude::*;
use rand::Rng;

fn factory() -> RequirementFactory {
    RequirementFactory::new("tests")
}

fn ctor() -> MethodDef {
    MethodDef::new(
        Namespace::Constructor,
        MethodName::no_arg_constructor(),
        Some(Tree::Skip),
    )
}

fn object_class() -> ClassDef {
    ClassDef::new(ClassName::object(), ClassKind::Class, None).with_method(ctor())
}

fn class(name: &str, super_class: &str) -> ClassDef {
    ClassDef::new(name, ClassKind::Class, Some(ClassName::new(super_class))).with_method(ctor())
}

fn interface(name: &str) -> ClassDef {
    ClassDef::new(name, ClassKind::Interface, None)
}

fn public(name: &str, body: Option<Tree>) -> MethodDef {
    MethodDef::new(Namespace::Public, name, body)
}

fn instantiate(name: &str) -> SymbolRequirement {
    factory().instantiate_class(ClassName::new(name), MethodName::no_arg_constructor())
}

fn call(class: &str, method: &str) -> SymbolRequirement {
    factory().call_method(ClassName::new(class), MethodName::new(method))
}

async fn run(classes: Vec<ClassDef>, requirements: SymbolRequirement) -> Analysis {
    let loader = CachingInfoLoader::new(MemoryClassSource::new(classes));
    analyze(AnalyzerConfig::default(), requirements, &loader)
        .await
        .unwrap()
}

fn core_origin() -> Origin {
    Origin::Core("tests".to_owned())
}

#[tokio::test]
async fn missing_object_class_is_the_only_error() {
    let analysis = run(
        vec![class("A", "O"), class("B", "Missing")],
        instantiate("A") + instantiate("B") + factory().access_module(ClassName::new("A")),
    )
    .await;
    assert_eq!(analysis.errors(), &[Error::MissingJavaLangObjectClass]);
}

#[tokio::test]
async fn invalid_object_class() {
    let object = object_class().with_interfaces(["I"]);
    let analysis = run(vec![object, interface("I")], instantiate("O")).await;
    assert_eq!(analysis.errors(), &[Error::InvalidJavaLangObjectClass]);
}

#[tokio::test]
async fn two_class_cycle() {
    let analysis = run(
        vec![object_class(), class("A", "B"), class("B", "A")],
        instantiate("A"),
    )
    .await;
    let cycles = analysis
        .errors()
        .iter()
        .filter_map(|it| match it {
            Error::CycleInInheritanceChain { classes, .. } => Some(classes.clone()),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(cycles, vec![vec![ClassName::new("A"), ClassName::new("B")]]);
    assert_eq!(analysis.errors().len(), 1);
}

#[tokio::test]
async fn cycle_excludes_acyclic_prefix() {
    let analysis = run(
        vec![
            object_class(),
            class("A", "B"),
            class("B", "C"),
            class("C", "D"),
            class("D", "E"),
            class("E", "C"),
        ],
        instantiate("A"),
    )
    .await;
    assert_eq!(analysis.errors().len(), 1);
    assert!(matches!(
        &analysis.errors()[0],
        Error::CycleInInheritanceChain { classes, .. }
            if classes == &[ClassName::new("C"), ClassName::new("D"), ClassName::new("E")]
    ));
    for name in ["A", "B", "C", "D", "E"] {
        assert!(analysis.class_info(&ClassName::new(name)).is_none());
    }
}

#[tokio::test]
async fn missing_class_is_attributed_to_requester() {
    let body = Tree::New {
        class: ClassName::new("Missing"),
        ctor: MethodName::no_arg_constructor(),
        args: Vec::new(),
    };
    let main = MethodDef::new(Namespace::PublicStatic, "main__V", Some(body));
    let analysis = run(
        vec![object_class(), class("A", "O").with_method(main)],
        factory().call_static_method(ClassName::new("A"), MethodName::new("main__V")),
    )
    .await;
    assert_eq!(
        analysis.errors(),
        &[Error::MissingClass {
            class: ClassName::new("Missing"),
            origin: Origin::Method(MethodRef::new(
                ClassName::new("A"),
                Namespace::PublicStatic,
                MethodName::new("main__V"),
            )),
        }]
    );
}

#[tokio::test]
async fn optional_requirements_tolerate_missing_classes() {
    let analysis = run(
        vec![object_class()],
        factory().optional(instantiate("Missing")) + instantiate("O"),
    )
    .await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
}

#[tokio::test]
async fn module_access_on_plain_class() {
    let analysis = run(
        vec![object_class(), class("A", "O")],
        factory().access_module(ClassName::new("A")),
    )
    .await;
    assert_eq!(
        analysis.errors(),
        &[Error::NotAModule {
            class: ClassName::new("A"),
            origin: core_origin(),
        }]
    );
}

#[tokio::test]
async fn module_access_reaches_constructor() {
    let module = ClassDef::new("M", ClassKind::ModuleClass, Some(ClassName::object()))
        .with_method(ctor());
    let analysis = run(
        vec![object_class(), module],
        factory().access_module(ClassName::new("M")),
    )
    .await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
    let m = analysis.class_info(&ClassName::new("M")).unwrap();
    assert!(m.is_module_accessed());
    assert!(m.is_instantiated());
    assert!(
        m.method_info(Namespace::Constructor, &MethodName::no_arg_constructor())
            .unwrap()
            .is_reachable()
    );
}

#[tokio::test]
async fn missing_method_names_owner_and_method() {
    let analysis = run(
        vec![object_class(), class("A", "O")],
        instantiate("A") + call("A", "foo__V"),
    )
    .await;
    assert_eq!(
        analysis.errors(),
        &[Error::MissingMethod {
            method: MethodRef::new(
                ClassName::new("A"),
                Namespace::Public,
                MethodName::new("foo__V"),
            ),
            origin: core_origin(),
        }]
    );
}

#[tokio::test]
async fn sibling_defaults_conflict() {
    let i = interface("I").with_method(public("foo__V", Some(Tree::Skip)));
    let j = interface("J").with_method(public("foo__V", Some(Tree::Skip)));
    let a = class("A", "O").with_interfaces(["I", "J"]);
    let analysis = run(
        vec![object_class(), a, i, j],
        instantiate("A") + call("A", "foo__V"),
    )
    .await;
    let [Error::ConflictingDefaultMethods { methods, .. }] = analysis.errors() else {
        panic!("unexpected errors: {:?}", analysis.errors());
    };
    let mut owners = methods
        .iter()
        .map(|it| it.owner.as_str())
        .collect::<Vec<_>>();
    owners.sort_unstable();
    assert_eq!(owners, vec!["I", "J"]);
}

#[tokio::test]
async fn conflicting_defaults_are_reported_in_ancestor_order() {
    let defaults = ["I", "J", "K"]
        .map(|name| interface(name).with_method(public("foo__V", Some(Tree::Skip))));
    let a = class("A", "O").with_interfaces(["K", "I", "J"]);
    let mut classes = vec![object_class(), a];
    classes.extend(defaults);
    let analysis = run(classes, instantiate("A") + call("A", "foo__V")).await;
    let owners = ["K", "I", "J"].map(|owner| {
        MethodRef::new(
            ClassName::new(owner),
            Namespace::Public,
            MethodName::new("foo__V"),
        )
    });
    assert_eq!(
        analysis.errors(),
        &[Error::ConflictingDefaultMethods {
            methods: owners.to_vec(),
            origin: core_origin(),
        }]
    );
    let bridge = analysis.method_info(&MethodRef::new(
        ClassName::new("A"),
        Namespace::Public,
        MethodName::new("foo__V"),
    ));
    assert_eq!(
        bridge.and_then(|it| it.synthetic_kind()),
        Some(&MethodSyntheticKind::DefaultBridge(ClassName::new("K")))
    );
}

#[tokio::test]
async fn every_caller_is_recorded() {
    let x = RequirementFactory::new("x");
    let y = RequirementFactory::new("y");
    let foo = || MethodName::new("foo__V");
    let b = class("B", "O").with_method(public("foo__V", Some(Tree::Skip)));
    let a = class("A", "B").with_method(public("bar__V", Some(Tree::Skip)));
    let requirements = x.instantiate_class(ClassName::new("B"), MethodName::no_arg_constructor())
        + x.call_method(ClassName::new("B"), foo())
        + y.call_method(ClassName::new("B"), foo())
        + y.call_method(ClassName::new("A"), MethodName::new("bar__V"))
        + x.call_method(ClassName::new("A"), MethodName::new("bar__V"))
        + y.instantiate_class(ClassName::new("A"), MethodName::no_arg_constructor());
    let analysis = run(vec![object_class(), a, b], requirements).await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());

    let called_from = |owner: &str, method: &str| {
        analysis
            .method_info(&MethodRef::new(
                ClassName::new(owner),
                Namespace::Public,
                MethodName::new(method),
            ))
            .unwrap()
            .called_from()
            .to_vec()
    };
    let origins = vec![Origin::Core("x".to_owned()), Origin::Core("y".to_owned())];
    assert_eq!(called_from("B", "foo__V"), origins);
    assert_eq!(called_from("A", "bar__V"), origins.into_iter().rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn static_field_requirements() {
    let requirements = factory().access_static_field(ClassName::new("A"), FieldName::new("s"))
        + factory().optional(
            factory().access_static_field(ClassName::new("Gone"), FieldName::new("s")),
        );
    let analysis = run(vec![object_class(), class("A", "O")], requirements).await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
    let a = analysis.class_info(&ClassName::new("A")).unwrap();
    assert!(a.is_any_static_field_used());
    assert!(a.is_needed_at_all());
    assert!(!a.is_instantiated());
}

#[tokio::test]
async fn top_level_export_conflicts() {
    let export = |name: &str| TopLevelExportDef::Module {
        export_name: name.to_owned(),
    };
    let module = |name: &str| {
        ClassDef::new(name, ClassKind::ModuleClass, Some(ClassName::object())).with_method(ctor())
    };
    let a = module("A").with_top_level_export(export("foo"));
    let b = module("B").with_top_level_export(export("foo"));
    let c = module("C")
        .with_top_level_export(export("bar"))
        .with_top_level_export(export("bar"));
    let analysis = run(vec![object_class(), a, b, c], SymbolRequirement::none()).await;
    assert_eq!(
        analysis.errors(),
        &[
            Error::ConflictingTopLevelExport {
                name: "bar".to_owned(),
                owners: vec![ClassName::new("C"), ClassName::new("C")],
            },
            Error::ConflictingTopLevelExport {
                name: "foo".to_owned(),
                owners: vec![ClassName::new("A"), ClassName::new("B")],
            },
        ]
    );
    assert!(
        analysis
            .class_info(&ClassName::new("A"))
            .unwrap()
            .is_module_accessed()
    );
}

#[tokio::test]
async fn reflective_proxy_picks_most_specific_overload() {
    let b = class("B", "O")
        .with_method(public("foo__R1", Some(Tree::Literal(irlinker::ir::Literal::Null))))
        .with_method(public("foo__R2", Some(Tree::Literal(irlinker::ir::Literal::Null))));
    let analysis = run(
        vec![object_class(), class("A", "B"), b, class("R1", "O"), class("R2", "R1")],
        instantiate("A") + factory().class_data(ClassName::new("R2")) + call("A", "foo__"),
    )
    .await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
    let proxy = analysis
        .method_info(&MethodRef::new(
            ClassName::new("A"),
            Namespace::Public,
            MethodName::new("foo__"),
        ))
        .unwrap();
    assert_eq!(
        proxy.synthetic_kind(),
        Some(&MethodSyntheticKind::ReflectiveProxy(MethodName::new("foo__R2")))
    );
    let target = analysis
        .method_info(&MethodRef::new(
            ClassName::new("B"),
            Namespace::Public,
            MethodName::new("foo__R2"),
        ))
        .unwrap();
    assert!(target.is_reachable());
    let other = analysis
        .method_info(&MethodRef::new(
            ClassName::new("B"),
            Namespace::Public,
            MethodName::new("foo__R1"),
        ))
        .unwrap();
    assert!(!other.is_reachable());
}

#[tokio::test]
async fn arrays_are_more_specific_than_object() {
    let a = class("A", "O")
        .with_method(public("foo__O", Some(Tree::Literal(irlinker::ir::Literal::Null))))
        .with_method(public("foo__[I", Some(Tree::Literal(irlinker::ir::Literal::Null))));
    let analysis = run(
        vec![object_class(), a],
        instantiate("A") + call("A", "foo__"),
    )
    .await;
    let proxy = analysis
        .method_info(&MethodRef::new(
            ClassName::new("A"),
            Namespace::Public,
            MethodName::new("foo__"),
        ))
        .unwrap();
    assert_eq!(
        proxy.synthetic_kind(),
        Some(&MethodSyntheticKind::ReflectiveProxy(MethodName::new("foo__[I")))
    );
}

#[tokio::test]
async fn interface_calls_reach_overrides_only() {
    let i = interface("I").with_method(public("foo__V", None));
    let a = class("A", "O")
        .with_interfaces(["I"])
        .with_method(public("foo__V", Some(Tree::Skip)));
    let analysis = run(
        vec![object_class(), a, i],
        call("I", "foo__V") + instantiate("A"),
    )
    .await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
    let reachable = |owner: &str| {
        analysis
            .method_info(&MethodRef::new(
                ClassName::new(owner),
                Namespace::Public,
                MethodName::new("foo__V"),
            ))
            .unwrap()
            .is_reachable()
    };
    assert!(reachable("A"));
    assert!(!reachable("I"));
    let i = analysis.class_info(&ClassName::new("I")).unwrap();
    assert_eq!(i.instantiated_subclasses(), &[ClassName::new("A")]);
}

#[tokio::test]
async fn static_initializers_are_entry_points() {
    let clinit = MethodDef::new(
        Namespace::StaticConstructor,
        MethodName::static_initializer(),
        Some(Tree::LoadModule(ClassName::new("M"))),
    );
    let module = ClassDef::new("M", ClassKind::ModuleClass, Some(ClassName::object()))
        .with_method(ctor());
    let analysis = run(
        vec![object_class(), class("A", "O").with_method(clinit), module],
        SymbolRequirement::none(),
    )
    .await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
    assert!(
        analysis
            .class_info(&ClassName::new("M"))
            .unwrap()
            .is_module_accessed()
    );
    assert!(
        !analysis
            .class_info(&ClassName::new("A"))
            .unwrap()
            .is_instantiated()
    );
}

#[tokio::test]
async fn instance_fields_need_data_of_their_classes() {
    let a = class("A", "O").with_field(irlinker::ir::AnyFieldDef::Field(irlinker::ir::FieldDef {
        flags: irlinker::ir::MemberFlags::MUTABLE,
        name: "b".into(),
        tpe: TypeRef::Class(ClassName::new("B")),
    }));
    let analysis = run(vec![object_class(), a, class("B", "O")], instantiate("A")).await;
    assert!(analysis.is_successful(), "{:?}", analysis.errors());
    let b = analysis.class_info(&ClassName::new("B")).unwrap();
    assert!(b.is_data_accessed());
    assert!(!b.is_instantiated());
}

/// A class source completing loads after random delays.
struct SlowSource {
    inner: MemoryClassSource,
}

#[async_trait]
impl ClassSource for SlowSource {
    fn classes_with_entry_points(&self) -> Vec<ClassName> {
        self.inner.classes_with_entry_points()
    }

    async fn load_info(&self, name: &ClassName) -> Result<Option<ClassMetadata>, loader::Error> {
        let delay = rand::rng().random_range(0..5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.inner.load_info(name).await
    }

    async fn load_class_def_and_version(
        &self,
        name: &ClassName,
    ) -> Result<(Arc<ClassDef>, Option<Version>), loader::Error> {
        self.inner.load_class_def_and_version(name).await
    }
}

fn wide_universe() -> Vec<ClassDef> {
    let i = interface("I").with_method(public("foo__V", Some(Tree::Skip)));
    let j = interface("J").with_method(public("foo__V", Some(Tree::Skip)));
    let mut classes = vec![object_class(), i, j];
    for n in 0..12 {
        let super_class = if n % 3 == 0 {
            "O".to_owned()
        } else {
            format!("C{}", n - 1)
        };
        let mut class = class(&format!("C{n}"), &super_class);
        if n % 4 == 0 {
            class = class.with_interfaces(["I"]);
        }
        if n % 5 == 0 {
            class = class.with_interfaces(["J"]);
        }
        classes.push(class);
    }
    classes.push(class("X", "Y"));
    classes.push(class("Y", "X"));
    classes
}

fn wide_requirements() -> SymbolRequirement {
    SymbolRequirement::multiple(
        (0..12)
            .map(|n| instantiate(&format!("C{n}")))
            .chain([call("I", "foo__V"), call("J", "foo__V"), instantiate("X")])
            .chain([instantiate("Nope"), call("C3", "bar__")]),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn completion_order_does_not_matter() {
    let reference = run(wide_universe(), wide_requirements()).await;
    assert!(!reference.is_successful());
    for _ in 0..8 {
        let loader = CachingInfoLoader::new(SlowSource {
            inner: MemoryClassSource::new(wide_universe()),
        });
        let analysis = analyze(AnalyzerConfig::default(), wide_requirements(), &loader)
            .await
            .unwrap();
        assert_eq!(format!("{analysis:?}"), format!("{reference:?}"));
    }
}

fn arb_universe() -> impl Strategy<Value = Vec<ClassDef>> {
    let names = ["A", "B", "C", "D", "E", "F"];
    let arb_class = (
        prop::sample::select(names.to_vec()),
        prop::option::of(prop::sample::select(names.to_vec())),
        prop::collection::vec(prop::sample::select(vec!["foo__V", "bar__V"]), 0..2),
    )
        .prop_map(|(name, super_class, methods)| {
            let mut class = class(name, super_class.unwrap_or("O"));
            for method in methods {
                class = class.with_method(public(
                    method,
                    Some(Tree::Apply {
                        receiver_class: ClassName::new("A"),
                        receiver: Box::new(Tree::This),
                        method: MethodName::new("foo__V"),
                        args: Vec::new(),
                    }),
                ));
            }
            class
        });
    prop::collection::vec(arb_class, 0..6).prop_map(|classes| {
        std::iter::once(object_class()).chain(classes).collect()
    })
}

fn arb_requirement() -> impl Strategy<Value = SymbolRequirement> {
    let names = ["A", "B", "C", "D", "E", "F", "G"];
    prop_oneof![
        prop::sample::select(names.to_vec()).prop_map(instantiate),
        prop::sample::select(names.to_vec()).prop_map(|it| call(it, "foo__V")),
        prop::sample::select(names.to_vec()).prop_map(|it| call(it, "bar__V")),
        prop::sample::select(names.to_vec())
            .prop_map(|it| factory().access_module(ClassName::new(it))),
    ]
}

fn reachable_methods(analysis: &Analysis) -> Vec<MethodRef> {
    analysis
        .class_infos()
        .flat_map(|it| it.reachable_methods())
        .map(|it| it.method_ref())
        .collect()
}

fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

proptest! {
    #[test]
    fn no_requirements_no_errors(universe in arb_universe()) {
        let analysis = block_on(run(universe, SymbolRequirement::none()));
        assert!(analysis.is_successful());
        assert_eq!(analysis.class_infos().count(), 0);
    }

    #[test]
    fn more_requirements_never_unmark(
        universe in arb_universe(),
        base in prop::collection::vec(arb_requirement(), 0..4),
        extra in prop::collection::vec(arb_requirement(), 0..4),
    ) {
        let smaller = block_on(run(universe.clone(), SymbolRequirement::multiple(base.clone())));
        let larger = block_on(run(
            universe,
            SymbolRequirement::multiple(base.into_iter().chain(extra)),
        ));
        let larger_methods = reachable_methods(&larger);
        for method in reachable_methods(&smaller) {
            assert!(larger_methods.contains(&method), "{method} is not reachable anymore");
        }
        for class in smaller.class_infos().filter(|it| it.is_needed_at_all()) {
            let still_needed = larger
                .class_info(class.name())
                .is_some_and(|it| it.is_needed_at_all());
            assert!(still_needed, "{} is not needed anymore", class.name());
        }
    }
}
