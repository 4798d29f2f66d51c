//! Assembling the linked classes from an analysis.

use std::sync::Arc;

use futures::future::try_join_all;
use itertools::Itertools;

use super::{LinkError, LinkedClass, synthesizer::MethodSynthesizer};
use crate::{
    analysis::{Analysis, ClassInfo},
    ir::{AnyFieldDef, ClassDef, MethodDef, Version},
    loader::{CachingInfoLoader, ClassSource},
};

/// Loads the definitions of the needed classes and strips what the analysis found unreachable.
pub(super) async fn assemble<S: ClassSource>(
    analysis: &Analysis,
    loader: &CachingInfoLoader<S>,
) -> Result<Vec<LinkedClass>, LinkError> {
    let needed = analysis
        .class_infos()
        .filter(|it| it.exists() && it.is_needed_at_all())
        .collect_vec();
    tracing::debug!(classes = needed.len(), "loading class definitions");
    let class_defs = try_join_all(
        needed
            .iter()
            .map(|info| loader.load_class_def_and_version(info.name())),
    )
    .await?;

    let mut synthesizer = MethodSynthesizer::new(loader);
    for (class_def, _) in &class_defs {
        synthesizer.add_class_def(Arc::clone(class_def));
    }
    let mut linked = Vec::with_capacity(needed.len());
    for (info, (class_def, version)) in needed.into_iter().zip(class_defs) {
        let synthesized = synthesizer.synthesize_members(info, analysis).await?;
        linked.push(link_class(info, &class_def, version, synthesized)?);
    }
    Ok(linked)
}

fn link_class(
    info: &ClassInfo,
    class_def: &ClassDef,
    version: Option<Version>,
    synthesized: Vec<MethodDef>,
) -> Result<LinkedClass, LinkError> {
    for method in info.reachable_methods() {
        let has_body = if method.synthetic_kind().is_some() {
            synthesized
                .iter()
                .any(|it| it.namespace == method.namespace() && &it.name == method.name())
        } else {
            class_def
                .get_method(method.namespace(), method.name())
                .is_some_and(|it| !it.is_abstract())
        };
        if !has_body {
            return Err(LinkError::MissingMethodBody(method.method_ref()));
        }
    }

    let kind = info.kind();
    let fields = class_def
        .fields
        .iter()
        .filter(|field| match field {
            AnyFieldDef::Field(field) if field.is_static() => info.is_any_static_field_used(),
            AnyFieldDef::Field(_) if kind.is_js_type() => info.is_any_private_js_field_used(),
            AnyFieldDef::Field(_) | AnyFieldDef::JSField(_) => info.is_any_subclass_instantiated(),
        })
        .cloned()
        .collect();
    let methods = class_def
        .methods
        .iter()
        .filter(|method| {
            info.method_info(method.namespace, &method.name)
                .is_some_and(|it| it.is_reachable() && it.synthetic_kind().is_none())
        })
        .cloned()
        .chain(synthesized)
        .collect();
    let has_instances = info.is_any_subclass_instantiated();
    let (js_constructor, exported_members) = if has_instances {
        (
            class_def.js_constructor.clone(),
            class_def.exported_members.clone(),
        )
    } else {
        (None, Vec::new())
    };
    let kind = if kind.has_module_accessor() && !info.is_module_accessed() {
        kind.without_module_accessor()
    } else {
        kind
    };

    Ok(LinkedClass {
        name: info.name().clone(),
        kind,
        super_class: info.super_class().cloned(),
        interfaces: info.interfaces().to_vec(),
        fields,
        methods,
        js_constructor,
        exported_members,
        top_level_exports: class_def.top_level_exports.clone(),
        has_instances,
        has_instance_tests: info.are_instance_tests_used(),
        has_runtime_type_info: info.is_data_accessed(),
        ancestors: info.ancestors().to_vec(),
        version,
    })
}
