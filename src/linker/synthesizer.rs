//! Bodies of the methods created by the analyzer.

use std::{collections::HashMap, sync::Arc};

use crate::{
    analysis::{Analysis, ClassInfo, MethodInfo, MethodSyntheticKind},
    ir::{ClassDef, ClassName, MethodDef, MethodName, Namespace, ParamDef, Tree, TypeRef},
    loader::{self, CachingInfoLoader, ClassSource},
};

/// Creates the definitions of default method bridges and reflective proxies.
///
/// The synthesizer makes no reachability decision: it only materializes the synthetic methods
/// an [`Analysis`] marked reachable.
#[derive(Debug)]
pub struct MethodSynthesizer<'l, S> {
    loader: &'l CachingInfoLoader<S>,
    class_defs: HashMap<ClassName, Arc<ClassDef>>,
}

impl<'l, S: ClassSource> MethodSynthesizer<'l, S> {
    /// Creates a synthesizer loading class definitions from `loader`.
    #[must_use]
    pub fn new(loader: &'l CachingInfoLoader<S>) -> Self {
        Self {
            loader,
            class_defs: HashMap::new(),
        }
    }

    /// Makes an already loaded definition available without loading it again.
    pub fn add_class_def(&mut self, class_def: Arc<ClassDef>) {
        self.class_defs.insert(class_def.name.clone(), class_def);
    }

    async fn class_def(&mut self, name: &ClassName) -> Result<Arc<ClassDef>, loader::Error> {
        if let Some(class_def) = self.class_defs.get(name) {
            return Ok(Arc::clone(class_def));
        }
        let (class_def, _) = self.loader.load_class_def_and_version(name).await?;
        self.class_defs.insert(name.clone(), Arc::clone(&class_def));
        Ok(class_def)
    }

    /// Synthesizes the reachable synthetic methods of a class, sorted by namespace and name.
    ///
    /// # Errors
    /// Returns [`loader::Error`] if the definition of a target class cannot be loaded.
    pub async fn synthesize_members(
        &mut self,
        class: &ClassInfo,
        analysis: &Analysis,
    ) -> Result<Vec<MethodDef>, loader::Error> {
        let mut methods = Vec::new();
        let synthetic = Namespace::ALL
            .iter()
            .flat_map(|namespace| class.method_infos(*namespace))
            .filter(|it| it.is_reachable())
            .filter_map(|it| Some((it, it.synthetic_kind()?)));
        for (method, synthetic_kind) in synthetic {
            let synthesized = match synthetic_kind {
                MethodSyntheticKind::DefaultBridge(interface) => {
                    self.synthesize_default_bridge(method, interface).await?
                }
                MethodSyntheticKind::ReflectiveProxy(target) => {
                    self.synthesize_reflective_proxy(class, method, target, analysis)
                        .await?
                }
            };
            methods.extend(synthesized);
        }
        methods.sort_by(|lhs, rhs| {
            (lhs.namespace, &lhs.name).cmp(&(rhs.namespace, &rhs.name))
        });
        Ok(methods)
    }

    async fn synthesize_default_bridge(
        &mut self,
        method: &MethodInfo,
        interface: &ClassName,
    ) -> Result<Option<MethodDef>, loader::Error> {
        let interface_def = self.class_def(interface).await?;
        let Some(target) = interface_def.get_method(Namespace::Public, method.name()) else {
            tracing::warn!(method = %method.method_ref(), %interface, "default method not found");
            return Ok(None);
        };
        let body = Tree::ApplyStatically {
            class: interface.clone(),
            namespace: Namespace::Public,
            receiver: Box::new(Tree::This),
            method: method.name().clone(),
            args: forward(&target.params),
        };
        Ok(Some(MethodDef {
            namespace: Namespace::Public,
            name: method.name().clone(),
            params: target.params.clone(),
            result_type: target.result_type.clone(),
            body: Some(body),
            version: None,
        }))
    }

    async fn synthesize_reflective_proxy(
        &mut self,
        class: &ClassInfo,
        method: &MethodInfo,
        target: &MethodName,
        analysis: &Analysis,
    ) -> Result<Option<MethodDef>, loader::Error> {
        let declaring_class = class.ancestors().iter().find(|ancestor| {
            analysis
                .class_info(ancestor)
                .and_then(|it| it.method_info(Namespace::Public, target))
                .is_some_and(|it| it.exists() && it.synthetic_kind().is_none())
        });
        let Some(declaring_class) = declaring_class else {
            tracing::warn!(method = %method.method_ref(), %target, "proxy target not found");
            return Ok(None);
        };
        let declaring_def = self.class_def(declaring_class).await?;
        let Some(target_def) = declaring_def.get_method(Namespace::Public, target) else {
            tracing::warn!(method = %method.method_ref(), %target, "proxy target not found");
            return Ok(None);
        };
        let call = Tree::Apply {
            receiver_class: class.name().clone(),
            receiver: Box::new(Tree::This),
            method: target.clone(),
            args: forward(&target_def.params),
        };
        let body = if target_def.result_type == TypeRef::Void {
            Tree::Block(vec![call, Tree::Undefined])
        } else {
            call
        };
        Ok(Some(MethodDef {
            namespace: Namespace::Public,
            name: method.name().clone(),
            params: target_def.params.clone(),
            result_type: TypeRef::Class(ClassName::object()),
            body: Some(body),
            version: None,
        }))
    }
}

fn forward(params: &[ParamDef]) -> Vec<Tree> {
    params
        .iter()
        .map(|param| Tree::VarRef(param.name.clone()))
        .collect()
}
