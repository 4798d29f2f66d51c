//! Method resolution: dynamic dispatch, default method bridges and reflective proxies.

use itertools::Itertools;

use super::{
    ClassInfo, MethodInfo, MethodSyntheticKind,
    engine::Analyzer,
    errors::{Error, MethodRef, Origin},
};
use crate::ir::{ClassKind, ClassName, MethodName, Namespace, TypeRef};

impl Analyzer {
    /// Calls `method` on instances of exactly `class`.
    pub(super) fn call_method_resolved(
        &mut self,
        class: &ClassName,
        method: MethodName,
        origin: Origin,
    ) {
        let target = if method.is_reflective_proxy() && self.config.allow_adding_synthetic_methods
        {
            self.lookup_reflective_proxy(class, &method, &origin)
        } else {
            self.lookup_method(class, &method, &origin)
        };
        self.reach(&target, origin);
    }

    /// Adds `origin` to the callers of the target `method` already resolved to in `class`.
    pub(super) fn record_resolved_call(
        &mut self,
        class: &ClassName,
        method: &MethodName,
        origin: &Origin,
    ) {
        let target = if self
            .linked(class)
            .is_some_and(|it| it.method_info(Namespace::Public, method).is_some())
        {
            Some(class.clone())
        } else {
            self.find_in_super_classes(class, method)
                .or_else(|| self.default_method_owners(class, method).into_iter().next())
        };
        if let Some(owner) = target {
            self.reach(
                &MethodRef::new(owner, Namespace::Public, method.clone()),
                origin.clone(),
            );
        }
    }

    /// Finds the implementation of a public method for instances of `class`.
    ///
    /// The super class chain is searched first. Failing that, the default methods of the
    /// interfaces among the ancestors are candidates, minus those overridden by a more specific
    /// interface. A default method found this way is called through a bridge created in
    /// `class`. If nothing is found, a non-existent method is created in `class`.
    pub(super) fn lookup_method(
        &mut self,
        class: &ClassName,
        method: &MethodName,
        origin: &Origin,
    ) -> MethodRef {
        if let Some(owner) = self.find_in_super_classes(class, method) {
            return MethodRef::new(owner, Namespace::Public, method.clone());
        }
        let candidates = self.default_method_owners(class, method);
        let Some(target) = candidates.first().cloned() else {
            return self.missing_method(class, Namespace::Public, method.clone(), origin);
        };
        if candidates.len() > 1 {
            self.errors.push(Error::ConflictingDefaultMethods {
                methods: candidates
                    .into_iter()
                    .map(|owner| MethodRef::new(owner, Namespace::Public, method.clone()))
                    .collect(),
                origin: origin.clone(),
            });
        }
        let is_interface = self
            .linked(class)
            .is_some_and(|it| it.kind == ClassKind::Interface);
        if is_interface || !self.config.allow_adding_synthetic_methods {
            return MethodRef::new(target, Namespace::Public, method.clone());
        }
        self.add_synthetic_method(
            class,
            method.clone(),
            MethodSyntheticKind::DefaultBridge(target),
        )
    }

    fn find_in_super_classes(&self, class: &ClassName, method: &MethodName) -> Option<ClassName> {
        let mut current = Some(class);
        while let Some(name) = current {
            let info = self.linked(name)?;
            if info
                .method_info(Namespace::Public, method)
                .is_some_and(|it| it.exists && !it.is_abstract)
            {
                return Some(name.clone());
            }
            current = info.super_class.as_ref();
        }
        None
    }

    /// The interfaces among the ancestors of `class` providing a default implementation that
    /// no other candidate overrides, in ancestor order.
    fn default_method_owners(&self, class: &ClassName, method: &MethodName) -> Vec<ClassName> {
        let Some(info) = self.linked(class) else {
            return Vec::new();
        };
        let candidates = info
            .ancestors
            .iter()
            .filter_map(|ancestor| self.linked(ancestor))
            .filter(|ancestor| {
                ancestor.kind == ClassKind::Interface
                    && ancestor
                        .method_info(Namespace::Public, method)
                        .is_some_and(|it| it.exists && !it.is_abstract)
            })
            .collect_vec();
        candidates
            .iter()
            .filter(|candidate| {
                !candidates.iter().any(|other| {
                    other.name != candidate.name && other.is_subclass_of(&candidate.name)
                })
            })
            .map(|candidate| candidate.name.clone())
            .collect()
    }

    /// Finds or creates the reflective proxy `proxy` in `class`.
    fn lookup_reflective_proxy(
        &mut self,
        class: &ClassName,
        proxy: &MethodName,
        origin: &Origin,
    ) -> MethodRef {
        let Some(info) = self.linked(class) else {
            return MethodRef::new(class.clone(), Namespace::Public, proxy.clone());
        };
        if info.method_info(Namespace::Public, proxy).is_some() {
            return MethodRef::new(class.clone(), Namespace::Public, proxy.clone());
        }
        match self.find_reflective_target(class, proxy) {
            Some(target) => self.add_synthetic_method(
                class,
                proxy.clone(),
                MethodSyntheticKind::ReflectiveProxy(target),
            ),
            None => self.missing_method(class, Namespace::Public, proxy.clone(), origin),
        }
    }

    /// Searches the super classes, then all the ancestors, for the first class declaring a
    /// method matching `proxy`.
    fn find_reflective_target(&self, class: &ClassName, proxy: &MethodName) -> Option<MethodName> {
        let info = self.linked(class)?;
        let mut super_classes = Vec::new();
        let mut current = Some(class);
        while let Some(name) = current {
            let Some(super_info) = self.linked(name) else {
                break;
            };
            super_classes.push(super_info);
            current = super_info.super_class.as_ref();
        }
        super_classes
            .into_iter()
            .chain(info.ancestors.iter().filter_map(|it| self.linked(it)))
            .find_map(|candidate| self.find_proxy_match(candidate, proxy))
    }

    /// Picks the target of `proxy` among the methods of a single class: the first method, in
    /// name order, whose result type no other candidate refines.
    fn find_proxy_match(&self, class: &ClassInfo, proxy: &MethodName) -> Option<MethodName> {
        let candidates = class
            .method_infos(Namespace::Public)
            .filter(|it| {
                it.exists
                    && !it.is_abstract
                    && it.synthetic_kind.is_none()
                    && it.name.reflective_proxy_matches(proxy)
            })
            .map(|it| (&it.name, it.name.result_type()))
            .collect_vec();
        let most_specific = candidates.iter().find(|(_, result)| {
            !candidates
                .iter()
                .any(|(_, other)| self.is_more_specific(other.as_ref(), result.as_ref()))
        });
        most_specific
            .or(candidates.first())
            .map(|(name, _)| (*name).clone())
    }

    /// Checks if `left` is a strictly more specific result type than `right`.
    pub(super) fn is_more_specific(&self, left: Option<&TypeRef>, right: Option<&TypeRef>) -> bool {
        let (Some(left), Some(right)) = (left, right) else {
            return false;
        };
        let class_is_more_specific = |left: &ClassName, right: &ClassName| {
            left != right
                && self
                    .linked(left)
                    .is_some_and(|it| it.is_subclass_of(right))
        };
        match (left.base_and_depth(), right.base_and_depth()) {
            ((TypeRef::Class(left), left_depth), (TypeRef::Class(right), right_depth))
                if left_depth == right_depth =>
            {
                class_is_more_specific(left, right)
            }
            ((_, left_depth), (TypeRef::Class(right), 0)) => left_depth > 0 && right.is_object(),
            _ => false,
        }
    }

    fn add_synthetic_method(
        &mut self,
        class: &ClassName,
        name: MethodName,
        synthetic_kind: MethodSyntheticKind,
    ) -> MethodRef {
        let method = MethodInfo::synthetic(class.clone(), name, synthetic_kind);
        let method_ref = method.method_ref();
        tracing::trace!(method = %method_ref, synthetic = ?method.synthetic_kind, "synthetic method");
        if let Some(info) = self.linked_mut(class) {
            info.add_method(method);
        }
        method_ref
    }

    /// Records a call to a method without implementation. A placeholder is created unless
    /// `class` declares the method, abstract or not.
    pub(super) fn missing_method(
        &mut self,
        class: &ClassName,
        namespace: Namespace,
        name: MethodName,
        origin: &Origin,
    ) -> MethodRef {
        let method_ref = MethodRef::new(class.clone(), namespace, name);
        if let Some(info) = self.linked_mut(class) {
            if info.method_info(namespace, &method_ref.name).is_none() {
                info.add_method(MethodInfo::non_existent(
                    class.clone(),
                    namespace,
                    method_ref.name.clone(),
                ));
            }
        }
        self.errors.push(Error::MissingMethod {
            method: method_ref.clone(),
            origin: origin.clone(),
        });
        method_ref
    }
}
