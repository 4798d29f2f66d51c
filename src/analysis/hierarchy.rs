//! Linking classes: validating parents, detecting inheritance cycles and computing ancestors.

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;

use super::{
    ClassInfo,
    engine::{Analyzer, ClassSlot},
    errors::{Error, Origin},
};
use crate::ir::{ClassKind, ClassName};

struct Frame {
    name: ClassName,
    parents: Vec<ClassName>,
    next: usize,
}

impl Analyzer {
    /// Links every loaded class whose ancestors are all loaded.
    pub(super) fn link_loaded_classes(&mut self) {
        let queue = std::mem::take(&mut self.link_queue);
        for name in &queue {
            if matches!(self.classes.get(name), Some(ClassSlot::Loaded { .. }))
                && self.ready_to_link(name)
            {
                self.link(name);
            }
        }
        self.link_queue = queue
            .into_iter()
            .filter(|name| matches!(self.classes.get(name), Some(ClassSlot::Loaded { .. })))
            .collect();
    }

    fn parents_of(&self, name: &ClassName) -> Vec<ClassName> {
        match self.classes.get(name) {
            Some(ClassSlot::Loaded {
                metadata: Some(metadata),
                ..
            }) => metadata
                .super_class
                .iter()
                .chain(&metadata.interfaces)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Checks that no transitive parent of `root` is still loading, and schedules the loads of
    /// the parents nothing has asked for yet.
    fn ready_to_link(&mut self, root: &ClassName) -> bool {
        let mut ready = true;
        let mut visited = HashSet::new();
        let mut stack = vec![root.clone()];
        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            match self.classes.get(&name) {
                Some(ClassSlot::Loaded { .. }) => stack.extend(self.parents_of(&name)),
                Some(ClassSlot::Linked(_) | ClassSlot::Failed) => {}
                Some(ClassSlot::Loading { .. }) => ready = false,
                None => {
                    self.request_load(name);
                    ready = false;
                }
            }
        }
        ready
    }

    /// Links `root` and its loaded ancestors, parents first.
    fn link(&mut self, root: &ClassName) {
        let mut stack = vec![Frame {
            name: root.clone(),
            parents: self.parents_of(root),
            next: 0,
        }];
        while let Some(frame) = stack.last_mut() {
            let Some(parent) = frame.parents.get(frame.next).cloned() else {
                let name = frame.name.clone();
                stack.pop();
                self.complete_link(name);
                continue;
            };
            frame.next += 1;
            if !matches!(self.classes.get(&parent), Some(ClassSlot::Loaded { .. })) {
                continue;
            }
            if let Some(start) = stack.iter().position(|it| it.name == parent) {
                // Only the suffix of the path starting at the revisited class is on the cycle.
                let cycle = stack.drain(start..).map(|it| it.name).collect_vec();
                tracing::trace!(classes = ?cycle, "inheritance cycle");
                for name in &cycle {
                    self.classes.insert(name.clone(), ClassSlot::Failed);
                }
                self.errors.push(Error::CycleInInheritanceChain {
                    origin: Origin::Class(parent),
                    classes: cycle,
                });
            } else {
                let parents = self.parents_of(&parent);
                stack.push(Frame {
                    name: parent,
                    parents,
                    next: 0,
                });
            }
        }
    }

    /// Links a loaded class whose parents are all linked or failed.
    fn complete_link(&mut self, name: ClassName) {
        let (metadata, deferred) = match self.classes.remove(&name) {
            Some(ClassSlot::Loaded { metadata, deferred }) => (metadata, deferred),
            Some(other) => {
                self.classes.insert(name, other);
                return;
            }
            None => return,
        };
        let Some(metadata) = metadata else {
            tracing::trace!(class = %name, "linked non-existent class");
            self.classes.insert(
                name.clone(),
                ClassSlot::Linked(Box::new(ClassInfo::non_existent(name))),
            );
            self.work.extend(deferred);
            return;
        };

        let has_failed_parent = metadata
            .super_class
            .iter()
            .chain(&metadata.interfaces)
            .any(|parent| matches!(self.classes.get(parent), Some(ClassSlot::Failed)));
        if has_failed_parent {
            tracing::trace!(class = %name, "inherits from a cycle");
            self.classes.insert(name, ClassSlot::Failed);
            return;
        }

        let kind = metadata.kind;
        let super_class = match &metadata.super_class {
            None => {
                if kind.requires_super_class() && !name.is_object() {
                    self.errors.push(Error::MissingSuperClass {
                        class: name.clone(),
                        kind,
                        origin: Origin::Class(name.clone()),
                    });
                }
                None
            }
            Some(parent) => self.validate_super_class(&name, kind, parent),
        };
        let mut interfaces = Vec::with_capacity(metadata.interfaces.len());
        for interface in &metadata.interfaces {
            if self.validate_interface(&name, kind, interface) {
                interfaces.push(interface.clone());
            }
        }

        let ancestors: Vec<ClassName> = std::iter::once(name.clone())
            .chain(
                super_class
                    .iter()
                    .chain(&interfaces)
                    .filter_map(|parent| self.linked(parent))
                    .flat_map(|parent| parent.ancestors.iter().cloned()),
            )
            .unique()
            .collect();

        let mut info = ClassInfo::new(name.clone(), kind, Some(metadata));
        info.super_class = super_class;
        info.interfaces = interfaces;
        info.ancestors = ancestors;
        tracing::trace!(class = %name, ?kind, "linked");
        self.classes.insert(name, ClassSlot::Linked(Box::new(info)));
        self.work.extend(deferred);
    }

    /// Returns the super class the class is linked with.
    fn validate_super_class(
        &mut self,
        class: &ClassName,
        kind: ClassKind,
        super_class: &ClassName,
    ) -> Option<ClassName> {
        let (super_exists, super_kind) = self
            .linked(super_class)
            .map(|it| (it.exists, it.kind))?;
        let origin = Origin::Class(class.clone());
        if !super_exists {
            self.errors.push(Error::MissingClass {
                class: super_class.clone(),
                origin,
            });
            return Some(super_class.clone());
        }
        // Native JavaScript roots extend `java.lang.Object`.
        if kind.accepts_super_class(super_kind)
            || (kind.accepts_object_super_class() && super_class.is_object())
        {
            return Some(super_class.clone());
        }
        self.errors.push(Error::InvalidSuperClass {
            super_class: super_class.clone(),
            super_kind,
            class: class.clone(),
            kind,
            origin,
        });
        (kind.is_class() && !class.is_object()).then(ClassName::object)
    }

    /// Returns whether the class is linked as an implementation of the interface.
    fn validate_interface(
        &mut self,
        class: &ClassName,
        kind: ClassKind,
        interface: &ClassName,
    ) -> bool {
        let Some((interface_exists, interface_kind)) =
            self.linked(interface).map(|it| (it.exists, it.kind))
        else {
            return false;
        };
        let origin = Origin::Class(class.clone());
        if !interface_exists {
            self.errors.push(Error::MissingClass {
                class: interface.clone(),
                origin,
            });
            return true;
        }
        if interface_kind == kind.interface_kind() {
            return true;
        }
        self.errors.push(Error::InvalidImplementedInterface {
            interface: interface.clone(),
            interface_kind,
            class: class.clone(),
            kind,
            origin,
        });
        false
    }

    /// Reports every top-level export name claimed more than once.
    pub(super) fn check_top_level_exports(&mut self) {
        let mut owners_by_name: BTreeMap<&str, Vec<ClassName>> = BTreeMap::new();
        for slot in self.classes.values() {
            let ClassSlot::Linked(info) = slot else {
                continue;
            };
            for export in info.metadata.iter().flat_map(|it| &it.top_level_exports) {
                owners_by_name
                    .entry(export.export_name.as_str())
                    .or_default()
                    .push(info.name.clone());
            }
        }
        let conflicts = owners_by_name
            .into_iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(name, owners)| Error::ConflictingTopLevelExport {
                name: name.to_owned(),
                owners,
            })
            .collect_vec();
        self.errors.extend(conflicts);
    }
}
