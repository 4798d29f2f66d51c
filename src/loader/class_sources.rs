//! Implementations of [`ClassSource`].

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    analysis::infos::{ClassMetadata, generate_class_metadata},
    ir::{ClassDef, ClassName, Version},
};

use super::{ClassSource, Error};

/// A class source holding class definitions in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryClassSource {
    classes: BTreeMap<ClassName, (Arc<ClassDef>, Option<Version>)>,
}

impl MemoryClassSource {
    /// Creates a source containing the given classes, without versions.
    pub fn new(classes: impl IntoIterator<Item = ClassDef>) -> Self {
        let mut source = Self::default();
        for class in classes {
            source.insert(class, None);
        }
        source
    }

    /// Adds a class, replacing any class with the same name.
    pub fn insert(&mut self, class: ClassDef, version: Option<Version>) {
        self.classes
            .insert(class.name.clone(), (Arc::new(class), version));
    }

    /// Checks if the source contains a class.
    #[must_use]
    pub fn contains(&self, name: &ClassName) -> bool {
        self.classes.contains_key(name)
    }
}

#[async_trait]
impl ClassSource for MemoryClassSource {
    fn classes_with_entry_points(&self) -> Vec<ClassName> {
        self.classes
            .values()
            .filter(|(class, _)| class.has_entry_points())
            .map(|(class, _)| class.name.clone())
            .collect()
    }

    async fn load_info(&self, name: &ClassName) -> Result<Option<ClassMetadata>, Error> {
        Ok(self
            .classes
            .get(name)
            .map(|(class, _)| generate_class_metadata(class)))
    }

    async fn load_class_def_and_version(
        &self,
        name: &ClassName,
    ) -> Result<(Arc<ClassDef>, Option<Version>), Error> {
        self.classes
            .get(name)
            .map(|(class, version)| (Arc::clone(class), version.clone()))
            .ok_or_else(|| Error::NotFound(name.clone()))
    }
}
