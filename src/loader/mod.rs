//! Discovering and loading classes.

use std::{
    collections::HashMap,
    ops::Deref,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::OnceCell;

use crate::{
    analysis::infos::ClassMetadata,
    ir::{ClassDef, ClassName, Version},
};

pub mod class_sources;

/// An error that can occur while loading a class.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The class could not be found.
    #[error("Class not found: {0}")]
    NotFound(ClassName),
    /// The stored representation of the class is invalid.
    #[error("Malformed class {0}: {1}")]
    Malformed(ClassName, String),
    /// Error occurred while reading the class.
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    /// Other error occurred.
    #[error("Cause: {0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A universe of classes the linker can load from.
#[async_trait]
pub trait ClassSource: Send + Sync {
    /// Lists the classes that must be analyzed even when nothing refers to them,
    /// i.e., classes with a static initializer or top-level exports.
    fn classes_with_entry_points(&self) -> Vec<ClassName>;

    /// Loads the metadata of a class, without its method bodies.
    /// Returns [`None`] if the class does not exist.
    ///
    /// # Errors
    /// See [`Error`].
    async fn load_info(&self, name: &ClassName) -> Result<Option<ClassMetadata>, Error>;

    /// Loads the full definition of a class and the version of its content.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if the class does not exist.
    /// - See [`Error`] for other errors.
    async fn load_class_def_and_version(
        &self,
        name: &ClassName,
    ) -> Result<(Arc<ClassDef>, Option<Version>), Error>;
}

#[async_trait]
impl<T> ClassSource for T
where
    T: Deref + Send + Sync,
    <T as Deref>::Target: ClassSource,
{
    fn classes_with_entry_points(&self) -> Vec<ClassName> {
        self.deref().classes_with_entry_points()
    }

    async fn load_info(&self, name: &ClassName) -> Result<Option<ClassMetadata>, Error> {
        self.deref().load_info(name).await
    }

    async fn load_class_def_and_version(
        &self,
        name: &ClassName,
    ) -> Result<(Arc<ClassDef>, Option<Version>), Error> {
        self.deref().load_class_def_and_version(name).await
    }
}

/// A class loader that searches a list of class sources in order.
#[derive(Debug)]
pub struct ClassLoader<S> {
    sources: Vec<S>,
}

impl<S> ClassLoader<S> {
    /// Create a new class loader with the given class sources.
    #[must_use]
    pub fn new(sources: impl Into<Vec<S>>) -> Self {
        Self {
            sources: sources.into(),
        }
    }

    /// Convert this class loader into a [`CachingInfoLoader`].
    #[must_use]
    pub fn into_cached(self) -> CachingInfoLoader<Self> {
        CachingInfoLoader::new(self)
    }
}

#[async_trait]
impl<S: ClassSource> ClassSource for ClassLoader<S> {
    fn classes_with_entry_points(&self) -> Vec<ClassName> {
        self.sources
            .iter()
            .flat_map(ClassSource::classes_with_entry_points)
            .unique()
            .collect()
    }

    async fn load_info(&self, name: &ClassName) -> Result<Option<ClassMetadata>, Error> {
        for source in &self.sources {
            if let Some(info) = source.load_info(name).await? {
                return Ok(Some(info));
            }
        }
        Ok(None)
    }

    async fn load_class_def_and_version(
        &self,
        name: &ClassName,
    ) -> Result<(Arc<ClassDef>, Option<Version>), Error> {
        for source in &self.sources {
            match source.load_class_def_and_version(name).await {
                Ok(it) => return Ok(it),
                Err(Error::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Err(Error::NotFound(name.clone()))
    }
}

type InfoCell = Arc<OnceCell<Option<Arc<ClassMetadata>>>>;

/// A loader that caches class metadata.
///
/// Concurrent requests for the metadata of the same class share a single call to
/// [`ClassSource::load_info`]. The cache is never invalidated, so it can be reused by
/// consecutive linker runs over the same universe.
#[derive(Debug)]
pub struct CachingInfoLoader<S> {
    source: S,
    cache: RwLock<HashMap<ClassName, InfoCell>>,
}

impl<S> CachingInfoLoader<S> {
    /// Wraps a class source.
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the wrapped class source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The number of classes whose metadata is cached or being loaded.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        // A panic while holding the lock can only happen before the map is modified,
        // so a poisoned lock still guards a consistent map.
        match self.cache.read() {
            Ok(it) => it.len(),
            Err(poison_err) => poison_err.into_inner().len(),
        }
    }

    fn cell_for(&self, name: &ClassName) -> InfoCell {
        let cache = match self.cache.read() {
            Ok(it) => it,
            Err(poison_err) => poison_err.into_inner(),
        };
        if let Some(cell) = cache.get(name) {
            return Arc::clone(cell);
        }
        drop(cache);
        let mut cache = match self.cache.write() {
            Ok(it) => it,
            Err(poison_err) => poison_err.into_inner(),
        };
        // Another task may have inserted the cell before we got the write lock.
        Arc::clone(cache.entry(name.clone()).or_default())
    }
}

impl<S: ClassSource> CachingInfoLoader<S> {
    /// Loads the metadata of a class from the cache, or from the class source if it is not
    /// cached yet.
    ///
    /// # Errors
    /// See [`Error`]. Failed loads are not cached.
    pub async fn load_info(&self, name: &ClassName) -> Result<Option<Arc<ClassMetadata>>, Error> {
        let cell = self.cell_for(name);
        let info = cell
            .get_or_try_init(|| async {
                tracing::trace!(class = %name, "loading class info");
                let info = self.source.load_info(name).await?;
                Ok::<_, Error>(info.map(Arc::new))
            })
            .await?;
        Ok(info.clone())
    }

    /// Loads the full definition of a class. Definitions are not cached.
    ///
    /// # Errors
    /// See [`ClassSource::load_class_def_and_version`].
    pub async fn load_class_def_and_version(
        &self,
        name: &ClassName,
    ) -> Result<(Arc<ClassDef>, Option<Version>), Error> {
        self.source.load_class_def_and_version(name).await
    }

    /// See [`ClassSource::classes_with_entry_points`].
    #[must_use]
    pub fn classes_with_entry_points(&self) -> Vec<ClassName> {
        self.source.classes_with_entry_points()
    }
}
