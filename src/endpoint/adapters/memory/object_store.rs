//! In-memory store of managed objects.

use crate::endpoint::{
    domain::{ManagedObject, ObjectName},
    ports::{
        ManagedObjectStore, ObjectStoreError, ObjectStoreFactory, ObjectStoreResult,
    },
};
use std::sync::{Arc, RwLock};

/// Thread-safe in-memory object store.
///
/// Objects are kept in registration order.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStore {
    domain: String,
    state: Arc<RwLock<Vec<ManagedObject>>>,
}

impl InMemoryObjectStore {
    /// Creates an empty store for `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            state: Arc::default(),
        }
    }

    fn read(&self) -> ObjectStoreResult<std::sync::RwLockReadGuard<'_, Vec<ManagedObject>>> {
        self.state
            .read()
            .map_err(|err| ObjectStoreError::unavailable(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> ObjectStoreResult<std::sync::RwLockWriteGuard<'_, Vec<ManagedObject>>> {
        self.state
            .write()
            .map_err(|err| ObjectStoreError::unavailable(std::io::Error::other(err.to_string())))
    }
}

impl ManagedObjectStore for InMemoryObjectStore {
    fn default_domain(&self) -> &str {
        &self.domain
    }

    fn register(&self, object: ManagedObject) -> ObjectStoreResult<()> {
        let mut objects = self.write()?;
        if objects.iter().any(|stored| stored.name() == object.name()) {
            return Err(ObjectStoreError::DuplicateObject(object.name().clone()));
        }
        objects.push(object);
        Ok(())
    }

    fn unregister(&self, name: &ObjectName) -> ObjectStoreResult<ManagedObject> {
        let mut objects = self.write()?;
        let position = objects
            .iter()
            .position(|stored| stored.name() == name)
            .ok_or_else(|| ObjectStoreError::NotFound(name.clone()))?;
        Ok(objects.remove(position))
    }

    fn query_all(&self) -> ObjectStoreResult<Vec<ManagedObject>> {
        Ok(self.read()?.clone())
    }

    fn query_names(&self) -> ObjectStoreResult<Vec<ObjectName>> {
        Ok(self
            .read()?
            .iter()
            .map(|object| object.name().clone())
            .collect())
    }
}

/// Creates [`InMemoryObjectStore`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryObjectStoreFactory;

impl InMemoryObjectStoreFactory {
    /// Creates a store factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ObjectStoreFactory for InMemoryObjectStoreFactory {
    fn create_store(&self, domain: &str) -> ObjectStoreResult<Arc<dyn ManagedObjectStore>> {
        Ok(Arc::new(InMemoryObjectStore::new(domain)))
    }
}
