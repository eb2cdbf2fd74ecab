//! Object store port: the in-process store of managed objects.

use crate::endpoint::domain::{ManagedObject, ObjectName};
use std::sync::Arc;
use thiserror::Error;

/// Result type for object store operations.
pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Thread-safe store of managed objects for one domain.
///
/// Queries return point-in-time snapshots in store iteration order.
pub trait ManagedObjectStore: Send + Sync {
    /// Returns the default domain of the store.
    fn default_domain(&self) -> &str;

    /// Registers a managed object.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::DuplicateObject`] when the name is
    /// already registered.
    fn register(&self, object: ManagedObject) -> ObjectStoreResult<()>;

    /// Removes a managed object and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NotFound`] when the name is unknown.
    fn unregister(&self, name: &ObjectName) -> ObjectStoreResult<ManagedObject>;

    /// Returns every registered object.
    fn query_all(&self) -> ObjectStoreResult<Vec<ManagedObject>>;

    /// Returns the names of every registered object.
    fn query_names(&self) -> ObjectStoreResult<Vec<ObjectName>>;
}

/// Creates object stores for a domain.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectStoreFactory: Send + Sync {
    /// Creates an empty store whose default domain is `domain`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError`] when the store cannot be created.
    fn create_store(&self, domain: &str) -> ObjectStoreResult<Arc<dyn ManagedObjectStore>>;
}

/// Errors returned by object store implementations.
#[derive(Debug, Clone, Error)]
pub enum ObjectStoreError {
    /// An object with the same name is already registered.
    #[error("managed object already registered: {0}")]
    DuplicateObject(ObjectName),

    /// No object with the name is registered.
    #[error("managed object not found: {0}")]
    NotFound(ObjectName),

    /// The store cannot serve requests.
    #[error("object store unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl ObjectStoreError {
    /// Wraps a store failure.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
