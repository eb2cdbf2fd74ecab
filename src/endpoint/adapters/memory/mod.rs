//! In-memory adapters.

mod object_store;

pub use object_store::{InMemoryObjectStore, InMemoryObjectStoreFactory};
