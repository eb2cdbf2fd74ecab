//! Handle of an object registered in the management object store.

use super::ObjectName;
use serde::{Deserialize, Serialize};

/// A registered managed object: its name and the class of its implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedObject {
    name: ObjectName,
    class_name: String,
}

impl ManagedObject {
    /// Creates a managed object handle.
    #[must_use]
    pub fn new(name: ObjectName, class_name: impl Into<String>) -> Self {
        Self {
            name,
            class_name: class_name.into(),
        }
    }

    /// Returns the object name.
    #[must_use]
    pub const fn name(&self) -> &ObjectName {
        &self.name
    }

    /// Returns the implementation class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}
