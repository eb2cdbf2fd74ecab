//! Port contracts for management endpoint orchestration.

mod binder;
mod connector;
mod object_store;

pub use binder::{AddressBinder, BindError, BindResult, ListeningSocket};
pub use connector::{ConnectorError, ConnectorFactory, ConnectorResult, ManagementConnector};
pub use object_store::{
    ManagedObjectStore, ObjectStoreError, ObjectStoreFactory, ObjectStoreResult,
};

#[cfg(test)]
pub use connector::{MockConnectorFactory, MockManagementConnector};
#[cfg(test)]
pub use object_store::MockObjectStoreFactory;
