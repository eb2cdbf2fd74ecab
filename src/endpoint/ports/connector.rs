//! Connector port: the management endpoint clients are redirected to.

use crate::endpoint::domain::ServiceAddress;
use crate::endpoint::ports::{ListeningSocket, ManagedObjectStore};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// A connector serving one object store over an already bound listener.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagementConnector: Send + Sync {
    /// Returns the service address advertised to clients.
    fn advertised_address(&self) -> &ServiceAddress;

    /// Returns the address the connector listener is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Returns whether the accept loop is running.
    fn is_active(&self) -> bool;

    /// Starts accepting remote calls.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::AlreadyActive`] when already started and
    /// [`ConnectorError::NotActive`] once the connector has been stopped.
    async fn start(&mut self) -> ConnectorResult<()>;

    /// Stops accepting calls and releases the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::NotActive`] when the connector is not
    /// running and [`ConnectorError::Transport`] when the accept loop ended
    /// abnormally.
    async fn stop(&mut self) -> ConnectorResult<()>;
}

/// Creates connectors attached to an object store.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectorFactory: Send + Sync {
    /// Creates a connector that will serve `store` on `listener` and
    /// advertise `address`. The connector does not accept calls until
    /// [`ManagementConnector::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError`] when the connector cannot be created.
    fn new_connector(
        &self,
        address: ServiceAddress,
        listener: ListeningSocket,
        store: Arc<dyn ManagedObjectStore>,
    ) -> ConnectorResult<Box<dyn ManagementConnector>>;
}

/// Errors returned by connector implementations.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// The connector has already been started.
    #[error("connector for {0} is already active")]
    AlreadyActive(ServiceAddress),

    /// The connector is not running.
    #[error("connector for {0} is not active")]
    NotActive(ServiceAddress),

    /// Transport failure.
    #[error("connector transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConnectorError {
    /// Wraps a transport failure.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
