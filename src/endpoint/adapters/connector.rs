//! TCP connector serving an object store to redirected clients.

use super::wire::{ConnectorReply, ConnectorRequest, spawn_accept_loop};
use crate::endpoint::{
    domain::ServiceAddress,
    ports::{
        ConnectorError, ConnectorFactory, ConnectorResult, ListeningSocket, ManagedObjectStore,
        ManagementConnector, ObjectStoreResult,
    },
};
use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

/// Creates [`TcpConnector`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnectorFactory;

impl TcpConnectorFactory {
    /// Creates a connector factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ConnectorFactory for TcpConnectorFactory {
    fn new_connector(
        &self,
        address: ServiceAddress,
        listener: ListeningSocket,
        store: Arc<dyn ManagedObjectStore>,
    ) -> ConnectorResult<Box<dyn ManagementConnector>> {
        Ok(Box::new(TcpConnector::new(address, listener, store)))
    }
}

/// Connector that answers object store queries over TCP.
///
/// The connector holds its bound listener until started; once stopped it
/// cannot be started again.
pub struct TcpConnector {
    address: ServiceAddress,
    local_addr: SocketAddr,
    store: Arc<dyn ManagedObjectStore>,
    listener: Option<TcpListener>,
    accept_loop: Option<JoinHandle<()>>,
}

impl TcpConnector {
    /// Creates a stopped connector over an already bound listener.
    #[must_use]
    pub fn new(
        address: ServiceAddress,
        listener: ListeningSocket,
        store: Arc<dyn ManagedObjectStore>,
    ) -> Self {
        Self {
            address,
            local_addr: listener.local_addr(),
            store,
            listener: Some(listener.into_listener()),
            accept_loop: None,
        }
    }
}

impl fmt::Debug for TcpConnector {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TcpConnector")
            .field("address", &self.address)
            .field("local_addr", &self.local_addr)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ManagementConnector for TcpConnector {
    fn advertised_address(&self) -> &ServiceAddress {
        &self.address
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn is_active(&self) -> bool {
        self.accept_loop
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn start(&mut self) -> ConnectorResult<()> {
        if self.accept_loop.is_some() {
            return Err(ConnectorError::AlreadyActive(self.address.clone()));
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| ConnectorError::NotActive(self.address.clone()))?;

        let store = Arc::clone(&self.store);
        self.accept_loop = Some(spawn_accept_loop(
            listener,
            "connector",
            Arc::new(move |request: ConnectorRequest| answer(store.as_ref(), request)),
        ));
        info!(address = %self.address, local = %self.local_addr, "connector accepting calls");
        Ok(())
    }

    async fn stop(&mut self) -> ConnectorResult<()> {
        let handle = self
            .accept_loop
            .take()
            .ok_or_else(|| ConnectorError::NotActive(self.address.clone()))?;
        handle.abort();
        loop_outcome(handle.await).inspect_err(|err| {
            warn!(address = %self.address, error = %err, "connector loop failed");
        })?;
        info!(address = %self.address, "connector stopped");
        Ok(())
    }
}

/// Maps the joined accept loop to a stop result. Cancellation is the normal
/// way the loop ends.
fn loop_outcome(joined: Result<(), JoinError>) -> ConnectorResult<()> {
    match joined {
        Err(err) if !err.is_cancelled() => Err(ConnectorError::transport(err)),
        _ => Ok(()),
    }
}

impl Drop for TcpConnector {
    fn drop(&mut self) {
        if let Some(handle) = self.accept_loop.take() {
            handle.abort();
        }
    }
}

fn answer(store: &dyn ManagedObjectStore, request: ConnectorRequest) -> ConnectorReply {
    let outcome: ObjectStoreResult<ConnectorReply> = match request {
        ConnectorRequest::QueryAll => store
            .query_all()
            .map(|objects| ConnectorReply::Objects { objects }),
        ConnectorRequest::QueryNames => store
            .query_names()
            .map(|names| ConnectorReply::Names { names }),
        ConnectorRequest::DefaultDomain => Ok(ConnectorReply::Domain {
            domain: store.default_domain().to_owned(),
        }),
    };
    outcome.unwrap_or_else(|err| ConnectorReply::Error {
        message: err.to_string(),
    })
}
