//! Remote client that follows a service address to its connector.

use super::wire::{ConnectorReply, ConnectorRequest, FramedStream, RegistryReply, RegistryRequest};
use crate::endpoint::domain::{HostPort, ManagedObject, ObjectName, ServiceAddress};
use std::io;
use thiserror::Error;
use tracing::debug;

/// Errors returned by [`ManagementClient`].
#[derive(Debug, Error)]
pub enum ManagementClientError {
    /// The registry or connector could not be reached.
    #[error("cannot reach {target}")]
    Unreachable {
        /// Address that refused or failed the connection.
        target: HostPort,
        /// Underlying connection failure.
        #[source]
        source: io::Error,
    },

    /// The registry has no connector bound under the context name.
    #[error("no connector bound under '{0}'")]
    NotBound(String),

    /// The remote side reported an error.
    #[error("remote error: {0}")]
    Remote(String),

    /// The remote side answered with a reply that does not fit the request.
    #[error("unexpected reply to {0} request")]
    UnexpectedReply(&'static str),

    /// A frame could not be exchanged.
    #[error("protocol failure")]
    Protocol(#[from] io::Error),
}

/// Client connected to a management connector.
///
/// Connecting is a two-step exchange: the registry named in the service
/// address is asked for the connector bound under the address context, and
/// the client then connects to the connector it returns.
#[derive(Debug)]
pub struct ManagementClient {
    address: ServiceAddress,
    stream: FramedStream,
}

impl ManagementClient {
    /// Connects through the registry named in `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementClientError::Unreachable`] when either endpoint
    /// refuses the connection and [`ManagementClientError::NotBound`] when the
    /// registry does not know the context.
    pub async fn connect(address: &ServiceAddress) -> Result<Self, ManagementClientError> {
        let mut registry = open(address.registry()).await?;
        let reply: RegistryReply = registry
            .call(&RegistryRequest::Lookup {
                name: address.context().to_owned(),
            })
            .await?;
        let bound = match reply {
            RegistryReply::Found { address: bound } => bound,
            RegistryReply::NotFound { name } => {
                return Err(ManagementClientError::NotBound(name));
            }
            RegistryReply::Error { message } => {
                return Err(ManagementClientError::Remote(message));
            }
            RegistryReply::Names { .. } => {
                return Err(ManagementClientError::UnexpectedReply("lookup"));
            }
        };
        debug!(context = address.context(), connector = %bound.connector(), "registry lookup resolved");

        let stream = open(bound.connector()).await?;
        Ok(Self {
            address: bound,
            stream,
        })
    }

    /// Returns the address returned by the registry.
    #[must_use]
    pub const fn address(&self) -> &ServiceAddress {
        &self.address
    }

    /// Returns the names of every registered object.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementClientError`] when the call fails.
    pub async fn query_names(&mut self) -> Result<Vec<ObjectName>, ManagementClientError> {
        match self.call(ConnectorRequest::QueryNames).await? {
            ConnectorReply::Names { names } => Ok(names),
            other => Err(unexpected(other, "query_names")),
        }
    }

    /// Returns every registered object.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementClientError`] when the call fails.
    pub async fn query_all(&mut self) -> Result<Vec<ManagedObject>, ManagementClientError> {
        match self.call(ConnectorRequest::QueryAll).await? {
            ConnectorReply::Objects { objects } => Ok(objects),
            other => Err(unexpected(other, "query_all")),
        }
    }

    /// Returns the default domain of the remote object store.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementClientError`] when the call fails.
    pub async fn default_domain(&mut self) -> Result<String, ManagementClientError> {
        match self.call(ConnectorRequest::DefaultDomain).await? {
            ConnectorReply::Domain { domain } => Ok(domain),
            other => Err(unexpected(other, "default_domain")),
        }
    }

    async fn call(
        &mut self,
        request: ConnectorRequest,
    ) -> Result<ConnectorReply, ManagementClientError> {
        Ok(self.stream.call(&request).await?)
    }
}

async fn open(target: &HostPort) -> Result<FramedStream, ManagementClientError> {
    FramedStream::connect(target)
        .await
        .map_err(|source| ManagementClientError::Unreachable {
            target: target.clone(),
            source,
        })
}

fn unexpected(reply: ConnectorReply, request: &'static str) -> ManagementClientError {
    match reply {
        ConnectorReply::Error { message } => ManagementClientError::Remote(message),
        _ => ManagementClientError::UnexpectedReply(request),
    }
}
