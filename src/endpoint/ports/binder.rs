//! Address binder port: turns a bind specification into a listening socket.

use crate::endpoint::domain::{BindSpec, EndpointDomainError};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

/// Result type for bind operations.
pub type BindResult<T> = Result<T, BindError>;

/// Opens listening sockets exactly where a [`BindSpec`] says.
#[async_trait]
pub trait AddressBinder: Send + Sync {
    /// Binds a listening socket.
    ///
    /// A non-blank host is resolved and bound together with the requested
    /// port; otherwise the all-interfaces address is bound. Failures are
    /// reported immediately and never retried.
    async fn bind(&self, spec: &BindSpec) -> BindResult<ListeningSocket>;
}

/// A bound, listening socket together with the spec that produced it.
///
/// Dropping the value closes the socket.
#[derive(Debug)]
pub struct ListeningSocket {
    listener: TcpListener,
    local_addr: SocketAddr,
    spec: BindSpec,
}

impl ListeningSocket {
    /// Wraps a listener bound for `spec`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the bound address cannot be read back.
    pub fn new(listener: TcpListener, spec: BindSpec) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            spec,
        })
    }

    /// Returns the address the socket is bound to, with the OS-assigned port
    /// when port zero was requested.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the specification the socket was bound for.
    #[must_use]
    pub const fn spec(&self) -> &BindSpec {
        &self.spec
    }

    /// Releases the underlying listener to an accept loop.
    #[must_use]
    pub fn into_listener(self) -> TcpListener {
        self.listener
    }
}

/// Errors returned by address binders.
#[derive(Debug, Error)]
pub enum BindError {
    /// The host override did not resolve to any address.
    #[error("cannot resolve host '{host}'")]
    UnresolvableHost {
        /// Host that failed to resolve.
        host: String,
        /// Resolver failure, when the resolver reported one.
        #[source]
        source: Option<io::Error>,
    },

    /// Another socket already holds the address.
    #[error("address {address} is already in use")]
    AddressInUse {
        /// Address that could not be bound.
        address: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Any other socket failure while binding or listening.
    #[error("cannot listen on {address}")]
    Io {
        /// Address that could not be bound.
        address: SocketAddr,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The bind specification itself is invalid.
    #[error(transparent)]
    InvalidSpec(#[from] EndpointDomainError),
}

impl BindError {
    /// Classifies a socket error raised while binding `address`.
    #[must_use]
    pub fn from_io(address: SocketAddr, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::AddrInUse {
            Self::AddressInUse { address, source }
        } else {
            Self::Io { address, source }
        }
    }
}
