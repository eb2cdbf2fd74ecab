//! Adapter implementations for management endpoint ports.
//!
//! The TCP adapters exchange newline-delimited JSON frames. They stand in
//! for a full remote-call transport, which plugs in through
//! [`ConnectorFactory`](crate::endpoint::ports::ConnectorFactory).

pub mod memory;

mod binder;
mod client;
mod connector;
mod registry;
mod wire;

pub use binder::TcpAddressBinder;
pub use client::{ManagementClient, ManagementClientError};
pub use connector::{TcpConnector, TcpConnectorFactory};
pub use registry::{LocateRegistry, RegistryError, RegistryResult};
