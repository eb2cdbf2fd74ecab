//! Locate registry: the name directory clients consult first.

use super::wire::{RegistryReply, RegistryRequest, spawn_accept_loop};
use crate::endpoint::{domain::ServiceAddress, ports::ListeningSocket};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result type for locate registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors returned by the locate registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A name is already bound.
    #[error("name '{0}' is already bound")]
    AlreadyBound(String),

    /// A name is not bound.
    #[error("name '{0}' is not bound")]
    NotBound(String),

    /// The directory cannot be read or written.
    #[error("registry directory unavailable: {0}")]
    Unavailable(String),
}

/// Name directory mapping context names to service addresses.
#[derive(Debug, Clone, Default)]
struct Directory {
    entries: Arc<RwLock<BTreeMap<String, ServiceAddress>>>,
}

impl Directory {
    fn bind(&self, name: &str, address: ServiceAddress, replace: bool) -> RegistryResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|err| RegistryError::Unavailable(err.to_string()))?;
        if !replace && entries.contains_key(name) {
            return Err(RegistryError::AlreadyBound(name.to_owned()));
        }
        entries.insert(name.to_owned(), address);
        Ok(())
    }

    fn unbind(&self, name: &str) -> RegistryResult<ServiceAddress> {
        self.entries
            .write()
            .map_err(|err| RegistryError::Unavailable(err.to_string()))?
            .remove(name)
            .ok_or_else(|| RegistryError::NotBound(name.to_owned()))
    }

    fn lookup(&self, name: &str) -> RegistryResult<Option<ServiceAddress>> {
        let entries = self
            .entries
            .read()
            .map_err(|err| RegistryError::Unavailable(err.to_string()))?;
        Ok(entries.get(name).cloned())
    }

    fn list(&self) -> RegistryResult<Vec<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|err| RegistryError::Unavailable(err.to_string()))?;
        Ok(entries.keys().cloned().collect())
    }

    fn answer(&self, request: RegistryRequest) -> RegistryReply {
        let outcome = match request {
            RegistryRequest::Lookup { name } => self.lookup(&name).map(|found| match found {
                Some(address) => RegistryReply::Found { address },
                None => RegistryReply::NotFound { name },
            }),
            RegistryRequest::List => self.list().map(|names| RegistryReply::Names { names }),
        };
        outcome.unwrap_or_else(|err| RegistryReply::Error {
            message: err.to_string(),
        })
    }
}

/// A running locate registry.
///
/// The registry starts with an empty directory. Its accept loop runs on its
/// own task until [`LocateRegistry::shutdown`] is awaited or the registry is
/// dropped; either releases the listening socket.
#[derive(Debug)]
pub struct LocateRegistry {
    directory: Directory,
    local_addr: SocketAddr,
    accept_loop: Option<JoinHandle<()>>,
}

impl LocateRegistry {
    /// Starts serving an empty directory on `listener`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn start(listener: ListeningSocket) -> Self {
        let local_addr = listener.local_addr();
        let directory = Directory::default();
        let served = directory.clone();
        let accept_loop = spawn_accept_loop(
            listener.into_listener(),
            "locate_registry",
            Arc::new(move |request: RegistryRequest| served.answer(request)),
        );
        info!(address = %local_addr, "locate registry listening");

        Self {
            directory,
            local_addr,
            accept_loop: Some(accept_loop),
        }
    }

    /// Returns the address the registry listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns whether the accept loop is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.accept_loop
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Binds `name` to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyBound`] when the name is taken.
    pub fn bind(&self, name: &str, address: ServiceAddress) -> RegistryResult<()> {
        self.directory.bind(name, address, false)?;
        debug!(name, "bound name in locate registry");
        Ok(())
    }

    /// Binds `name` to `address`, replacing any existing binding.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unavailable`] when the directory is
    /// unusable.
    pub fn rebind(&self, name: &str, address: ServiceAddress) -> RegistryResult<()> {
        self.directory.bind(name, address, true)
    }

    /// Removes the binding for `name` and returns the address it held.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotBound`] when the name is not bound.
    pub fn unbind(&self, name: &str) -> RegistryResult<ServiceAddress> {
        self.directory.unbind(name)
    }

    /// Returns the address bound to `name`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unavailable`] when the directory is
    /// unusable.
    pub fn lookup(&self, name: &str) -> RegistryResult<Option<ServiceAddress>> {
        self.directory.lookup(name)
    }

    /// Returns every bound name in lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Unavailable`] when the directory is
    /// unusable.
    pub fn list(&self) -> RegistryResult<Vec<String>> {
        self.directory.list()
    }

    /// Stops the accept loop and waits until the listener is released.
    pub async fn shutdown(&mut self) {
        let Some(handle) = self.accept_loop.take() else {
            return;
        };
        handle.abort();
        if let Err(err) = handle.await
            && !err.is_cancelled()
        {
            warn!(address = %self.local_addr, error = %err, "locate registry loop failed");
        }
        info!(address = %self.local_addr, "locate registry stopped");
    }
}

impl Drop for LocateRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.accept_loop.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{
        adapters::TcpAddressBinder,
        domain::{BindSpec, EndpointConfig},
        ports::AddressBinder,
    };
    use rstest::rstest;

    async fn start_registry() -> LocateRegistry {
        let listener = TcpAddressBinder::new()
            .bind(&BindSpec::new(Some("127.0.0.1"), 0))
            .await
            .expect("bind should succeed");
        LocateRegistry::start(listener)
    }

    fn address(context: &str) -> ServiceAddress {
        let config = EndpointConfig::new("domain", context)
            .with_registry_port(1)
            .with_connector_port(2);
        ServiceAddress::build(&config).expect("valid config")
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn directory_starts_empty() {
        let registry = start_registry().await;

        assert_eq!(registry.list().expect("list"), Vec::<String>::new());
        assert!(registry.is_active());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn bind_rejects_duplicate_names() {
        let registry = start_registry().await;
        registry.bind("demo", address("demo")).expect("first bind");

        let result = registry.bind("demo", address("other"));

        assert_eq!(result, Err(RegistryError::AlreadyBound("demo".to_owned())));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn rebind_replaces_and_unbind_removes() {
        let registry = start_registry().await;
        registry.bind("demo", address("demo")).expect("bind");

        registry.rebind("demo", address("other")).expect("rebind");
        let replaced = registry.lookup("demo").expect("lookup");
        let removed = registry.unbind("demo").expect("unbind");

        assert_eq!(replaced, Some(address("other")));
        assert_eq!(removed, address("other"));
        assert_eq!(
            registry.unbind("demo"),
            Err(RegistryError::NotBound("demo".to_owned()))
        );
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_stops_loop() {
        let mut registry = start_registry().await;

        registry.shutdown().await;

        assert!(!registry.is_active());
    }
}
