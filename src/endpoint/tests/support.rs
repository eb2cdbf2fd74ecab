//! Port doubles shared by the service tests.

use crate::endpoint::{
    adapters::TcpAddressBinder,
    domain::{BindSpec, EndpointConfig},
    ports::{AddressBinder, BindError, BindResult, ListeningSocket},
};
use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Binder that records every socket it opens and can refuse one call.
#[derive(Debug, Default)]
pub(super) struct RecordingBinder {
    inner: TcpAddressBinder,
    calls: AtomicUsize,
    refuse_call: Option<usize>,
    bound: Mutex<Vec<SocketAddr>>,
}

impl RecordingBinder {
    /// Refuses the `call`th bind (zero based) with `AddressInUse`.
    pub(super) fn refusing(call: usize) -> Self {
        Self {
            refuse_call: Some(call),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) fn bound(&self) -> Vec<SocketAddr> {
        self.bound.lock().expect("bound list lock").clone()
    }
}

#[async_trait]
impl AddressBinder for RecordingBinder {
    async fn bind(&self, spec: &BindSpec) -> BindResult<ListeningSocket> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_call == Some(call) {
            return Err(BindError::from_io(
                SocketAddr::from((Ipv4Addr::LOCALHOST, spec.port())),
                io::Error::from(io::ErrorKind::AddrInUse),
            ));
        }
        let socket = self.inner.bind(spec).await?;
        self.bound
            .lock()
            .expect("bound list lock")
            .push(socket.local_addr());
        Ok(socket)
    }
}

/// Returns a loopback port that was free a moment ago.
pub(super) fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .and_then(|listener| listener.local_addr())
        .expect("ephemeral port")
        .port()
}

/// Loopback configuration with an OS-assigned registry port.
pub(super) fn loopback_config() -> EndpointConfig {
    EndpointConfig::new("test.domain", "test")
        .with_host(Some("127.0.0.1"))
        .with_registry_port(0)
        .with_connector_port(free_port())
}
