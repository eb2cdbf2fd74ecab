//! Tokio-backed address binder.

use crate::endpoint::{
    domain::BindSpec,
    ports::{AddressBinder, BindError, BindResult, ListeningSocket},
};
use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket, lookup_host};
use tracing::{info, warn};

/// Binds TCP listeners with an explicit backlog.
///
/// Host overrides are resolved with the system resolver; IPv4 results are
/// preferred over IPv6 when both are returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpAddressBinder;

impl TcpAddressBinder {
    /// Creates a binder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AddressBinder for TcpAddressBinder {
    async fn bind(&self, spec: &BindSpec) -> BindResult<ListeningSocket> {
        let address = match spec.host() {
            Some(host) => {
                let resolved = resolve(host, spec.port()).await?;
                if spec.port() == 0 {
                    warn!(host, "host override without a port, the OS will choose one");
                }
                info!(address = %resolved, host, backlog = spec.backlog(), "binding overridden address");
                resolved
            }
            None => {
                let wildcard = SocketAddr::from((Ipv4Addr::UNSPECIFIED, spec.port()));
                info!(address = %wildcard, backlog = spec.backlog(), "binding wildcard address");
                wildcard
            }
        };

        let listener = listen(address, spec.backlog())?;
        ListeningSocket::new(listener, spec.clone())
            .map_err(|source| BindError::from_io(address, source))
    }
}

async fn resolve(host: &str, port: u16) -> BindResult<SocketAddr> {
    let candidates: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| BindError::UnresolvableHost {
            host: host.to_owned(),
            source: Some(source),
        })?
        .collect();

    candidates
        .iter()
        .find(|candidate| candidate.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| BindError::UnresolvableHost {
            host: host.to_owned(),
            source: None,
        })
}

fn listen(address: SocketAddr, backlog: u32) -> BindResult<TcpListener> {
    let to_bind_error = move |source: io::Error| BindError::from_io(address, source);

    let socket = if address.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(to_bind_error)?;
    #[cfg(unix)]
    socket.set_reuseaddr(true).map_err(to_bind_error)?;
    socket.bind(address).map_err(to_bind_error)?;
    socket.listen(backlog).map_err(to_bind_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::IpAddr;

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn host_override_binds_exact_address() {
        let socket = TcpAddressBinder::new()
            .bind(&BindSpec::new(Some("127.0.0.1"), 0))
            .await
            .expect("bind should succeed");

        assert_eq!(socket.local_addr().ip(), IpAddr::from(Ipv4Addr::LOCALHOST));
        assert_ne!(socket.local_addr().port(), 0);
        assert_eq!(socket.spec().host(), Some("127.0.0.1"));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn blank_host_binds_wildcard() {
        let socket = TcpAddressBinder::new()
            .bind(&BindSpec::new(Some(" "), 0))
            .await
            .expect("bind should succeed");

        assert!(socket.local_addr().ip().is_unspecified());
        assert_ne!(socket.local_addr().port(), 0);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn occupied_port_reports_address_in_use() {
        let binder = TcpAddressBinder::new();
        let first = binder
            .bind(&BindSpec::new(Some("127.0.0.1"), 0))
            .await
            .expect("first bind should succeed");

        let result = binder
            .bind(&BindSpec::new(Some("127.0.0.1"), first.local_addr().port()))
            .await;

        assert!(matches!(result, Err(BindError::AddressInUse { .. })));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn unresolvable_host_is_reported() {
        let result = TcpAddressBinder::new()
            .bind(&BindSpec::new(Some("no-such-host.invalid"), 7114))
            .await;

        assert!(matches!(result, Err(BindError::UnresolvableHost { .. })));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_socket_releases_port() {
        let binder = TcpAddressBinder::new();
        let first = binder
            .bind(&BindSpec::new(Some("127.0.0.1"), 0))
            .await
            .expect("first bind should succeed");
        let port = first.local_addr().port();
        drop(first);

        let second = binder.bind(&BindSpec::new(Some("127.0.0.1"), port)).await;

        assert!(second.is_ok(), "port {port} should be free again");
    }
}
