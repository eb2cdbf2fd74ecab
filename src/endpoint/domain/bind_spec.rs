//! Listener bind specification value object.

use super::EndpointDomainError;

/// Listen backlog used when none is configured.
pub const DEFAULT_BACKLOG: u32 = 50;

/// Describes where one listening socket binds.
///
/// A blank or absent host binds the all-interfaces address. A non-blank host
/// is resolved and bound exactly, together with `port` verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindSpec {
    host: Option<String>,
    port: u16,
    backlog: u32,
}

impl BindSpec {
    /// Creates a bind specification for an optional host override.
    ///
    /// The host is trimmed; a blank host is treated as absent.
    #[must_use]
    pub fn new(host: Option<&str>, port: u16) -> Self {
        Self {
            host: normalize_host(host),
            port,
            backlog: DEFAULT_BACKLOG,
        }
    }

    /// Creates a bind specification for the all-interfaces address.
    #[must_use]
    pub const fn wildcard(port: u16) -> Self {
        Self {
            host: None,
            port,
            backlog: DEFAULT_BACKLOG,
        }
    }

    /// Sets the listen backlog.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointDomainError::InvalidBacklog`] when `backlog` is zero.
    pub fn with_backlog(mut self, backlog: u32) -> Result<Self, EndpointDomainError> {
        if backlog == 0 {
            return Err(EndpointDomainError::InvalidBacklog(backlog));
        }
        self.backlog = backlog;
        Ok(self)
    }

    /// Returns the host override, if any.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Returns the requested port. Zero asks the OS for a free port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the listen backlog.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Returns whether the socket binds the all-interfaces address.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        self.host.is_none()
    }
}

pub(super) fn normalize_host(host: Option<&str>) -> Option<String> {
    host.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
