//! Endpoint configuration value object.

use super::bind_spec::normalize_host;
use super::service_address::is_valid_host;
use super::{BindSpec, ConfigurationRule, DEFAULT_BACKLOG, EndpointDomainError};
use serde::{Deserialize, Serialize};

/// Where the registry and connector listen, and what they serve.
///
/// All fields have defaults so a configuration file may omit any of them,
/// but the all-default configuration does not validate: the ports collide
/// and the domain and context are blank.
///
/// Deserialisation goes through the builders, so hosts, contexts and domains
/// read from a file are normalised exactly like programmatic ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEndpointConfig")]
pub struct EndpointConfig {
    host: Option<String>,
    registry_port: u16,
    connector_port: u16,
    context: String,
    domain: String,
    backlog: u32,
}

/// Field-for-field wire form of [`EndpointConfig`].
#[derive(Deserialize)]
#[serde(default)]
struct RawEndpointConfig {
    host: Option<String>,
    registry_port: u16,
    connector_port: u16,
    context: String,
    domain: String,
    backlog: u32,
}

impl Default for RawEndpointConfig {
    fn default() -> Self {
        Self {
            host: None,
            registry_port: 0,
            connector_port: 0,
            context: String::new(),
            domain: String::new(),
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl From<RawEndpointConfig> for EndpointConfig {
    fn from(raw: RawEndpointConfig) -> Self {
        let normalized = Self::new(raw.domain, raw.context)
            .with_host(raw.host.as_deref())
            .with_registry_port(raw.registry_port)
            .with_connector_port(raw.connector_port);
        // A zero backlog is kept so `validate` can report it.
        Self {
            backlog: raw.backlog,
            ..normalized
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: None,
            registry_port: 0,
            connector_port: 0,
            context: String::new(),
            domain: String::new(),
            backlog: DEFAULT_BACKLOG,
        }
    }
}

impl EndpointConfig {
    /// Creates a configuration for the given domain and context with no host
    /// override and unset ports.
    #[must_use]
    pub fn new(domain: impl Into<String>, context: impl Into<String>) -> Self {
        Self::default().with_domain(domain).with_context(context)
    }

    /// Sets the host override. Blank values clear it.
    #[must_use]
    pub fn with_host(mut self, host: Option<&str>) -> Self {
        self.host = normalize_host(host);
        self
    }

    /// Sets the locate registry port.
    #[must_use]
    pub const fn with_registry_port(mut self, port: u16) -> Self {
        self.registry_port = port;
        self
    }

    /// Sets the connector port.
    #[must_use]
    pub const fn with_connector_port(mut self, port: u16) -> Self {
        self.connector_port = port;
        self
    }

    /// Sets the context name the connector is published under.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into().trim().to_owned();
        self
    }

    /// Sets the object store domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into().trim().to_owned();
        self
    }

    /// Sets the listen backlog for both listeners.
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
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Returns the locate registry port.
    #[must_use]
    pub const fn registry_port(&self) -> u16 {
        self.registry_port
    }

    /// Returns the connector port.
    #[must_use]
    pub const fn connector_port(&self) -> u16 {
        self.connector_port
    }

    /// Returns the context name.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Returns the object store domain.
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the listen backlog.
    #[must_use]
    pub const fn backlog(&self) -> u32 {
        self.backlog
    }

    /// Checks the configuration invariants.
    ///
    /// Rules are checked in order: domain, host, ports, context, backlog.
    ///
    /// # Errors
    ///
    /// Returns the first violated [`ConfigurationRule`].
    pub fn validate(&self) -> Result<(), ConfigurationRule> {
        if self.domain.trim().is_empty() {
            return Err(ConfigurationRule::BlankDomain);
        }
        if let Some(host) = self.host()
            && !is_valid_host(host)
        {
            return Err(ConfigurationRule::InvalidHost {
                host: host.to_owned(),
            });
        }
        if self.registry_port == self.connector_port {
            return Err(ConfigurationRule::PortsCollide {
                port: self.registry_port,
            });
        }
        if self.context.trim().is_empty() {
            return Err(ConfigurationRule::BlankContext);
        }
        if self.backlog == 0 {
            return Err(ConfigurationRule::ZeroBacklog);
        }
        Ok(())
    }

    /// Returns the bind specification for the locate registry listener.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointDomainError::InvalidBacklog`] when the backlog is
    /// zero.
    pub fn registry_bind_spec(&self) -> Result<BindSpec, EndpointDomainError> {
        self.bind_spec(self.registry_port)
    }

    /// Returns the bind specification for the connector listener.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointDomainError::InvalidBacklog`] when the backlog is
    /// zero.
    pub fn connector_bind_spec(&self) -> Result<BindSpec, EndpointDomainError> {
        self.bind_spec(self.connector_port)
    }

    /// Returns a copy with the ports replaced by the ones actually bound.
    #[must_use]
    pub fn with_bound_ports(&self, registry_port: u16, connector_port: u16) -> Self {
        self.clone()
            .with_registry_port(registry_port)
            .with_connector_port(connector_port)
    }

    fn bind_spec(&self, port: u16) -> Result<BindSpec, EndpointDomainError> {
        BindSpec::new(self.host(), port).with_backlog(self.backlog)
    }
}
