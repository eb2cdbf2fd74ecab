//! Combined service address of a management endpoint.
//!
//! The address string tells a remote client both where the connector
//! listens and which locate registry publishes it:
//!
//! ```text
//! service:jmx:rmi://<connector>/jndi/rmi://<registry>/<context>
//! ```
//!
//! The connector address comes first because the transport resolves it
//! first; the registry address is the secondary locator used once the
//! client has been redirected.

use super::{ConfigurationRule, EndpointConfig, ServiceAddressError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host advertised when no host override is configured.
pub const DEFAULT_HOST: &str = "localhost";

const SERVICE_PREFIX: &str = "service:jmx:rmi://";
const REGISTRY_LOCATOR: &str = "/jndi/rmi://";

/// Host and optional port of one advertised listener.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    host: String,
    port: u16,
}

impl HostPort {
    /// Creates an advertised address, normalising a blank or absent host to
    /// [`DEFAULT_HOST`].
    #[must_use]
    pub fn new(host: Option<&str>, port: u16) -> Self {
        let normalized = host
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_HOST);
        Self {
            host: normalized.to_owned(),
            port,
        }
    }

    /// Returns the advertised host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the advertised port; zero means no port was advertised.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    fn parse(segment: &str, input: &str) -> Result<Self, ServiceAddressError> {
        if segment.is_empty() {
            return Err(ServiceAddressError::malformed(input, "empty host segment"));
        }

        let (host, port) = if let Some(bracketed) = segment.strip_prefix('[') {
            let (host, after) = bracketed
                .split_once(']')
                .ok_or_else(|| ServiceAddressError::malformed(input, "unclosed '[' in host"))?;
            let port = match after {
                "" => None,
                _ => Some(after.strip_prefix(':').ok_or_else(|| {
                    ServiceAddressError::malformed(input, "unexpected text after ']'")
                })?),
            };
            (host, port)
        } else {
            match segment.split_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (segment, None),
            }
        };

        if !is_valid_host(host) {
            return Err(ServiceAddressError::malformed(
                input,
                format!("invalid host '{host}'"),
            ));
        }

        let parsed_port = match port {
            None => 0,
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ServiceAddressError::malformed(
                        input,
                        format!("invalid port '{raw}'"),
                    ));
                }
            },
        };

        Ok(Self {
            host: host.to_owned(),
            port: parsed_port,
        })
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(formatter, "[{}]", self.host)?;
        } else {
            formatter.write_str(&self.host)?;
        }
        if self.port > 0 {
            write!(formatter, ":{}", self.port)?;
        }
        Ok(())
    }
}

/// Parsed form of the service address string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceAddress {
    connector: HostPort,
    registry: HostPort,
    context: String,
}

impl ServiceAddress {
    /// Builds the service address advertised for `config`.
    ///
    /// # Errors
    ///
    /// Returns the violated [`ConfigurationRule`] when the configuration does
    /// not validate.
    pub fn build(config: &EndpointConfig) -> Result<Self, ConfigurationRule> {
        config.validate()?;
        Ok(Self {
            connector: HostPort::new(config.host(), config.connector_port()),
            registry: HostPort::new(config.host(), config.registry_port()),
            context: config.context().to_owned(),
        })
    }

    /// Parses a service address string.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceAddressError::Malformed`] when the input does not
    /// have the required scheme and segment structure.
    pub fn parse(input: &str) -> Result<Self, ServiceAddressError> {
        let rest = input.strip_prefix(SERVICE_PREFIX).ok_or_else(|| {
            ServiceAddressError::malformed(input, format!("expected prefix '{SERVICE_PREFIX}'"))
        })?;
        let (connector, registry_and_context) =
            rest.split_once(REGISTRY_LOCATOR).ok_or_else(|| {
                ServiceAddressError::malformed(
                    input,
                    format!("expected registry locator '{REGISTRY_LOCATOR}'"),
                )
            })?;
        let (registry, context) = registry_and_context
            .split_once('/')
            .ok_or_else(|| ServiceAddressError::malformed(input, "missing context"))?;

        if context.is_empty() || context.trim() != context {
            return Err(ServiceAddressError::malformed(
                input,
                "context must be non-empty without surrounding whitespace",
            ));
        }

        Ok(Self {
            connector: HostPort::parse(connector, input)?,
            registry: HostPort::parse(registry, input)?,
            context: context.to_owned(),
        })
    }

    /// Returns the connector address, the primary locator.
    #[must_use]
    pub const fn connector(&self) -> &HostPort {
        &self.connector
    }

    /// Returns the locate registry address.
    #[must_use]
    pub const fn registry(&self) -> &HostPort {
        &self.registry
    }

    /// Returns the context name the connector is published under.
    #[must_use]
    pub fn context(&self) -> &str {
        &self.context
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{SERVICE_PREFIX}{}{REGISTRY_LOCATOR}{}/{}",
            self.connector, self.registry, self.context
        )
    }
}

impl FromStr for ServiceAddress {
    type Err = ServiceAddressError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ServiceAddress {
    type Error = ServiceAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ServiceAddress> for String {
    fn from(value: ServiceAddress) -> Self {
        value.to_string()
    }
}

/// Returns whether `host` can appear in a service address unescaped.
pub(super) fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|character| !character.is_whitespace() && !"/[]@?#".contains(character))
}
