//! Error types for endpoint domain validation and parsing.

use std::fmt;
use thiserror::Error;

/// Configuration rule violated by an [`EndpointConfig`](super::EndpointConfig).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigurationRule {
    /// The object store domain is empty after trimming.
    BlankDomain,
    /// The host override cannot be advertised in a service address.
    InvalidHost {
        /// The rejected host.
        host: String,
    },
    /// The registry and connector ports are equal.
    PortsCollide {
        /// The port both listeners were configured with.
        port: u16,
    },
    /// The context name is empty after trimming.
    BlankContext,
    /// The listen backlog is zero.
    ZeroBacklog,
}

impl fmt::Display for ConfigurationRule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankDomain => formatter.write_str("domain must not be blank"),
            Self::InvalidHost { host } => write!(formatter, "host '{host}' is not a valid host"),
            Self::PortsCollide { port } => write!(
                formatter,
                "registry and connector ports must differ (both are {port})"
            ),
            Self::BlankContext => formatter.write_str("context must not be blank"),
            Self::ZeroBacklog => formatter.write_str("listen backlog must be at least 1"),
        }
    }
}

/// Errors returned while constructing endpoint domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointDomainError {
    /// The endpoint configuration violates a rule.
    #[error("invalid endpoint configuration: {0}")]
    InvalidConfiguration(ConfigurationRule),

    /// The listen backlog is zero.
    #[error("listen backlog must be at least 1 (got {0})")]
    InvalidBacklog(u32),

    /// Transitioning between two lifecycle states is invalid.
    #[error("invalid endpoint lifecycle transition: {from} -> {to}")]
    InvalidLifecycleTransition {
        /// Current lifecycle state.
        from: String,
        /// Requested target lifecycle state.
        to: String,
    },
}

/// Error returned when a service address string is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceAddressError {
    /// The input does not match the service address structure.
    #[error("malformed service address '{input}': {reason}")]
    Malformed {
        /// Rejected input.
        input: String,
        /// Which structural rule failed.
        reason: String,
    },
}

impl ServiceAddressError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Errors returned while building or parsing managed object names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectNameError {
    /// The object name is not of the form `domain:key=value[,key=value]*`.
    #[error("malformed object name '{input}': {reason}")]
    Malformed {
        /// Rejected input.
        input: String,
        /// Which structural rule failed.
        reason: String,
    },

    /// A metric key could not be read as a JSON object of strings.
    #[error("invalid metric key '{key}': {reason}")]
    InvalidMetricKey {
        /// Rejected metric key.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },
}

impl ObjectNameError {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            input: input.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Error returned while parsing a lifecycle state from its string form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown endpoint lifecycle state: {0}")]
pub struct ParseEndpointLifecycleStateError(pub String);
