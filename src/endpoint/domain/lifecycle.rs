//! Lifecycle state of a management endpoint.

use super::{EndpointDomainError, ParseEndpointLifecycleStateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a management endpoint.
///
/// Configuration is mutable in `Unconfigured` and `Validated`; changing it
/// in `Validated` returns the endpoint to `Unconfigured`. `Started` freezes
/// the configuration. `Stopped` is terminal: a stopped endpoint is never
/// restarted in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointLifecycleState {
    /// Configuration has not been validated since it last changed.
    Unconfigured,
    /// Configuration passed validation but the listeners are not running.
    Validated,
    /// Registry and connector are running.
    Started,
    /// Listeners were released after a successful start.
    Stopped,
}

impl EndpointLifecycleState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Validated => "validated",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }

    /// Returns whether configuration may change in this state.
    #[must_use]
    pub const fn accepts_configuration(self) -> bool {
        matches!(self, Self::Unconfigured | Self::Validated)
    }

    /// Returns whether transition to `target` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (
                Self::Unconfigured | Self::Validated,
                Self::Unconfigured | Self::Validated
            ) | (Self::Validated, Self::Started)
                | (Self::Started, Self::Stopped)
        )
    }

    /// Returns `target` when the transition is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointDomainError::InvalidLifecycleTransition`] when the
    /// transition is not allowed.
    pub fn transition_to(self, target: Self) -> Result<Self, EndpointDomainError> {
        if self.can_transition_to(target) {
            return Ok(target);
        }

        Err(EndpointDomainError::InvalidLifecycleTransition {
            from: self.as_str().to_owned(),
            to: target.as_str().to_owned(),
        })
    }
}

impl fmt::Display for EndpointLifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for EndpointLifecycleState {
    type Error = ParseEndpointLifecycleStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "unconfigured" => Ok(Self::Unconfigured),
            "validated" => Ok(Self::Validated),
            "started" => Ok(Self::Started),
            "stopped" => Ok(Self::Stopped),
            _ => Err(ParseEndpointLifecycleStateError(value.to_owned())),
        }
    }
}
