//! Domain model for management endpoint configuration and addressing.
//!
//! The endpoint domain models listener bind specifications, the combined
//! service address string, the configuration-then-start lifecycle and the
//! identifiers of managed objects. Socket and transport concerns remain
//! outside this boundary.

mod bind_spec;
mod config;
mod error;
mod ids;
mod lifecycle;
mod managed_object;
mod metric_key;
mod object_name;
mod service_address;

pub use bind_spec::{BindSpec, DEFAULT_BACKLOG};
pub use config::EndpointConfig;
pub use error::{
    ConfigurationRule, EndpointDomainError, ObjectNameError, ParseEndpointLifecycleStateError,
    ServiceAddressError,
};
pub use ids::EndpointId;
pub use lifecycle::EndpointLifecycleState;
pub use managed_object::ManagedObject;
pub use metric_key::MetricKey;
pub use object_name::ObjectName;
pub use service_address::{DEFAULT_HOST, HostPort, ServiceAddress};
