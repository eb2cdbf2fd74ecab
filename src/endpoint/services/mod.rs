//! Service layer for management endpoint orchestration.

mod endpoint;

pub use endpoint::{
    ManagementEndpoint, ManagementEndpointError, ManagementEndpointResult, StartupError,
    TcpManagementEndpoint,
};
