//! Management endpoint: a locate registry and a connector that expose an
//! in-process object store to remote management clients.
//!
//! Both listeners bind exactly where they are configured, and the service
//! address advertised to clients is derived from the same configuration.
//!
//! # Architecture
//!
//! The endpoint follows hexagonal architecture principles:
//!
//! - **Domain**: configuration, addresses and object names, with no I/O
//! - **Ports**: binder, object store and connector contracts
//! - **Adapters**: TCP listeners, the locate registry, an in-memory store
//!   and a client
//! - **Services**: the lifecycle orchestrator
//!
//! # Modules
//!
//! - [`endpoint`]: the management endpoint and its collaborators
//! - [`logging`]: tracing subscriber setup for binaries

pub mod endpoint;
pub mod logging;
