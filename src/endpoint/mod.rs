//! Remote management endpoint for an in-process object store.
//!
//! A management endpoint exposes two network services: a locate registry
//! that clients consult first, and a connector that serves the object store
//! once the client has been redirected to it. This module controls where
//! both listeners bind and how their combined address is advertised, so
//! clients behind NAT or on multi-homed hosts reach the addresses the
//! operator configured rather than whatever the operating system picks for a
//! wildcard socket. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
