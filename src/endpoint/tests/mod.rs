//! Unit tests for the endpoint module.
//!
//! Service tests drive the lifecycle through port doubles so startup failures
//! can be injected at every stage.

mod service_tests;
mod support;
