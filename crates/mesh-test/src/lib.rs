//! Integration test infrastructure for the mesh control plane
//!
//! Provides:
//! - Recording subsystem, link-layer and transport doubles
//! - Neighbor and management-message fixtures
//! - Ordering and response assertion helpers

pub mod fixtures;
mod mocks;
mod verification;

pub use fixtures::*;
pub use mocks::*;
pub use verification::*;
