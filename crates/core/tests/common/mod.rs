//! Common test utilities and helpers for pipeline tests.
//!
//! This module provides shared functionality across integration tests:
//! - Test fixtures (catalogs, projects, engines)
//! - Scripted extraction backends
//! - Custom assertions over events and programs

pub mod assertions;
pub mod fixtures;
pub mod scripted;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use scripted::*;
