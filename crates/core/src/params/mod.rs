//! Physical parameter slots (points, numbers, flags).

pub mod store;

pub use store::{ParameterStore, StoreError, StoreResult};
