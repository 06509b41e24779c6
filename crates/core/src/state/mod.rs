//! Pipeline state lifecycle.
//!
//! This module provides:
//! - Dialog transitions checked against the transition table
//! - Error recording and pausing on questions
//! - `StateStore` for `state.json` and per-stage snapshots

pub mod store;
pub mod transitions;

pub use store::{StateError, StateResult, StateStore};
pub use transitions::{create_state, emit, record_error, transition};
