//! Shared types for the delivery integration
//!
//! Error system, internal order model and the delivery platform's wire model,
//! used by the service crate and its tests.

pub mod error;
pub mod order;
pub mod platform;

// Re-exports
pub use serde::{Deserialize, Serialize};
