//! Delivery platform wire model
//!
//! Types mirror the platform's JSON exactly (snake_case, minor-unit money).
//! Conversion into the internal order model happens in the reconciler.

pub mod order;
pub mod requests;
pub mod webhook;

pub use order::*;
pub use requests::*;
pub use webhook::*;
