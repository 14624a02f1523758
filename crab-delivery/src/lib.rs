//! crab-delivery - delivery platform integration
//!
//! - Receives and verifies platform webhooks
//! - Reconciles platform orders into the internal order model, exactly once
//! - Talks back to the platform API (OAuth2, retries, idempotency keys)

pub mod api;
pub mod config;
pub mod db;
pub mod live;
pub mod platform;
pub mod reconcile;
pub mod state;

#[cfg(test)]
mod test_support;
