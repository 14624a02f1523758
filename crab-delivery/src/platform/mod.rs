//! Delivery platform adapter
//!
//! ```text
//! PlatformClient ── typed operations
//!       │
//! RequestExecutor ── bearer auth, retry/backoff, Idempotency-Key
//!       │
//! TokenManager ── client-credentials token cache
//!
//! WebhookVerifier ── inbound HMAC check + event decode
//! ```

pub mod client;
pub mod error;
pub mod executor;
pub mod token;
pub mod webhook;

pub use client::{PlatformClient, PlatformEndpoints};
pub use error::PlatformError;
pub use executor::{IDEMPOTENCY_KEY_HEADER, PlatformRequest, RequestExecutor, RetryPolicy};
pub use token::{ClientCredentials, TokenManager};
pub use webhook::{VerifiedDelivery, WebhookError, WebhookEvent, WebhookVerifier};
