//! Unified error system
//!
//! - [`ErrorCode`]: Standardized error codes for all error types
//! - [`ErrorCategory`]: Classification of errors by domain
//! - [`AppError`]: Rich error type with codes, messages, and details
//! - [`ApiResponse`]: Unified API response format
//!
//! # Error Code Ranges
//!
//! - 1xxx: Webhook authentication errors
//! - 8xxx: Delivery platform payload errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::webhook_header_missing("x-deliveroo-sequence-guid");
//! assert_eq!(err.code, ErrorCode::WebhookSignatureMissing);
//!
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(1101));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError};
