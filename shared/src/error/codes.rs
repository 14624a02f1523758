//! Unified error codes for the delivery integration
//!
//! Error codes are organized by category:
//! - 1xxx: Webhook authentication errors
//! - 8xxx: Delivery platform payload errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so they serialize compactly
/// and survive the trip to non-Rust consumers unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 1xxx: Auth ====================
    /// Webhook delivery is missing its nonce or signature header
    WebhookSignatureMissing = 1101,
    /// Webhook signature does not match the payload
    WebhookSignatureInvalid = 1102,

    // ==================== 8xxx: Platform ====================
    /// Webhook body could not be decoded
    WebhookPayloadInvalid = 8101,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::WebhookSignatureMissing => "Webhook signature headers are missing",
            ErrorCode::WebhookSignatureInvalid => "Webhook signature is invalid",
            ErrorCode::WebhookPayloadInvalid => "Webhook payload is invalid",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1101 => Ok(ErrorCode::WebhookSignatureMissing),
            1102 => Ok(ErrorCode::WebhookSignatureInvalid),
            8101 => Ok(ErrorCode::WebhookPayloadInvalid),
            9001 => Ok(ErrorCode::InternalError),
            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::WebhookSignatureMissing.code(), 1101);
        assert_eq!(ErrorCode::WebhookSignatureInvalid.code(), 1102);
        assert_eq!(ErrorCode::WebhookPayloadInvalid.code(), 8101);
        assert_eq!(ErrorCode::InternalError.code(), 9001);
    }

    #[test]
    fn test_try_from_known_and_unknown() {
        assert_eq!(ErrorCode::try_from(1101), Ok(ErrorCode::WebhookSignatureMissing));
        assert_eq!(ErrorCode::try_from(8101), Ok(ErrorCode::WebhookPayloadInvalid));
        assert_eq!(ErrorCode::try_from(4242), Err(InvalidErrorCode(4242)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::WebhookPayloadInvalid).unwrap();
        assert_eq!(json, "8101");

        let code: ErrorCode = serde_json::from_str("1102").unwrap();
        assert_eq!(code, ErrorCode::WebhookSignatureInvalid);

        assert!(serde_json::from_str::<ErrorCode>("77").is_err());
    }
}
