//! Webhook authenticity and event decoding
//!
//! Each delivery is signed with HMAC-SHA256 keyed by `secret + sequence_guid`,
//! where the sequence guid is unique per delivery attempt. The signature is
//! checked in constant time before the body is parsed at all.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use shared::error::AppError;
use shared::platform::{
    EVENT_MENU_UPLOAD_RESULT, EVENT_ORDER_NEW, EVENT_ORDER_STATUS_UPDATE,
    EVENT_RIDER_STATUS_UPDATE, MenuEventBody, MenuUploadResult, ORDER_BODY_FIELD, ReceivedOrder,
    RiderEventBody,
};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_SEQUENCE_GUID: &str = "x-deliveroo-sequence-guid";
pub const HEADER_SIGNATURE: &str = "x-deliveroo-hmac-sha256";
pub const HEADER_PAYLOAD_TYPE: &str = "x-deliveroo-payload-type";
pub const HEADER_WEBHOOK_VERSION: &str = "x-deliveroo-webhook-version";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing header {0}")]
    MissingHeader(&'static str),
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    Malformed(String),
    #[error("HMAC key rejected")]
    Key,
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingHeader(name) => AppError::webhook_header_missing(name),
            WebhookError::InvalidSignature => AppError::webhook_signature_invalid(),
            WebhookError::Malformed(msg) => AppError::webhook_payload_invalid(msg),
            WebhookError::Key => AppError::internal("webhook HMAC key rejected"),
        }
    }
}

/// Decoded webhook event
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    OrderNew(Box<ReceivedOrder>),
    OrderStatusUpdate(Box<ReceivedOrder>),
    RiderStatusUpdate(RiderEventBody),
    MenuUploadResult(MenuUploadResult),
    /// Event name this build does not handle; acknowledged and ignored
    Unknown { event: String },
}

impl WebhookEvent {
    pub fn name(&self) -> &str {
        match self {
            Self::OrderNew(_) => EVENT_ORDER_NEW,
            Self::OrderStatusUpdate(_) => EVENT_ORDER_STATUS_UPDATE,
            Self::RiderStatusUpdate(_) => EVENT_RIDER_STATUS_UPDATE,
            Self::MenuUploadResult(_) => EVENT_MENU_UPLOAD_RESULT,
            Self::Unknown { event } => event,
        }
    }
}

/// Delivery headers that are informational only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryMeta {
    pub sequence_guid: String,
    pub payload_type: Option<String>,
    pub webhook_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedDelivery {
    pub meta: DeliveryMeta,
    pub event: WebhookEvent,
}

#[derive(Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    body: Value,
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn keyed_mac(&self, nonce: &str) -> Result<HmacSha256, WebhookError> {
        let mut key = Vec::with_capacity(self.secret.len() + nonce.len());
        key.extend_from_slice(self.secret.as_bytes());
        key.extend_from_slice(nonce.as_bytes());
        HmacSha256::new_from_slice(&key).map_err(|_| WebhookError::Key)
    }

    /// Hex HMAC-SHA256 of `payload` for the given delivery nonce
    pub fn sign(&self, payload: &[u8], nonce: &str) -> Result<String, WebhookError> {
        let mut mac = self.keyed_mac(nonce)?;
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check of a hex signature
    pub fn verify(&self, payload: &[u8], nonce: &str, signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        let Ok(mut mac) = self.keyed_mac(nonce) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    }

    /// Authenticate a delivery and decode its event.
    ///
    /// The body is only parsed once the signature has been verified.
    pub fn parse_event(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<VerifiedDelivery, WebhookError> {
        let nonce = required_header(headers, HEADER_SEQUENCE_GUID)?;
        let signature = required_header(headers, HEADER_SIGNATURE)?;

        if !self.verify(body, nonce, signature) {
            return Err(WebhookError::InvalidSignature);
        }

        let meta = DeliveryMeta {
            sequence_guid: nonce.to_string(),
            payload_type: optional_header(headers, HEADER_PAYLOAD_TYPE),
            webhook_version: optional_header(headers, HEADER_WEBHOOK_VERSION),
        };
        let event = decode_event(body)?;

        Ok(VerifiedDelivery { meta, event })
    }
}

fn required_header<'a>(
    headers: &'a HeaderMap,
    name: &'static str,
) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(WebhookError::MissingHeader(name))
}

fn optional_header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn decode_event(body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let envelope: RawEnvelope =
        serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))?;

    let malformed = |e: serde_json::Error| {
        WebhookError::Malformed(format!("{} body: {e}", envelope.event))
    };

    let event = match envelope.event.as_str() {
        EVENT_ORDER_NEW => WebhookEvent::OrderNew(Box::new(received_order(&envelope)?)),
        EVENT_ORDER_STATUS_UPDATE => {
            WebhookEvent::OrderStatusUpdate(Box::new(received_order(&envelope)?))
        }
        EVENT_RIDER_STATUS_UPDATE => {
            WebhookEvent::RiderStatusUpdate(
                serde_json::from_value(envelope.body.clone()).map_err(malformed)?,
            )
        }
        EVENT_MENU_UPLOAD_RESULT => {
            let body: MenuEventBody =
                serde_json::from_value(envelope.body.clone()).map_err(malformed)?;
            WebhookEvent::MenuUploadResult(body.menu_upload_result)
        }
        _ => WebhookEvent::Unknown {
            event: envelope.event.clone(),
        },
    };
    Ok(event)
}

fn received_order(envelope: &RawEnvelope) -> Result<ReceivedOrder, WebhookError> {
    let raw = envelope.body.get(ORDER_BODY_FIELD).cloned().ok_or_else(|| {
        WebhookError::Malformed(format!("{} body: missing order", envelope.event))
    })?;
    ReceivedOrder::from_value(raw)
        .map_err(|e| WebhookError::Malformed(format!("{} body: {e}", envelope.event)))
}
