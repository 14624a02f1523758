//! Delivery platform webhooks
//!
//! POST /webhooks/deliveroo/orders
//! POST /webhooks/deliveroo/riders
//!
//! 签名校验需要原始 body。签名有效后一律返回 200，无论下游结果如何，
//! 避免平台重投我们无法处理的事件。

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use shared::error::AppError;

use crate::platform::WebhookError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let delivery = match state.verifier.parse_event(&headers, &body) {
        Ok(delivery) => delivery,
        Err(WebhookError::Malformed(reason)) => {
            // 签名有效但无法解码：重投也没用
            tracing::error!(reason = %reason, "Signed webhook payload could not be decoded");
            return Ok(Json(WebhookAck { status: "failed" }));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected platform webhook");
            return Err(e.into());
        }
    };

    tracing::info!(
        event = delivery.event.name(),
        sequence_guid = %delivery.meta.sequence_guid,
        payload_type = delivery.meta.payload_type.as_deref().unwrap_or("-"),
        "Received platform webhook"
    );

    let status = match state.reconciler.handle_event(&delivery.event).await {
        Ok(outcome) => outcome.ack_status(),
        Err(e) => {
            tracing::error!(
                event = delivery.event.name(),
                error = %e,
                "Webhook reconciliation failed"
            );
            "failed"
        }
    };

    Ok(Json(WebhookAck { status }))
}
