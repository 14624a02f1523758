use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use crab_delivery::api::create_router;
use crab_delivery::db::{MemoryAddressRepository, MemoryOrderRepository, MemoryProductRepository};
use crab_delivery::db::OrderRepository;
use crab_delivery::live::LiveEventHub;
use crab_delivery::platform::webhook::{HEADER_SEQUENCE_GUID, HEADER_SIGNATURE};
use crab_delivery::platform::{PlatformError, WebhookVerifier};
use crab_delivery::reconcile::{AddressResolver, OrderReconciler, SyncReporter, SyncStatusSink};
use crab_delivery::state::AppState;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use shared::order::{OrderSource, OrderStatus, PlatformRef};
use shared::platform::{SyncStatus, SyncStatusReport};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

#[derive(Default)]
struct CapturedReports(Mutex<Vec<(String, SyncStatus)>>);

#[async_trait]
impl SyncStatusSink for CapturedReports {
    async fn send_sync_status(
        &self,
        platform_order_id: &str,
        report: &SyncStatusReport,
    ) -> Result<(), PlatformError> {
        self.0
            .lock()
            .unwrap()
            .push((platform_order_id.to_string(), report.status()));
        Ok(())
    }
}

struct App {
    router: Router,
    state: AppState,
    orders: Arc<MemoryOrderRepository>,
    reports: Arc<CapturedReports>,
}

fn app() -> App {
    let orders = Arc::new(MemoryOrderRepository::new());
    let reports = Arc::new(CapturedReports::default());
    let events = LiveEventHub::new();
    let reconciler = OrderReconciler::new(
        orders.clone(),
        Arc::new(MemoryProductRepository::new()),
        AddressResolver::new(Arc::new(MemoryAddressRepository::new()), 5),
        Arc::new(events.clone()),
        SyncReporter::new(reports.clone()),
    );
    let state = AppState::new(WebhookVerifier::new(SECRET), reconciler, events);
    App {
        router: create_router(state.clone()),
        state,
        orders,
        reports,
    }
}

fn signed_request(path: &str, body: &Value, nonce: &str) -> Request<Body> {
    let bytes = serde_json::to_vec(body).unwrap();
    let signature = WebhookVerifier::new(SECRET).sign(&bytes, nonce).unwrap();
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header(HEADER_SEQUENCE_GUID, nonce)
        .header(HEADER_SIGNATURE, signature)
        .body(Body::from(bytes))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn order_event(event: &str, status: &str) -> Value {
    json!({
        "event": event,
        "body": {
            "order": {
                "id": "gb:abc123",
                "display_id": "A123",
                "total_price": {"fractional": 1250, "currency_code": "EUR"},
                "status": status,
                "delivery": {
                    "delivery_fee": {"fractional": 250, "currency_code": "EUR"},
                    "address": {
                        "street": "Rue Neuve", "number": "12",
                        "postal_code": "1000", "city": "Bruxelles"
                    }
                }
            }
        }
    })
}

fn key() -> PlatformRef {
    PlatformRef::new("gb:abc123", OrderSource::Deliveroo)
}

#[tokio::test]
async fn new_order_webhook_is_idempotent() {
    let app = app();
    let body = order_event("order.new", "placed");

    let (status, ack) = send(
        &app.router,
        signed_request("/webhooks/deliveroo/orders", &body, "delivery-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "received");

    // platform redelivers the same event with a fresh sequence guid
    let (status, ack) = send(
        &app.router,
        signed_request("/webhooks/deliveroo/orders", &body, "delivery-2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "duplicate");

    assert_eq!(app.orders.len(), 1);
    let order = app.orders.find_by_platform_id(&key()).await.unwrap().unwrap();
    assert_eq!(order.total_price.to_string(), "12.50");
    assert_eq!(order.order_status, OrderStatus::Pending);
    assert_eq!(
        order.address.address_extra(),
        Some("Rue Neuve, 12, 1000, Bruxelles")
    );

    app.state.reconciler.sync_reporter().flush().await;
    let reports = app.reports.0.lock().unwrap().clone();
    assert_eq!(reports, vec![("gb:abc123".to_string(), SyncStatus::Succeeded)]);
}

#[tokio::test]
async fn bad_signature_is_rejected_with_400() {
    let app = app();
    let body = order_event("order.new", "placed");
    let mut request = signed_request("/webhooks/deliveroo/orders", &body, "delivery-1");
    request
        .headers_mut()
        .insert(HEADER_SEQUENCE_GUID, "another-delivery".parse().unwrap());

    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.orders.is_empty());
}

#[tokio::test]
async fn missing_headers_are_rejected_with_400() {
    let app = app();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/deliveroo/orders")
        .body(Body::from(order_event("order.new", "placed").to_string()))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"]["header"], HEADER_SEQUENCE_GUID);
    assert!(app.orders.is_empty());
}

#[tokio::test]
async fn status_update_for_unknown_order_is_acknowledged() {
    let app = app();
    let body = order_event("order.status_update", "accepted");

    let (status, ack) = send(
        &app.router,
        signed_request("/webhooks/deliveroo/orders", &body, "delivery-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "not_found");
    assert!(app.orders.is_empty());
}

#[tokio::test]
async fn status_update_moves_existing_order() {
    let app = app();
    send(
        &app.router,
        signed_request(
            "/webhooks/deliveroo/orders",
            &order_event("order.new", "placed"),
            "delivery-1",
        ),
    )
    .await;

    let (status, ack) = send(
        &app.router,
        signed_request(
            "/webhooks/deliveroo/orders",
            &order_event("order.status_update", "canceled"),
            "delivery-2",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "received");

    let order = app.orders.find_by_platform_id(&key()).await.unwrap().unwrap();
    assert_eq!(order.order_status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn reconciliation_failure_is_still_acknowledged() {
    let app = app();
    app.orders.fail_writes(true);

    let (status, ack) = send(
        &app.router,
        signed_request(
            "/webhooks/deliveroo/orders",
            &order_event("order.new", "placed"),
            "delivery-1",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "failed");

    app.state.reconciler.sync_reporter().flush().await;
    let reports = app.reports.0.lock().unwrap().clone();
    assert_eq!(reports, vec![("gb:abc123".to_string(), SyncStatus::Failed)]);
}

#[tokio::test]
async fn rider_and_unknown_events() {
    let app = app();
    let rider = json!({
        "event": "rider.status_update",
        "body": {"order_id": "gb:unknown", "riders": []}
    });
    let (status, ack) = send(
        &app.router,
        signed_request("/webhooks/deliveroo/riders", &rider, "delivery-1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "not_found");

    let unknown = json!({"event": "order.refunded", "body": {}});
    let (status, ack) = send(
        &app.router,
        signed_request("/webhooks/deliveroo/orders", &unknown, "delivery-2"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "ignored");
}

#[tokio::test]
async fn health_reports_service() {
    let app = app();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["service"], "crab-delivery");
}
