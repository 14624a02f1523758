//! In-process stubs for tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use shared::platform::SyncStatusReport;
use tokio::net::TcpListener;

use crate::platform::PlatformError;
use crate::reconcile::SyncStatusSink;

/// Serve `router` on an ephemeral local port, returning its base URL
pub async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// `/oauth2/token` stub issuing `token-1`, `token-2`, ... valid for an hour
#[derive(Clone, Default)]
pub struct AuthStub {
    hits: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl AuthStub {
    pub fn router(&self) -> Router {
        Router::new()
            .route("/oauth2/token", post(issue_token))
            .with_state(self.clone())
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

async fn issue_token(State(stub): State<AuthStub>) -> Result<Json<Value>, StatusCode> {
    if stub.fail.load(Ordering::SeqCst) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let n = stub.hits.fetch_add(1, Ordering::SeqCst) + 1;
    Ok(Json(json!({
        "access_token": format!("token-{n}"),
        "token_type": "bearer",
        "expires_in": 3600,
    })))
}

/// Sync status sink that records what it was given
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(String, SyncStatusReport)>>,
    attempts: AtomicUsize,
    delay: Option<Duration>,
    fail: bool,
}

impl RecordingSink {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successfully delivered reports
    pub fn reports(&self) -> Vec<(String, SyncStatusReport)> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncStatusSink for RecordingSink {
    async fn send_sync_status(
        &self,
        platform_order_id: &str,
        report: &SyncStatusReport,
    ) -> Result<(), PlatformError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(PlatformError::Transient {
                status: StatusCode::SERVICE_UNAVAILABLE,
            });
        }
        self.reports
            .lock()
            .unwrap()
            .push((platform_order_id.to_string(), report.clone()));
        Ok(())
    }
}
