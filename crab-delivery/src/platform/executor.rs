//! Authenticated platform requests with bounded exponential backoff
//!
//! Transport errors, `429` and `5xx` are retried up to `max_retries` times.
//! Every other status goes straight back to the caller. The body is encoded
//! once and replayed byte-for-byte on each attempt, together with the same
//! `Idempotency-Key`, so the platform can collapse retried mutations.

use std::sync::Arc;
use std::time::Duration;

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::PlatformError;
use super::token::TokenManager;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Retry tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: u32,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// `min(initial * multiplier^attempt, max)`; attempt 0 is the wait after the first failure
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// One logical platform call, replayable across attempts
#[derive(Debug, Clone)]
pub struct PlatformRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
    pub idempotency_key: Option<String>,
}

impl PlatformRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            idempotency_key: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Encode the JSON body now; retries reuse these bytes.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, PlatformError> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Attach a fresh idempotency key for this logical call
    pub fn idempotent(self) -> Self {
        self.idempotency_key(Uuid::new_v4().to_string())
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

pub struct RequestExecutor {
    http: reqwest::Client,
    tokens: Arc<TokenManager>,
    policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl RequestExecutor {
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenManager>,
        policy: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            http,
            tokens,
            policy,
            shutdown,
        }
    }

    /// Send `request`, retrying transient failures.
    ///
    /// Returns the first non-retryable response, whatever its status. Fails
    /// with `RetriesExhausted` once `1 + max_retries` attempts were transient,
    /// or `Cancelled` if shutdown fires mid-flight or during a backoff sleep.
    pub async fn execute(
        &self,
        request: &PlatformRequest,
    ) -> Result<reqwest::Response, PlatformError> {
        let mut attempt: u32 = 0;

        loop {
            let token = self.tokens.ensure_valid_token().await?;

            let outcome = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(PlatformError::Cancelled),
                result = self.send_once(request, &token) => result,
            };

            let failure = match outcome {
                Ok(response) if is_retryable_status(response.status()) => {
                    PlatformError::Transient {
                        status: response.status(),
                    }
                }
                Ok(response) => {
                    if response.status() == StatusCode::UNAUTHORIZED {
                        self.tokens.invalidate(&token).await;
                    }
                    return Ok(response);
                }
                Err(e) => PlatformError::Transport(e),
            };

            if attempt >= self.policy.max_retries {
                tracing::error!(
                    method = %request.method,
                    url = %request.url,
                    attempts = attempt + 1,
                    error = %failure,
                    "Platform request failed, retries exhausted"
                );
                return Err(PlatformError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(failure),
                });
            }

            let delay = self.policy.backoff(attempt);
            tracing::warn!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Platform request failed, retrying"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(PlatformError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        request: &PlatformRequest,
        token: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .bearer_auth(token)
            .header(ACCEPT, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        builder.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::token::ClientCredentials;
    use crate::test_support::{AuthStub, spawn_server};
    use axum::Router;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::routing::any;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Seen {
        idempotency_key: Option<String>,
        authorization: Option<String>,
        body: String,
    }

    /// Replies with queued statuses, then `fallback` forever
    #[derive(Clone)]
    struct Upstream {
        statuses: Arc<Mutex<VecDeque<u16>>>,
        fallback: u16,
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl Upstream {
        fn new(queued: &[u16], fallback: u16) -> Self {
            Self {
                statuses: Arc::new(Mutex::new(queued.iter().copied().collect())),
                fallback,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn attempts(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }
    }

    async fn upstream_handler(
        State(upstream): State<Upstream>,
        headers: HeaderMap,
        body: String,
    ) -> StatusCode {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        upstream.seen.lock().unwrap().push(Seen {
            idempotency_key: header("idempotency-key"),
            authorization: header("authorization"),
            body,
        });
        let code = upstream
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(upstream.fallback);
        StatusCode::from_u16(code).unwrap()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(5),
            multiplier: 2,
            max_backoff: Duration::from_millis(20),
        }
    }

    async fn setup(
        upstream: Upstream,
        policy: RetryPolicy,
    ) -> (RequestExecutor, String, AuthStub, CancellationToken) {
        let auth = AuthStub::default();
        let router = Router::new()
            .route("/orders/{id}", any(upstream_handler))
            .with_state(upstream)
            .merge(auth.router());
        let base = spawn_server(router).await;

        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenManager::new(
            http.clone(),
            format!("{base}/oauth2/token"),
            ClientCredentials {
                client_id: "client".into(),
                client_secret: "secret".into(),
            },
            Duration::from_secs(60),
        ));
        let shutdown = CancellationToken::new();
        let executor = RequestExecutor::new(http, tokens, policy, shutdown.clone());
        (executor, base, auth, shutdown)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let waits: Vec<u64> = (0..7).map(|a| policy.backoff(a).as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn always_503_makes_one_plus_max_retries_attempts() {
        let upstream = Upstream::new(&[], 503);
        let (executor, base, _, _) = setup(upstream.clone(), fast_policy()).await;

        let request = PlatformRequest::new(Method::POST, format!("{base}/orders/o1"));
        let err = executor.execute(&request).await.unwrap_err();

        assert_eq!(upstream.attempts(), 4);
        match err {
            PlatformError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 4);
                assert_eq!(last.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let upstream = Upstream::new(&[], 404);
        let (executor, base, _, _) = setup(upstream.clone(), fast_policy()).await;

        let request = PlatformRequest::get(format!("{base}/orders/o1"));
        let response = executor.execute(&request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(upstream.attempts(), 1);
    }

    #[tokio::test]
    async fn too_many_requests_is_retried() {
        let upstream = Upstream::new(&[429], 200);
        let (executor, base, _, _) = setup(upstream.clone(), fast_policy()).await;

        let request = PlatformRequest::get(format!("{base}/orders/o1"));
        let response = executor.execute(&request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(upstream.attempts(), 2);
    }

    #[tokio::test]
    async fn idempotency_key_and_body_stable_across_retries() {
        let upstream = Upstream::new(&[503, 502], 200);
        let (executor, base, _, _) = setup(upstream.clone(), fast_policy()).await;

        let request = PlatformRequest::new(Method::POST, format!("{base}/orders/o1"))
            .json(&serde_json::json!({"preparation_minutes": 15}))
            .unwrap()
            .idempotent();
        let response = executor.execute(&request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = upstream.seen();
        assert_eq!(seen.len(), 3);
        let key = seen[0].idempotency_key.clone().expect("key sent");
        assert!(Uuid::parse_str(&key).is_ok());
        for attempt in &seen {
            assert_eq!(attempt.idempotency_key.as_deref(), Some(key.as_str()));
            assert_eq!(attempt.body, r#"{"preparation_minutes":15}"#);
            assert_eq!(attempt.authorization.as_deref(), Some("Bearer token-1"));
        }
    }

    #[tokio::test]
    async fn separate_calls_get_separate_keys() {
        let upstream = Upstream::new(&[], 200);
        let (executor, base, _, _) = setup(upstream.clone(), fast_policy()).await;

        let url = format!("{base}/orders/o1");
        executor
            .execute(&PlatformRequest::new(Method::POST, &url).idempotent())
            .await
            .unwrap();
        executor
            .execute(&PlatformRequest::new(Method::POST, &url).idempotent())
            .await
            .unwrap();

        let seen = upstream.seen();
        assert_ne!(seen[0].idempotency_key, seen[1].idempotency_key);
    }

    #[tokio::test]
    async fn unauthorized_invalidates_token() {
        let upstream = Upstream::new(&[401], 200);
        let (executor, base, auth, _) = setup(upstream.clone(), fast_policy()).await;

        let request = PlatformRequest::get(format!("{base}/orders/o1"));
        let first = executor.execute(&request).await.unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(upstream.attempts(), 1);

        executor.execute(&request).await.unwrap();
        assert_eq!(auth.hits(), 2);
        assert_eq!(
            upstream.seen()[1].authorization.as_deref(),
            Some("Bearer token-2")
        );
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(30),
            ..fast_policy()
        };
        let upstream = Upstream::new(&[], 503);
        let (executor, base, _, shutdown) = setup(upstream.clone(), policy).await;

        let request = PlatformRequest::get(format!("{base}/orders/o1"));
        let cancel = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            shutdown.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), executor.execute(&request))
            .await
            .expect("executor stopped waiting");
        cancel.await.unwrap();

        assert!(matches!(result, Err(PlatformError::Cancelled)));
        assert_eq!(upstream.attempts(), 1);
    }

    #[tokio::test]
    async fn token_failure_propagates_without_calling_upstream() {
        let upstream = Upstream::new(&[], 200);
        let (executor, base, auth, _) = setup(upstream.clone(), fast_policy()).await;
        auth.fail_next(true);

        let request = PlatformRequest::get(format!("{base}/orders/o1"));
        let err = executor.execute(&request).await.unwrap_err();

        assert!(matches!(err, PlatformError::Auth(_)));
        assert_eq!(upstream.attempts(), 0);
    }
}
