//! Application state for crab-delivery

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::{PgAddressRepository, PgOrderRepository, PgProductRepository};
use crate::live::LiveEventHub;
use crate::platform::{PlatformClient, WebhookVerifier};
use crate::reconcile::{AddressResolver, OrderReconciler, SyncReporter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    /// Webhook 签名校验 + 事件解码
    pub verifier: Arc<WebhookVerifier>,
    /// webhook 之后的订单处理
    pub reconciler: Arc<OrderReconciler>,
    /// 订单/骑手实时事件
    pub events: LiveEventHub,
}

impl AppState {
    pub fn new(
        verifier: WebhookVerifier,
        reconciler: OrderReconciler,
        events: LiveEventHub,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            reconciler: Arc::new(reconciler),
            events,
        }
    }

    /// 连接 PostgreSQL，执行迁移，组装平台客户端
    ///
    /// 进程退出时 `shutdown` 中止出站重试。
    pub async fn connect(config: &Config, shutdown: CancellationToken) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        let platform = Arc::new(PlatformClient::from_config(config, shutdown)?);
        let events = LiveEventHub::new();

        let reconciler = OrderReconciler::new(
            Arc::new(PgOrderRepository::new(pool.clone())),
            Arc::new(PgProductRepository::new(pool.clone())),
            AddressResolver::new(
                Arc::new(PgAddressRepository::new(pool)),
                config.address_search_limit,
            ),
            Arc::new(events.clone()),
            SyncReporter::new(platform),
        );

        Ok(Self::new(
            WebhookVerifier::new(config.platform_webhook_secret.clone()),
            reconciler,
            events,
        ))
    }
}
