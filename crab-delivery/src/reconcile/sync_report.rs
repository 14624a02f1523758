//! 同步状态上报（fire-and-forget）
//!
//! webhook 先确认，上报随后才到达平台。每次上报在 `TaskTracker` 上独立运行，
//! 失败只记录日志。`flush` 等待所有进行中的上报完成。

use std::sync::Arc;

use async_trait::async_trait;
use shared::platform::SyncStatusReport;
use tokio_util::task::TaskTracker;

use crate::platform::{PlatformClient, PlatformError};

/// 同步上报的目标
#[async_trait]
pub trait SyncStatusSink: Send + Sync {
    async fn send_sync_status(
        &self,
        platform_order_id: &str,
        report: &SyncStatusReport,
    ) -> Result<(), PlatformError>;
}

#[async_trait]
impl SyncStatusSink for PlatformClient {
    async fn send_sync_status(
        &self,
        platform_order_id: &str,
        report: &SyncStatusReport,
    ) -> Result<(), PlatformError> {
        self.create_sync_status(platform_order_id, report).await
    }
}

#[derive(Clone)]
pub struct SyncReporter {
    sink: Arc<dyn SyncStatusSink>,
    tracker: TaskTracker,
}

impl SyncReporter {
    pub fn new(sink: Arc<dyn SyncStatusSink>) -> Self {
        Self {
            sink,
            tracker: TaskTracker::new(),
        }
    }

    /// 后台派发上报，立即返回
    pub fn report(&self, platform_order_id: impl Into<String>, report: SyncStatusReport) {
        let platform_order_id = platform_order_id.into();
        let sink = self.sink.clone();
        self.tracker.spawn(async move {
            match sink.send_sync_status(&platform_order_id, &report).await {
                Ok(()) => tracing::info!(
                    platform_order_id = %platform_order_id,
                    status = ?report.status(),
                    "Sync status reported"
                ),
                Err(e) => tracing::error!(
                    platform_order_id = %platform_order_id,
                    status = ?report.status(),
                    error = %e,
                    "Failed to report sync status"
                ),
            }
        });
    }

    pub fn succeeded(&self, platform_order_id: impl Into<String>) {
        self.report(
            platform_order_id,
            SyncStatusReport::succeeded(chrono::Utc::now()),
        );
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// 等待所有已派发的上报结束
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl std::fmt::Debug for SyncReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncReporter")
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}
