//! LiveEventHub - 按 topic 分发订单事件
//!
//! ```text
//! OrderReconciler
//!       │ publish(topic, payload)
//!       ▼
//! LiveEventHub
//!   └── topics: topic → broadcast::Sender<LiveEvent>
//!         │
//!         ▼
//!   subscribers (subscription layer, tests)
//! ```
//!
//! 发布永不阻塞。topic 无订阅者时事件直接丢弃；落后的订阅者丢失最旧的事件。
//! 所有 receiver 都已释放的 topic 在下一次 publish 或 subscribe 时清理。

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use shared::order::OrderSource;
use tokio::sync::broadcast;
use uuid::Uuid;

/// 每个 topic 的 broadcast 容量
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct LiveEvent {
    pub topic: String,
    pub payload: Value,
}

/// 发布端
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, payload: Value);
}

pub mod topics {
    use super::*;

    pub fn order_new(source: OrderSource) -> String {
        format!("platformOrder:new:{}", source.as_db())
    }

    pub fn order_update(order_id: Uuid) -> String {
        format!("platformOrder:update:{order_id}")
    }

    pub fn rider_update(order_id: Uuid) -> String {
        format!("platformRider:update:{order_id}")
    }
}

#[derive(Clone, Default)]
pub struct LiveEventHub {
    topics: Arc<DashMap<String, broadcast::Sender<LiveEvent>>>,
}

impl LiveEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<LiveEvent> {
        self.prune();
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(BROADCAST_CAPACITY).0)
            .subscribe()
    }

    #[cfg(test)]
    fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// 清理无订阅者的 topic
    fn prune(&self) {
        self.topics.retain(|_, tx| tx.receiver_count() > 0);
    }
}

impl EventPublisher for LiveEventHub {
    fn publish(&self, topic: &str, payload: Value) {
        let Some(tx) = self.topics.get(topic) else {
            tracing::debug!(topic, "No subscribers, event dropped");
            return;
        };
        // 仅当所有 receiver 都已释放时 send 才会失败
        let abandoned = tx
            .send(LiveEvent {
                topic: topic.to_string(),
                payload,
            })
            .is_err();
        drop(tx);

        if abandoned {
            self.topics.remove_if(topic, |_, tx| tx.receiver_count() == 0);
        }
    }
}
