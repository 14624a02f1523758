//! Webhook 事件 → 内部订单模型

pub mod address;
pub mod order;
pub mod status;
pub mod sync_report;

pub use address::AddressResolver;
pub use order::{OrderReconciler, ReconcileError, ReconcileOutcome};
pub use status::{map_external_status, map_fulfillment, map_status_for_fulfillment};
pub use sync_report::{SyncReporter, SyncStatusSink};
