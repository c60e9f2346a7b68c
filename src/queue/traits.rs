//! Queue abstraction traits
//!
//! Semantics follow hosted queue services: a received message stays in the
//! queue but is hidden for a visibility timeout. Deleting it with the receipt
//! handle of that delivery acknowledges it; otherwise it reappears and is
//! delivered again with a higher receive count.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::QueueError;

/// A single delivery of a queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Valid only for this delivery
    pub receipt_handle: String,
    pub body: String,
    /// 1 on first delivery
    pub receive_count: u32,
}

#[async_trait]
pub trait JobQueue: Send + Sync + 'static {
    /// Receive at most one message, waiting up to `wait` for one to arrive
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Append a message
    async fn send(&self, body: &str) -> Result<(), QueueError>;

    /// Acknowledge a delivery, removing the message for good
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}
