//! In-process queue with visibility-timeout semantics

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use super::traits::{JobQueue, QueueMessage};
use crate::error::QueueError;

struct Entry {
    message_id: String,
    body: String,
    receive_count: u32,
    receipt_handle: Option<String>,
    invisible_until: Option<Instant>,
}

impl Entry {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |t| t <= now)
    }
}

/// Queue held in memory; messages keep FIFO order
pub struct MemoryQueue {
    entries: Mutex<Vec<Entry>>,
    notify: Notify,
    visibility_timeout: Duration,
    receive_calls: AtomicUsize,
    send_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            notify: Notify::new(),
            visibility_timeout,
            receive_calls: AtomicUsize::new(0),
            send_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Messages still in the queue, visible or not
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Bodies of all messages in queue order
    pub fn bodies(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.body.clone()).collect()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Claim the first visible message, or report when the next one becomes visible
    fn try_claim(&self) -> Result<QueueMessage, Option<Instant>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.iter_mut().find(|e| e.is_visible(now)) {
            let receipt = Uuid::new_v4().to_string();
            entry.receive_count += 1;
            entry.receipt_handle = Some(receipt.clone());
            entry.invisible_until = Some(now + self.visibility_timeout);
            return Ok(QueueMessage {
                message_id: entry.message_id.clone(),
                receipt_handle: receipt,
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            });
        }

        Err(entries.iter().filter_map(|e| e.invisible_until).min())
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn receive(&self, wait: Duration) -> Result<Option<QueueMessage>, QueueError> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + wait;

        loop {
            let next_visible = match self.try_claim() {
                Ok(message) => return Ok(Some(message)),
                Err(next_visible) => next_visible,
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_visible.map_or(deadline, |t| t.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn send(&self, body: &str) -> Result<(), QueueError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().push(Entry {
            message_id: Uuid::new_v4().to_string(),
            body: body.to_string(),
            receive_count: 0,
            receipt_handle: None,
            invisible_until: None,
        });
        self.notify.notify_one();
        Ok(())
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock();
        let position = entries
            .iter()
            .position(|e| e.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| QueueError::InvalidReceipt(receipt_handle.to_string()))?;
        entries.remove(position);
        Ok(())
    }
}
