//! InMemoryPublisher - 開発用の publisher
//!
//! broker の代わりに、directive の queue ごとにメッセージを溜めておく。
//! テストと CLI の demo で使う。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{OutgoingMessage, QueueName};
use crate::ports::{MessagePublisher, PublishError};

#[derive(Debug, Default)]
pub struct InMemoryPublisher {
    queues: Mutex<HashMap<QueueName, VecDeque<OutgoingMessage>>>,
    closed: AtomicBool,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subsequent publishes fail with `PublishError::Closed`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub async fn len(&self, queue: &str) -> usize {
        self.queues.lock().await.get(queue).map_or(0, VecDeque::len)
    }

    pub async fn total(&self) -> usize {
        self.queues.lock().await.values().map(VecDeque::len).sum()
    }

    /// Per-queue message counts, ordered by queue name.
    pub async fn counts(&self) -> Vec<(QueueName, usize)> {
        let queues = self.queues.lock().await;
        let mut counts: Vec<_> = queues.iter().map(|(q, m)| (q.clone(), m.len())).collect();
        counts.sort();
        counts
    }

    /// Take every message published to `queue`, oldest first.
    pub async fn drain(&self, queue: &str) -> Vec<OutgoingMessage> {
        self.queues
            .lock()
            .await
            .get_mut(queue)
            .map(|messages| messages.drain(..).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryPublisher {
    async fn publish(&self, message: OutgoingMessage) -> Result<(), PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }
        let mut queues = self.queues.lock().await;
        queues
            .entry(message.directive.queue_name.clone())
            .or_default()
            .push_back(message);
        Ok(())
    }
}
