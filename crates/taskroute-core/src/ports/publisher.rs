//! MessagePublisher port - broker へのメッセージ送信
//!
//! broker 本体（AMQP 接続、confirm など）はこの trait の外側。
//! 開発用には `impls::InMemoryPublisher` を使う。

use async_trait::async_trait;

use crate::domain::OutgoingMessage;

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publisher is closed")]
    Closed,

    #[error("publish failed: {0}")]
    OperationFailed(String),
}

#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, message: OutgoingMessage) -> Result<(), PublishError>;
}
