//! RoutingDirective - broker に渡すルーティング指示

use serde::{Deserialize, Serialize};

use super::exchange::ExchangeKind;
use super::names::{ExchangeName, QueueName};

/// Everything a broker client needs to address a task message.
///
/// Field names match the declarative routes format, so the value can be
/// handed to a publisher (or printed) as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingDirective {
    pub exchange_name: ExchangeName,
    pub exchange_type: ExchangeKind,
    pub routing_key: String,
    pub queue_name: QueueName,
}

/// DeadLetterTarget は reject / expire / 長さ超過したメッセージの行き先
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterTarget {
    pub exchange: ExchangeName,
    pub exchange_type: ExchangeKind,
    pub queue: QueueName,
    pub routing_key: String,
}

impl DeadLetterTarget {
    pub fn directive(&self) -> RoutingDirective {
        RoutingDirective {
            exchange_name: self.exchange.clone(),
            exchange_type: self.exchange_type,
            routing_key: self.routing_key.clone(),
            queue_name: self.queue.clone(),
        }
    }
}
