//! Topology - worker 起動前に broker へ宣言する exchange / queue の一覧
//!
//! dead letter が設定された queue には AMQP の
//! `x-dead-letter-exchange` / `x-dead-letter-routing-key` 引数を付ける。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ExchangeKind, ExchangeName, QueueName};
use crate::table::ValidatedTable;

use super::resolver::Resolver;

pub const DEAD_LETTER_EXCHANGE_ARG: &str = "x-dead-letter-exchange";
pub const DEAD_LETTER_ROUTING_KEY_ARG: &str = "x-dead-letter-routing-key";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeDeclaration {
    pub name: ExchangeName,
    pub kind: ExchangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDeclaration {
    pub name: QueueName,
    pub exchange: ExchangeName,
    pub routing_key: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, String>,
}

/// Declarations ordered by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topology {
    pub exchanges: Vec<ExchangeDeclaration>,
    pub queues: Vec<QueueDeclaration>,
}

impl Topology {
    pub fn queue(&self, name: &str) -> Option<&QueueDeclaration> {
        self.queues.iter().find(|q| q.name.as_str() == name)
    }
}

impl From<&ValidatedTable> for Topology {
    fn from(table: &ValidatedTable) -> Self {
        let exchanges = table
            .exchanges()
            .map(|e| ExchangeDeclaration {
                name: e.name.clone(),
                kind: e.kind,
            })
            .collect();

        let mut queues: BTreeMap<QueueName, QueueDeclaration> = BTreeMap::new();
        for queue in table.queues() {
            let mut arguments = BTreeMap::new();
            if let Some(dl) = &queue.dead_letter {
                arguments.insert(DEAD_LETTER_EXCHANGE_ARG.to_string(), dl.exchange.to_string());
                arguments.insert(DEAD_LETTER_ROUTING_KEY_ARG.to_string(), dl.routing_key.clone());
            }
            queues.insert(
                queue.name.clone(),
                QueueDeclaration {
                    name: queue.name.clone(),
                    exchange: queue.exchange.clone(),
                    routing_key: queue.routing_key.clone(),
                    arguments,
                },
            );
        }

        // dead letter 専用の queue（task を持たない）も宣言しておく。
        // 同じ queue を指す target は検証で一致が保証されているので、最初の 1 件で足りる
        let dead_letters = table
            .dead_letter()
            .into_iter()
            .chain(table.queues().filter_map(|q| q.dead_letter.as_ref()));
        for dl in dead_letters {
            queues
                .entry(dl.queue.clone())
                .or_insert_with(|| QueueDeclaration {
                    name: dl.queue.clone(),
                    exchange: dl.exchange.clone(),
                    routing_key: dl.routing_key.clone(),
                    arguments: BTreeMap::new(),
                });
        }

        Self {
            exchanges,
            queues: queues.into_values().collect(),
        }
    }
}

impl From<&Resolver> for Topology {
    fn from(resolver: &Resolver) -> Self {
        Self::from(resolver.table())
    }
}
