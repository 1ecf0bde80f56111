//! ValidatedTable - 検証済みのルーティング表
//!
//! `validate` だけがこの型を作れる（フィールドは `table` モジュールの外から見えない）。
//! Resolver はこの型しか受け取らないので、未検証の表から Resolver が
//! 作られることは型レベルで起きない。

use std::collections::{BTreeMap, HashMap};

use crate::domain::{
    DeadLetterTarget, Exchange, ExchangeKind, ExchangeName, QueueName, RoutingDirective, TaskName,
};

/// A validated queue with its routing key already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    pub name: QueueName,
    pub exchange: ExchangeName,
    pub exchange_type: ExchangeKind,
    pub routing_key: String,
    /// Effective dead-letter target (per-queue one, else the table-wide one).
    pub dead_letter: Option<DeadLetterTarget>,
}

impl Queue {
    pub fn directive(&self) -> RoutingDirective {
        RoutingDirective {
            exchange_name: self.exchange.clone(),
            exchange_type: self.exchange_type,
            routing_key: self.routing_key.clone(),
            queue_name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedTable {
    pub(super) exchanges: BTreeMap<ExchangeName, Exchange>,
    pub(super) queues: BTreeMap<QueueName, Queue>,
    pub(super) bindings: BTreeMap<QueueName, Vec<TaskName>>,
    pub(super) task_index: HashMap<TaskName, QueueName>,
    pub(super) default_queue: Option<QueueName>,
    pub(super) dead_letter: Option<DeadLetterTarget>,
}

impl ValidatedTable {
    pub fn exchanges(&self) -> impl Iterator<Item = &Exchange> {
        self.exchanges.values()
    }

    pub fn exchange(&self, name: &str) -> Option<&Exchange> {
        self.exchanges.get(name)
    }

    pub fn queues(&self) -> impl Iterator<Item = &Queue> {
        self.queues.values()
    }

    pub fn queue(&self, name: &str) -> Option<&Queue> {
        self.queues.get(name)
    }

    /// Tasks bound to `queue`, in declaration order.
    pub fn tasks_of(&self, queue: &str) -> &[TaskName] {
        self.bindings.get(queue).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Queue a task is bound to.
    pub fn queue_of(&self, task: &str) -> Option<&Queue> {
        self.task_index
            .get(task)
            .and_then(|q| self.queues.get(q.as_str()))
    }

    pub fn task_count(&self) -> usize {
        self.task_index.len()
    }

    pub fn default_queue(&self) -> Option<&Queue> {
        self.default_queue
            .as_ref()
            .and_then(|q| self.queues.get(q.as_str()))
    }

    /// Table-wide dead-letter target.
    pub fn dead_letter(&self) -> Option<&DeadLetterTarget> {
        self.dead_letter.as_ref()
    }
}
