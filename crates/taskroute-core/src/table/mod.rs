//! RouteTable - 宣言的なルーティング表（未検証）
//!
//! 3 つのマッピングを持つだけの値オブジェクト:
//! - `exchanges`: exchange 名 → 種別（+ routing key テンプレート）
//! - `queue_to_exchange`: queue 名 → exchange 名（+ 明示 routing key / dead letter）
//! - `queue_to_tasks`: queue 名 → task 識別子の列
//!
//! 整合性チェックは一切しない。`validate` を通して初めて
//! `ValidatedTable`（= Resolver を作れる状態）になる。
//!
//! # JSON 形式
//! ```json
//! {
//!   "exchanges": { "alpha": { "kind": "direct" } },
//!   "queue_to_exchange": { "default": "alpha" },
//!   "queue_to_tasks": { "default": ["app.proc.tasks.add", "app.proc.tasks.sub"] },
//!   "default_queue": "default"
//! }
//! ```

pub mod validated;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::{ConfigError, ExchangeKind};

pub use self::validated::{Queue, ValidatedTable};
pub use self::validator::validate;

/// Raw exchange declaration.
///
/// `kind` stays a plain optional string here so that a missing or unknown kind
/// is reported by the validator instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Routing key template for queues bound to this exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
}

impl ExchangeSpec {
    pub fn new(kind: ExchangeKind) -> Self {
        Self {
            kind: Some(kind.as_str().to_string()),
            routing_key: None,
        }
    }
}

/// Dead-letter declaration: where rejected / expired messages go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeadLetterSpec {
    pub exchange: String,
    pub queue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
}

impl DeadLetterSpec {
    pub fn new(exchange: impl Into<String>, queue: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            queue: queue.into(),
            routing_key: None,
        }
    }

    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = Some(routing_key.into());
        self
    }
}

/// Right-hand side of `queue_to_exchange`: either just the exchange name or
/// an object with the optional per-queue settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueTarget {
    Exchange(String),
    Detailed(QueueOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueOptions {
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<DeadLetterSpec>,
}

impl QueueTarget {
    pub fn exchange(&self) -> &str {
        match self {
            QueueTarget::Exchange(name) => name,
            QueueTarget::Detailed(opts) => &opts.exchange,
        }
    }

    pub fn routing_key(&self) -> Option<&str> {
        match self {
            QueueTarget::Exchange(_) => None,
            QueueTarget::Detailed(opts) => opts.routing_key.as_deref(),
        }
    }

    pub fn dead_letter(&self) -> Option<&DeadLetterSpec> {
        match self {
            QueueTarget::Exchange(_) => None,
            QueueTarget::Detailed(opts) => opts.dead_letter.as_ref(),
        }
    }

    pub fn into_options(self) -> QueueOptions {
        match self {
            QueueTarget::Exchange(exchange) => QueueOptions {
                exchange,
                ..Default::default()
            },
            QueueTarget::Detailed(opts) => opts,
        }
    }
}

/// The unvalidated routing table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteTable {
    #[serde(default)]
    pub exchanges: BTreeMap<String, ExchangeSpec>,

    #[serde(default)]
    pub queue_to_exchange: BTreeMap<String, QueueTarget>,

    #[serde(default)]
    pub queue_to_tasks: BTreeMap<String, Vec<String>>,

    /// Queue a dispatcher may fall back to when it explicitly opts in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_queue: Option<String>,

    /// Table-wide dead-letter target, applied to every queue without its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<DeadLetterSpec>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Shorthand for [`validate`].
    pub fn validate(self) -> Result<ValidatedTable, ConfigError> {
        validate(self)
    }
}

/// RouteTableBuilder はコード上で静的にルーティング表を宣言するためのビルダー
///
/// # 使用例
/// ```ignore
/// let table = RouteTable::builder()
///     .exchange("alpha", ExchangeKind::Direct)
///     .queue("default", "alpha", ["app.proc.tasks.add", "app.proc.tasks.sub"])
///     .default_queue("default")
///     .build();
/// ```
///
/// 検証はしない。矛盾した表もそのまま組み立てられる（テストで使う）。
#[derive(Debug, Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
}

impl RouteTableBuilder {
    pub fn exchange(mut self, name: impl Into<String>, kind: ExchangeKind) -> Self {
        let spec = self.table.exchanges.entry(name.into()).or_default();
        spec.kind = Some(kind.as_str().to_string());
        self
    }

    pub fn exchange_spec(mut self, name: impl Into<String>, spec: ExchangeSpec) -> Self {
        self.table.exchanges.insert(name.into(), spec);
        self
    }

    pub fn routing_key_template(
        mut self,
        exchange: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        let spec = self.table.exchanges.entry(exchange.into()).or_default();
        spec.routing_key = Some(template.into());
        self
    }

    /// Declare a queue: binds it to `exchange` and to `tasks` at once.
    pub fn queue<I, T>(self, name: impl Into<String>, exchange: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let name = name.into();
        self.bind_exchange(name.clone(), exchange).bind_tasks(name, tasks)
    }

    pub fn bind_exchange(mut self, queue: impl Into<String>, exchange: impl Into<String>) -> Self {
        let queue = queue.into();
        let exchange = exchange.into();
        let target = match self.table.queue_to_exchange.remove(&queue) {
            Some(QueueTarget::Detailed(mut opts)) => {
                opts.exchange = exchange;
                QueueTarget::Detailed(opts)
            }
            _ => QueueTarget::Exchange(exchange),
        };
        self.table.queue_to_exchange.insert(queue, target);
        self
    }

    pub fn bind_tasks<I, T>(mut self, queue: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.table
            .queue_to_tasks
            .insert(queue.into(), tasks.into_iter().map(Into::into).collect());
        self
    }

    /// Explicit routing key for a queue, instead of the derived one.
    pub fn routing_key(self, queue: impl Into<String>, routing_key: impl Into<String>) -> Self {
        let routing_key = routing_key.into();
        self.update_queue(queue.into(), |opts| opts.routing_key = Some(routing_key))
    }

    pub fn queue_dead_letter(self, queue: impl Into<String>, dead_letter: DeadLetterSpec) -> Self {
        self.update_queue(queue.into(), |opts| opts.dead_letter = Some(dead_letter))
    }

    pub fn default_queue(mut self, queue: impl Into<String>) -> Self {
        self.table.default_queue = Some(queue.into());
        self
    }

    pub fn dead_letter(mut self, dead_letter: DeadLetterSpec) -> Self {
        self.table.dead_letter = Some(dead_letter);
        self
    }

    pub fn build(self) -> RouteTable {
        self.table
    }

    fn update_queue(mut self, queue: String, f: impl FnOnce(&mut QueueOptions)) -> Self {
        let mut opts = self
            .table
            .queue_to_exchange
            .remove(&queue)
            .map(QueueTarget::into_options)
            .unwrap_or_default();
        f(&mut opts);
        self.table
            .queue_to_exchange
            .insert(queue, QueueTarget::Detailed(opts));
        self
    }
}
