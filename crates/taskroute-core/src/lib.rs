//! taskroute-core
//!
//! Static task routing: a declarative table that maps task identifiers to
//! queues, and the exchange / routing key each message is published with.
//!
//! # モジュール構成
//! - **domain**: 名前の newtype、Exchange、RoutingDirective、エラー型
//! - **table**: 生のルーティング表（JSON / builder）と検証
//! - **ports**: TaskRouter, MessagePublisher, Clock
//! - **app**: Resolver, Topology, Dispatcher
//! - **impls**: InMemoryPublisher
//!
//! # 使い方
//! ```no_run
//! use taskroute_core::{Resolver, RouteTable};
//!
//! let table = RouteTable::from_json_file("config/routes.json")?;
//! let resolver = Resolver::from_table(table)?;
//! let directive = resolver.resolve("app.proc.tasks.add")?;
//! println!("{} -> {}", directive.routing_key, directive.queue_name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod table;

#[cfg(test)]
mod testing;

pub use crate::app::{DispatchError, Dispatcher, Resolver, Topology, UnroutedPolicy};
pub use crate::domain::{
    ConfigError, ConfigErrorKind, ExchangeKind, ExchangeName, MessageId, OutgoingMessage,
    QueueName, RouteError, RoutingDirective, TaskName,
};
pub use crate::impls::InMemoryPublisher;
pub use crate::ports::{Clock, FixedClock, MessagePublisher, PublishError, SystemClock, TaskRouter};
pub use crate::table::{RouteTable, ValidatedTable, validate};
