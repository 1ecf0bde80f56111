//! Domain model (names, exchanges, directives, messages, errors).

pub mod directive;
pub mod errors;
pub mod exchange;
pub mod message;
pub mod names;

pub use self::directive::{DeadLetterTarget, RoutingDirective};
pub use self::errors::{ConfigError, ConfigErrorKind, RouteError, Section};
pub use self::exchange::{
    Exchange, ExchangeKind, RoutingKeyTemplate, TemplateError, UnknownExchangeKind,
};
pub use self::message::{MessageId, OutgoingMessage};
pub use self::names::{ExchangeName, QueueName, TaskName};
