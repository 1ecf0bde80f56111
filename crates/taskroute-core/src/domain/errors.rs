//! Errors - エラー型と分類
//!
//! - 起動時: `ConfigError`（ルーティング表の不整合、常に致命的）
//! - 実行時: `RouteError`（未登録タスク、呼び出し側で回復可能）

use std::fmt;
use std::path::PathBuf;

/// Section of the declarative routes document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Exchanges,
    QueueToExchange,
    QueueToTasks,
    DefaultQueue,
    DeadLetter,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Exchanges => "exchanges",
            Section::QueueToExchange => "queue_to_exchange",
            Section::QueueToTasks => "queue_to_tasks",
            Section::DefaultQueue => "default_queue",
            Section::DeadLetter => "dead_letter",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ConfigErrorKind は ConfigError の運用分類
///
/// - Empty: いずれかのマッピングが空
/// - Shape: 値の型・必須フィールドの欠落
/// - Consistency: マッピング間の参照整合性違反
/// - Io: ルーティング表ファイルが読めない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    Empty,
    Shape,
    Consistency,
    Io,
}

/// Startup-fatal routing table error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} cannot be empty")]
    Empty(Section),

    #[error("{section}: blank name in entry '{key}'")]
    BlankName { section: Section, key: String },

    #[error("{section}: entry '{key}' is missing required field '{field}'")]
    MissingField {
        section: Section,
        key: String,
        field: &'static str,
    },

    #[error("{section}: entry '{key}' has invalid {field}: {reason}")]
    InvalidValue {
        section: Section,
        key: String,
        field: &'static str,
        reason: String,
    },

    #[error("queue_to_tasks: queue '{queue}' has no tasks")]
    EmptyTaskList { queue: String },

    #[error("routes document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to read routes file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{declared} exchanges declared but {referenced} referenced by queues")]
    ExchangeCountMismatch { declared: usize, referenced: usize },

    #[error("{with_exchange} queues bound to exchanges but {with_tasks} queues bound to tasks")]
    QueueCountMismatch {
        with_exchange: usize,
        with_tasks: usize,
    },

    #[error("exchange sets differ: undeclared={undeclared:?} unreferenced={unreferenced:?}")]
    ExchangeSetMismatch {
        undeclared: Vec<String>,
        unreferenced: Vec<String>,
    },

    #[error("queue sets differ: without_tasks={without_tasks:?} without_exchange={without_exchange:?}")]
    QueueSetMismatch {
        without_tasks: Vec<String>,
        without_exchange: Vec<String>,
    },

    #[error("task '{task}' is bound to both '{first_queue}' and '{second_queue}'")]
    DuplicateTask {
        task: String,
        first_queue: String,
        second_queue: String,
    },

    #[error("default queue '{0}' is not a declared queue")]
    UnknownDefaultQueue(String),

    #[error("dead letter for {scope} references undeclared exchange '{exchange}'")]
    UnknownDeadLetterExchange { scope: String, exchange: String },

    #[error("dead letter queue '{queue}' is bound to '{actual}', not to dead letter exchange '{expected}'")]
    DeadLetterQueueMismatch {
        queue: String,
        expected: String,
        actual: String,
    },

    #[error("dead letter queue '{queue}' is targeted as {first} and as {second}")]
    ConflictingDeadLetter {
        queue: String,
        first: String,
        second: String,
    },

    #[error("dead letter queue '{queue}' is routed with key '{expected}', but dead-lettered with key '{actual}'")]
    DeadLetterRoutingKeyMismatch {
        queue: String,
        expected: String,
        actual: String,
    },

    #[error("queue '{0}' dead-letters into itself")]
    DeadLetterLoop(String),
}

impl ConfigError {
    pub fn kind(&self) -> ConfigErrorKind {
        match self {
            ConfigError::Empty(_) => ConfigErrorKind::Empty,
            ConfigError::BlankName { .. }
            | ConfigError::MissingField { .. }
            | ConfigError::InvalidValue { .. }
            | ConfigError::EmptyTaskList { .. }
            | ConfigError::Malformed(_) => ConfigErrorKind::Shape,
            ConfigError::Io { .. } => ConfigErrorKind::Io,
            ConfigError::ExchangeCountMismatch { .. }
            | ConfigError::QueueCountMismatch { .. }
            | ConfigError::ExchangeSetMismatch { .. }
            | ConfigError::QueueSetMismatch { .. }
            | ConfigError::DuplicateTask { .. }
            | ConfigError::UnknownDefaultQueue(_)
            | ConfigError::UnknownDeadLetterExchange { .. }
            | ConfigError::DeadLetterQueueMismatch { .. }
            | ConfigError::ConflictingDeadLetter { .. }
            | ConfigError::DeadLetterRoutingKeyMismatch { .. }
            | ConfigError::DeadLetterLoop(_) => ConfigErrorKind::Consistency,
        }
    }
}

/// Per-call routing error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("task '{0}' is not routed")]
    TaskNotRouted(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(ConfigError::Empty(Section::Exchanges), ConfigErrorKind::Empty)]
    #[case::shape(
        ConfigError::EmptyTaskList { queue: "default".into() },
        ConfigErrorKind::Shape
    )]
    #[case::duplicate(
        ConfigError::DuplicateTask {
            task: "add".into(),
            first_queue: "default".into(),
            second_queue: "another".into(),
        },
        ConfigErrorKind::Consistency
    )]
    #[case::default_queue(
        ConfigError::UnknownDefaultQueue("nope".into()),
        ConfigErrorKind::Consistency
    )]
    #[case::dead_letter_loop(
        ConfigError::DeadLetterLoop("another".into()),
        ConfigErrorKind::Consistency
    )]
    fn errors_are_classified(#[case] err: ConfigError, #[case] kind: ConfigErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn messages_name_the_offending_keys() {
        let err = ConfigError::DuplicateTask {
            task: "add".into(),
            first_queue: "default".into(),
            second_queue: "another".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'add'"));
        assert!(msg.contains("default"));
        assert!(msg.contains("another"));

        assert_eq!(
            ConfigError::Empty(Section::Exchanges).to_string(),
            "exchanges cannot be empty"
        );
        assert_eq!(
            RouteError::TaskNotRouted("mul".into()).to_string(),
            "task 'mul' is not routed"
        );
    }
}
