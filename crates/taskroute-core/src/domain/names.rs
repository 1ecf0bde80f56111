//! Names - exchange / queue / task の識別子
//!
//! ルーティング表は全て文字列キーで書かれるため、
//! 取り違えを防ぐために newtype で包んでおく。

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

name_type!(
    /// Name of an AMQP exchange (e.g. `alpha`).
    ExchangeName
);

name_type!(
    /// Name of a queue (e.g. `default`, `another_1`).
    QueueName
);

name_type!(
    /// Opaque task identifier, usually the fully qualified task path
    /// (e.g. `app.proc.tasks.add`).
    TaskName
);

/// 空白だけの名前は「名前なし」と同じ扱い
pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}
