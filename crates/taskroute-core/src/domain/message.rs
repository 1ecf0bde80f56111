//! OutgoingMessage - publisher に渡す 1 件のタスクメッセージ
//!
//! ID は ULID（生成順にソート可能、分散生成可能）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

use super::directive::RoutingDirective;
use super::names::TaskName;

/// Identifier of a published message.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Ulid);

impl MessageId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Clock の時刻を先頭 48bit に埋め込んだ ID を作る
    pub fn generate(at: DateTime<Utc>) -> Self {
        let ms = at.timestamp_millis().max(0) as u64;
        Self(Ulid::from_parts(ms, Ulid::new().random()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A task message addressed by a resolved directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: MessageId,
    pub task: TaskName,
    pub args: Vec<serde_json::Value>,
    pub kwargs: serde_json::Map<String, serde_json::Value>,
    pub directive: RoutingDirective,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn generated_ids_carry_the_clock_time() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id = MessageId::generate(at);
        assert_eq!(id.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
        assert!(id.to_string().starts_with("msg-"));
    }

    #[test]
    fn ids_generated_at_same_instant_are_distinct() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_ne!(MessageId::generate(at), MessageId::generate(at));
    }
}
