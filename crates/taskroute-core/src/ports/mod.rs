//! Ports - 抽象化レイヤー
//!
//! 外部（task queue フレームワーク、broker、時計）とのインターフェース。
//! ルーティングのコア（table / Resolver）はどの port にも依存しない。

pub mod clock;
pub mod publisher;
pub mod router;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::publisher::{MessagePublisher, PublishError};
pub use self::router::TaskRouter;
