//! App - アプリケーション層
//!
//! 検証済みの表と ports を組み合わせる。
//!
//! # 主要コンポーネント
//! - **Resolver**: task → RoutingDirective の解決（`TaskRouter` の実装）
//! - **Topology**: broker に宣言する exchange / queue の一覧
//! - **Dispatcher**: 解決したメッセージを `MessagePublisher` に流す

pub mod dispatcher;
pub mod resolver;
pub mod topology;

pub use self::dispatcher::{DispatchError, Dispatcher, UnroutedPolicy};
pub use self::resolver::Resolver;
pub use self::topology::{ExchangeDeclaration, QueueDeclaration, Topology};
