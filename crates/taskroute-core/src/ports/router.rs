//! TaskRouter port - task 名から RoutingDirective への解決
//!
//! task queue フレームワークの routing hook に相当する。
//! フレームワークは task の引数（args / kwargs）も渡してくるが、
//! 静的ルーティングではそれらを見ない。

use serde_json::{Map, Value};

use crate::domain::{RouteError, RoutingDirective};

/// TaskRouter は dispatch 直前に呼ばれ、メッセージの宛先を決める
///
/// # 実装
/// - `Resolver`: 検証済みの静的ルーティング表
pub trait TaskRouter: Send + Sync {
    /// `args` / `kwargs` are the task call arguments passed by the dispatching
    /// framework; static routers ignore them.
    fn route(
        &self,
        task: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<RoutingDirective, RouteError>;

    /// Route used when the caller explicitly opts into default-queue fallback.
    fn default_route(&self) -> Option<RoutingDirective> {
        None
    }

    /// Route used when the caller chooses to dead-letter unroutable tasks.
    fn dead_letter_route(&self) -> Option<RoutingDirective> {
        None
    }
}
