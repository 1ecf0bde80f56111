//! Dispatcher - task 呼び出しを解決して publisher に流す
//!
//! # 流れ
//! 1. `TaskRouter::route` で directive を得る
//! 2. 未登録なら `UnroutedPolicy` に従う（デフォルトは Reject = エラーを返す）
//! 3. `OutgoingMessage` を組み立てて `MessagePublisher::publish`
//!
//! default queue / dead letter へのフォールバックは呼び出し側が明示的に選んだ時だけ。

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{MessageId, OutgoingMessage, RouteError, RoutingDirective, TaskName};
use crate::ports::{Clock, MessagePublisher, PublishError, SystemClock, TaskRouter};

/// What to do with a task the router does not know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnroutedPolicy {
    /// Return `TaskNotRouted` to the caller.
    #[default]
    Reject,
    /// Send it to the table's default queue.
    DefaultQueue,
    /// Send it to the table-wide dead-letter target.
    DeadLetter,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("task '{task}' is not routed and the table declares no {policy:?} route")]
    NoFallback {
        task: String,
        policy: UnroutedPolicy,
    },
}

pub struct Dispatcher<R: ?Sized, P, C = SystemClock> {
    router: Arc<R>,
    publisher: P,
    clock: C,
    policy: UnroutedPolicy,
}

impl<R, P, C> Dispatcher<R, P, C>
where
    R: TaskRouter + ?Sized,
    P: MessagePublisher,
    C: Clock,
{
    pub fn new(router: Arc<R>, publisher: P, clock: C) -> Self {
        Self {
            router,
            publisher,
            clock,
            policy: UnroutedPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: UnroutedPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> UnroutedPolicy {
        self.policy
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Route `task` and publish it. Returns the id of the published message.
    pub async fn dispatch(
        &self,
        task: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<MessageId, DispatchError> {
        let directive = self.directive_for(task, &args, &kwargs)?;

        let now = self.clock.now();
        let message = OutgoingMessage {
            id: MessageId::generate(now),
            task: TaskName::new(task),
            args,
            kwargs,
            directive,
            published_at: now,
        };
        let id = message.id;

        debug!(
            %id,
            task,
            exchange = %message.directive.exchange_name,
            routing_key = %message.directive.routing_key,
            "publishing task"
        );
        self.publisher.publish(message).await?;
        Ok(id)
    }

    fn directive_for(
        &self,
        task: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<RoutingDirective, DispatchError> {
        let err = match self.router.route(task, args, kwargs) {
            Ok(directive) => return Ok(directive),
            Err(err) => err,
        };

        let fallback = match self.policy {
            UnroutedPolicy::Reject => return Err(err.into()),
            UnroutedPolicy::DefaultQueue => self.router.default_route(),
            UnroutedPolicy::DeadLetter => self.router.dead_letter_route(),
        };

        match fallback {
            Some(directive) => {
                warn!(
                    task,
                    policy = ?self.policy,
                    queue = %directive.queue_name,
                    "task not routed, using fallback route"
                );
                Ok(directive)
            }
            None => Err(DispatchError::NoFallback {
                task: task.to_string(),
                policy: self.policy,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Resolver;
    use crate::domain::ExchangeKind;
    use crate::impls::InMemoryPublisher;
    use crate::ports::FixedClock;
    use crate::table::{DeadLetterSpec, RouteTable};
    use crate::testing::calc_table;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use serde_json::json;

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap())
    }

    fn dispatcher(table: RouteTable) -> Dispatcher<Resolver, InMemoryPublisher, FixedClock> {
        let resolver = Arc::new(Resolver::from_table(table).unwrap());
        Dispatcher::new(resolver, InMemoryPublisher::new(), clock())
    }

    #[tokio::test]
    async fn dispatch_publishes_to_the_resolved_queue() {
        let d = dispatcher(calc_table());

        let id = d
            .dispatch("app.proc.tasks.mul", vec![json!(3), json!(4)], Map::new())
            .await
            .unwrap();

        let messages = d.publisher().drain("another_1").await;
        assert_eq!(messages.len(), 1);
        let m = &messages[0];
        assert_eq!(m.id, id);
        assert_eq!(m.task.as_str(), "app.proc.tasks.mul");
        assert_eq!(m.args, vec![json!(3), json!(4)]);
        assert_eq!(m.directive.exchange_name.as_str(), "beta");
        assert_eq!(m.directive.routing_key, "beta.another_1");
        assert_eq!(m.published_at, clock().now());
        assert_eq!(id.as_ulid().timestamp_ms(), clock().now().timestamp_millis() as u64);
    }

    #[tokio::test]
    async fn unrouted_task_is_rejected_by_default() {
        let d = dispatcher(calc_table());
        assert_eq!(d.policy(), UnroutedPolicy::Reject);

        let err = d.dispatch("app.proc.tasks.pow", vec![], Map::new()).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Route(RouteError::TaskNotRouted(ref t)) if t == "app.proc.tasks.pow"
        ));
        assert_eq!(d.publisher().total().await, 0);
    }

    #[tokio::test]
    async fn default_queue_fallback_is_opt_in() {
        let d = dispatcher(calc_table()).with_policy(UnroutedPolicy::DefaultQueue);

        d.dispatch("app.proc.tasks.pow", vec![], Map::new()).await.unwrap();

        let messages = d.publisher().drain("default").await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].directive.routing_key, "alpha.default");
    }

    #[tokio::test]
    async fn dead_letter_fallback_uses_dead_letter_target() {
        let table = RouteTable::builder()
            .exchange("alpha", ExchangeKind::Direct)
            .queue("default", "alpha", ["add"])
            .dead_letter(DeadLetterSpec::new("alpha", "dlq"))
            .build();
        let d = dispatcher(table).with_policy(UnroutedPolicy::DeadLetter);

        d.dispatch("unknown", vec![], Map::new()).await.unwrap();
        assert_eq!(d.publisher().len("dlq").await, 1);
    }

    #[rstest]
    #[case::default_queue(UnroutedPolicy::DefaultQueue)]
    #[case::dead_letter(UnroutedPolicy::DeadLetter)]
    #[tokio::test]
    async fn fallback_without_declared_route_fails(#[case] policy: UnroutedPolicy) {
        let table = RouteTable::builder()
            .exchange("alpha", ExchangeKind::Direct)
            .queue("default", "alpha", ["add"])
            .build();
        let d = dispatcher(table).with_policy(policy);

        let err = d.dispatch("unknown", vec![], Map::new()).await.unwrap_err();
        assert!(matches!(err, DispatchError::NoFallback { policy: p, .. } if p == policy));
    }

    #[tokio::test]
    async fn publish_errors_propagate() {
        let d = dispatcher(calc_table());
        d.publisher().close();

        let err = d
            .dispatch("app.proc.tasks.add", vec![], Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Publish(PublishError::Closed)));
    }

    struct FixedRouter(RoutingDirective);

    impl TaskRouter for FixedRouter {
        fn route(
            &self,
            _task: &str,
            _args: &[Value],
            _kwargs: &Map<String, Value>,
        ) -> Result<RoutingDirective, RouteError> {
            Ok(self.0.clone())
        }
    }

    struct CountingPublisher(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl MessagePublisher for CountingPublisher {
        async fn publish(&self, _message: OutgoingMessage) -> Result<(), PublishError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(())
        }
    }

    #[tokio::test]
    async fn works_with_any_router_behind_a_trait_object() {
        let resolver = Resolver::from_table(calc_table()).unwrap();
        let directive = resolver.resolve("app.proc.tasks.add").unwrap().clone();
        let router: Arc<dyn TaskRouter> = Arc::new(FixedRouter(directive));

        let d = Dispatcher::new(
            router,
            CountingPublisher(std::sync::atomic::AtomicUsize::new(0)),
            SystemClock,
        );
        d.dispatch("anything", vec![], Map::new()).await.unwrap();
        d.dispatch("else", vec![], Map::new()).await.unwrap();

        assert_eq!(
            d.publisher().0.load(std::sync::atomic::Ordering::Relaxed),
            2
        );
    }
}
