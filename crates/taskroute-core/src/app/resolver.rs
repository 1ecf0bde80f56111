//! Resolver - task 識別子 → RoutingDirective の O(1) 解決
//!
//! # 設計
//! - 構築時に一度だけ逆引き index（task → directive）を作る: O(n)
//! - 構築後は不変。`&self` だけで読むのでロック不要、`Arc<Resolver>` で共有する
//! - 未登録の task はエラー（default queue への暗黙のフォールバックはしない）
//!
//! 表を差し替えたい場合は新しい Resolver を作って `Arc` ごと入れ替える。

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, trace};

use crate::domain::{ConfigError, RouteError, RoutingDirective, TaskName};
use crate::ports::TaskRouter;
use crate::table::{RouteTable, ValidatedTable, validate};

#[derive(Debug)]
pub struct Resolver {
    table: ValidatedTable,
    index: HashMap<TaskName, Arc<RoutingDirective>>,
}

impl Resolver {
    pub fn new(table: ValidatedTable) -> Self {
        let mut index = HashMap::with_capacity(table.task_count());
        for queue in table.queues() {
            // 同じ queue の task は同じ directive を共有する
            let directive = Arc::new(queue.directive());
            for task in table.tasks_of(queue.name.as_str()) {
                index.insert(task.clone(), Arc::clone(&directive));
            }
        }

        info!(tasks = index.len(), "resolver ready");
        Self { table, index }
    }

    /// Validate `table` and build a resolver from it in one step.
    pub fn from_table(table: RouteTable) -> Result<Self, ConfigError> {
        Ok(Self::new(validate(table)?))
    }

    pub fn resolve(&self, task: &str) -> Result<&RoutingDirective, RouteError> {
        match self.index.get(task) {
            Some(directive) => {
                trace!(task, queue = %directive.queue_name, "task resolved");
                Ok(directive)
            }
            None => Err(RouteError::TaskNotRouted(task.to_string())),
        }
    }

    pub fn table(&self) -> &ValidatedTable {
        &self.table
    }

    /// Number of routed task identifiers.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl TaskRouter for Resolver {
    fn route(
        &self,
        task: &str,
        _args: &[Value],
        _kwargs: &Map<String, Value>,
    ) -> Result<RoutingDirective, RouteError> {
        self.resolve(task).cloned()
    }

    fn default_route(&self) -> Option<RoutingDirective> {
        self.table.default_queue().map(|q| q.directive())
    }

    fn dead_letter_route(&self) -> Option<RoutingDirective> {
        self.table.dead_letter().map(|dl| dl.directive())
    }
}
