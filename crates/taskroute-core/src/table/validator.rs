//! TableValidator - ルーティング表の起動時検証（Fail-fast）
//!
//! チェックは以下の順で行い、最初の失敗で止まる（エラーメッセージを曖昧にしないため）:
//! 1. 空チェック（exchanges → queue_to_exchange → queue_to_tasks）
//! 2. 形チェック（名前が空でない、kind がある、テンプレートが正しい、task 列が空でない）
//! 3. 参照されている exchange 数 == 宣言された exchange 数
//! 4. queue_to_exchange の件数 == queue_to_tasks の件数
//! 5. exchange 集合の一致（宣言 vs 参照）
//! 6. queue 集合の一致（queue_to_exchange vs queue_to_tasks）
//! 7. task の一意性（逆引き index 構築時に衝突したら失敗）
//! 8. default_queue が宣言済みの queue であること
//! 9. dead letter の exchange が宣言済みであること
//! 10. 同じ dead letter queue を指す target 同士で exchange / routing key が一致すること
//!     （routed queue なら、その queue 自身の routing key とも一致すること）

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, btree_map};

use tracing::{debug, info};

use super::validated::{Queue, ValidatedTable};
use super::{DeadLetterSpec, RouteTable};
use crate::domain::names::is_blank;
use crate::domain::{
    ConfigError, DeadLetterTarget, Exchange, ExchangeKind, ExchangeName, QueueName,
    RoutingKeyTemplate, Section, TaskName,
};

/// Validate a raw table and tag it as dispatch-ready.
pub fn validate(table: RouteTable) -> Result<ValidatedTable, ConfigError> {
    debug!(
        exchanges = table.exchanges.len(),
        queues = table.queue_to_exchange.len(),
        "validating routing table"
    );

    check_not_empty(&table)?;

    let exchanges = check_exchange_shapes(&table)?;
    check_queue_shapes(&table)?;
    check_task_shapes(&table)?;
    check_optional_shapes(&table)?;

    check_exchange_counts(&table)?;
    check_queue_counts(&table)?;
    check_exchange_sets(&table)?;
    check_queue_sets(&table)?;

    let task_index = build_task_index(&table)?;
    let default_queue = check_default_queue(&table)?;

    let dead_letter = table
        .dead_letter
        .as_ref()
        .map(|spec| resolve_dead_letter(spec, "table", &exchanges, &table))
        .transpose()?;
    let queues = build_queues(&table, &exchanges, dead_letter.as_ref())?;
    check_dead_letter_agreement(&queues, dead_letter.as_ref())?;

    let bindings = table
        .queue_to_tasks
        .into_iter()
        .map(|(queue, tasks)| {
            (
                QueueName::new(queue),
                tasks.into_iter().map(TaskName::new).collect(),
            )
        })
        .collect();

    info!(
        exchanges = exchanges.len(),
        queues = queues.len(),
        tasks = task_index.len(),
        "routing table validated"
    );

    Ok(ValidatedTable {
        exchanges,
        queues,
        bindings,
        task_index,
        default_queue,
        dead_letter,
    })
}

fn check_not_empty(table: &RouteTable) -> Result<(), ConfigError> {
    if table.exchanges.is_empty() {
        return Err(ConfigError::Empty(Section::Exchanges));
    }
    if table.queue_to_exchange.is_empty() {
        return Err(ConfigError::Empty(Section::QueueToExchange));
    }
    if table.queue_to_tasks.is_empty() {
        return Err(ConfigError::Empty(Section::QueueToTasks));
    }
    Ok(())
}

fn check_exchange_shapes(
    table: &RouteTable,
) -> Result<BTreeMap<ExchangeName, Exchange>, ConfigError> {
    let mut exchanges = BTreeMap::new();

    for (name, spec) in &table.exchanges {
        if is_blank(name) {
            return Err(ConfigError::BlankName {
                section: Section::Exchanges,
                key: name.clone(),
            });
        }

        let kind = spec
            .kind
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField {
                section: Section::Exchanges,
                key: name.clone(),
                field: "kind",
            })?
            .parse::<ExchangeKind>()
            .map_err(|e| ConfigError::InvalidValue {
                section: Section::Exchanges,
                key: name.clone(),
                field: "kind",
                reason: e.to_string(),
            })?;

        let routing_key = match spec.routing_key.as_deref() {
            Some(template) => {
                RoutingKeyTemplate::parse(template).map_err(|e| ConfigError::InvalidValue {
                    section: Section::Exchanges,
                    key: name.clone(),
                    field: "routing_key",
                    reason: e.to_string(),
                })?
            }
            None => RoutingKeyTemplate::default(),
        };

        let name = ExchangeName::new(name.as_str());
        exchanges.insert(
            name.clone(),
            Exchange {
                name,
                kind,
                routing_key,
            },
        );
    }

    Ok(exchanges)
}

fn check_queue_shapes(table: &RouteTable) -> Result<(), ConfigError> {
    for (queue, target) in &table.queue_to_exchange {
        if is_blank(queue) || is_blank(target.exchange()) {
            return Err(ConfigError::BlankName {
                section: Section::QueueToExchange,
                key: queue.clone(),
            });
        }
        if let Some(key) = target.routing_key()
            && is_blank(key)
        {
            return Err(ConfigError::InvalidValue {
                section: Section::QueueToExchange,
                key: queue.clone(),
                field: "routing_key",
                reason: "routing key is blank".to_string(),
            });
        }
        if let Some(spec) = target.dead_letter() {
            check_dead_letter_shape(spec, Section::QueueToExchange, queue)?;
        }
    }
    Ok(())
}

fn check_task_shapes(table: &RouteTable) -> Result<(), ConfigError> {
    for (queue, tasks) in &table.queue_to_tasks {
        if is_blank(queue) {
            return Err(ConfigError::BlankName {
                section: Section::QueueToTasks,
                key: queue.clone(),
            });
        }
        if tasks.is_empty() {
            return Err(ConfigError::EmptyTaskList {
                queue: queue.clone(),
            });
        }
        if tasks.iter().any(|t| is_blank(t)) {
            return Err(ConfigError::BlankName {
                section: Section::QueueToTasks,
                key: queue.clone(),
            });
        }
    }
    Ok(())
}

fn check_optional_shapes(table: &RouteTable) -> Result<(), ConfigError> {
    if let Some(queue) = table.default_queue.as_deref()
        && is_blank(queue)
    {
        return Err(ConfigError::BlankName {
            section: Section::DefaultQueue,
            key: queue.to_string(),
        });
    }
    if let Some(spec) = &table.dead_letter {
        check_dead_letter_shape(spec, Section::DeadLetter, "table")?;
    }
    Ok(())
}

fn check_dead_letter_shape(
    spec: &DeadLetterSpec,
    section: Section,
    key: &str,
) -> Result<(), ConfigError> {
    let missing = |field: &'static str| ConfigError::MissingField {
        section,
        key: key.to_string(),
        field,
    };
    if is_blank(&spec.exchange) {
        return Err(missing("dead_letter.exchange"));
    }
    if is_blank(&spec.queue) {
        return Err(missing("dead_letter.queue"));
    }
    if let Some(routing_key) = spec.routing_key.as_deref()
        && is_blank(routing_key)
    {
        return Err(ConfigError::InvalidValue {
            section,
            key: key.to_string(),
            field: "dead_letter.routing_key",
            reason: "routing key is blank".to_string(),
        });
    }
    Ok(())
}

fn referenced_exchanges(table: &RouteTable) -> BTreeSet<&str> {
    table
        .queue_to_exchange
        .values()
        .map(|target| target.exchange())
        .collect()
}

fn check_exchange_counts(table: &RouteTable) -> Result<(), ConfigError> {
    let referenced = referenced_exchanges(table).len();
    let declared = table.exchanges.len();
    if referenced != declared {
        return Err(ConfigError::ExchangeCountMismatch {
            declared,
            referenced,
        });
    }
    Ok(())
}

fn check_queue_counts(table: &RouteTable) -> Result<(), ConfigError> {
    let with_exchange = table.queue_to_exchange.len();
    let with_tasks = table.queue_to_tasks.len();
    if with_exchange != with_tasks {
        return Err(ConfigError::QueueCountMismatch {
            with_exchange,
            with_tasks,
        });
    }
    Ok(())
}

fn difference(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> Vec<String> {
    a.difference(b).map(|s| s.to_string()).collect()
}

fn check_exchange_sets(table: &RouteTable) -> Result<(), ConfigError> {
    let referenced = referenced_exchanges(table);
    let declared: BTreeSet<&str> = table.exchanges.keys().map(String::as_str).collect();

    let undeclared = difference(&referenced, &declared);
    let unreferenced = difference(&declared, &referenced);
    if !undeclared.is_empty() || !unreferenced.is_empty() {
        return Err(ConfigError::ExchangeSetMismatch {
            undeclared,
            unreferenced,
        });
    }
    Ok(())
}

fn check_queue_sets(table: &RouteTable) -> Result<(), ConfigError> {
    let with_exchange: BTreeSet<&str> =
        table.queue_to_exchange.keys().map(String::as_str).collect();
    let with_tasks: BTreeSet<&str> = table.queue_to_tasks.keys().map(String::as_str).collect();

    let without_tasks = difference(&with_exchange, &with_tasks);
    let without_exchange = difference(&with_tasks, &with_exchange);
    if !without_tasks.is_empty() || !without_exchange.is_empty() {
        return Err(ConfigError::QueueSetMismatch {
            without_tasks,
            without_exchange,
        });
    }
    Ok(())
}

/// 逆引き index（task → queue）を作る。既に埋まっている key への挿入が重複。
fn build_task_index(table: &RouteTable) -> Result<HashMap<TaskName, QueueName>, ConfigError> {
    let mut index = HashMap::new();
    for (queue, tasks) in &table.queue_to_tasks {
        for task in tasks {
            match index.entry(TaskName::new(task.as_str())) {
                Entry::Occupied(slot) => {
                    let first: &QueueName = slot.get();
                    return Err(ConfigError::DuplicateTask {
                        task: task.clone(),
                        first_queue: first.to_string(),
                        second_queue: queue.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(QueueName::new(queue.as_str()));
                }
            }
        }
    }
    Ok(index)
}

fn check_default_queue(table: &RouteTable) -> Result<Option<QueueName>, ConfigError> {
    match table.default_queue.as_deref() {
        None => Ok(None),
        Some(queue) if table.queue_to_exchange.contains_key(queue) => {
            Ok(Some(QueueName::new(queue)))
        }
        Some(queue) => Err(ConfigError::UnknownDefaultQueue(queue.to_string())),
    }
}

fn lookup_exchange<'a>(
    exchanges: &'a BTreeMap<ExchangeName, Exchange>,
    name: &str,
) -> Result<&'a Exchange, ConfigError> {
    exchanges
        .get(name)
        .ok_or_else(|| ConfigError::ExchangeSetMismatch {
            undeclared: vec![name.to_string()],
            unreferenced: Vec::new(),
        })
}

/// explicit > exchange template
fn routing_key_for(exchange: &Exchange, queue: &QueueName, explicit: Option<&str>) -> String {
    match explicit {
        Some(key) => key.to_string(),
        None => exchange.routing_key.render(&exchange.name, queue),
    }
}

fn resolve_dead_letter(
    spec: &DeadLetterSpec,
    scope: &str,
    exchanges: &BTreeMap<ExchangeName, Exchange>,
    table: &RouteTable,
) -> Result<DeadLetterTarget, ConfigError> {
    let exchange =
        exchanges
            .get(spec.exchange.as_str())
            .ok_or_else(|| ConfigError::UnknownDeadLetterExchange {
                scope: scope.to_string(),
                exchange: spec.exchange.clone(),
            })?;

    // dead letter queue が通常の queue でもある場合、その queue の binding と一致させる
    let routed = table.queue_to_exchange.get(&spec.queue);
    if let Some(target) = routed
        && target.exchange() != spec.exchange
    {
        return Err(ConfigError::DeadLetterQueueMismatch {
            queue: spec.queue.clone(),
            expected: spec.exchange.clone(),
            actual: target.exchange().to_string(),
        });
    }

    let queue = QueueName::new(spec.queue.as_str());
    let explicit = spec
        .routing_key
        .as_deref()
        .or_else(|| routed.and_then(|target| target.routing_key()));

    Ok(DeadLetterTarget {
        exchange: exchange.name.clone(),
        exchange_type: exchange.kind,
        routing_key: routing_key_for(exchange, &queue, explicit),
        queue,
    })
}

fn build_queues(
    table: &RouteTable,
    exchanges: &BTreeMap<ExchangeName, Exchange>,
    table_dead_letter: Option<&DeadLetterTarget>,
) -> Result<BTreeMap<QueueName, Queue>, ConfigError> {
    let mut queues = BTreeMap::new();

    for (name, target) in &table.queue_to_exchange {
        let exchange = lookup_exchange(exchanges, target.exchange())?;
        let name = QueueName::new(name.as_str());

        let dead_letter = match target.dead_letter() {
            Some(spec) if spec.queue == name.as_str() => {
                return Err(ConfigError::DeadLetterLoop(name.to_string()));
            }
            Some(spec) => Some(resolve_dead_letter(
                spec,
                &format!("queue '{name}'"),
                exchanges,
                table,
            )?),
            // dead letter queue 自身には table 全体の dead letter を付けない
            None => table_dead_letter.filter(|dl| dl.queue != name).cloned(),
        };

        queues.insert(
            name.clone(),
            Queue {
                routing_key: routing_key_for(exchange, &name, target.routing_key()),
                exchange: exchange.name.clone(),
                exchange_type: exchange.kind,
                name,
                dead_letter,
            },
        );
    }

    Ok(queues)
}

fn describe(target: &DeadLetterTarget) -> String {
    format!("{} with key '{}'", target.exchange, target.routing_key)
}

/// 同じ dead letter queue を指す target は exchange / routing key が一致すること。
/// routed queue でもあれば、その queue の routing key とも一致すること。
fn check_dead_letter_agreement(
    queues: &BTreeMap<QueueName, Queue>,
    table_dead_letter: Option<&DeadLetterTarget>,
) -> Result<(), ConfigError> {
    let targets = table_dead_letter
        .into_iter()
        .chain(queues.values().filter_map(|q| q.dead_letter.as_ref()));

    let mut seen: BTreeMap<&QueueName, &DeadLetterTarget> = BTreeMap::new();
    for target in targets {
        match seen.entry(&target.queue) {
            btree_map::Entry::Occupied(slot) => {
                let first = *slot.get();
                if first.exchange != target.exchange || first.routing_key != target.routing_key {
                    return Err(ConfigError::ConflictingDeadLetter {
                        queue: target.queue.to_string(),
                        first: describe(first),
                        second: describe(target),
                    });
                }
            }
            btree_map::Entry::Vacant(slot) => {
                slot.insert(target);
            }
        }

        if let Some(routed) = queues.get(&target.queue)
            && routed.routing_key != target.routing_key
        {
            return Err(ConfigError::DeadLetterRoutingKeyMismatch {
                queue: target.queue.to_string(),
                expected: routed.routing_key.clone(),
                actual: target.routing_key.clone(),
            });
        }
    }
    Ok(())
}
