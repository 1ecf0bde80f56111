use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, json};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskroute_core::{
    Dispatcher, InMemoryPublisher, Resolver, RouteTable, RoutingDirective, SystemClock, Topology,
    UnroutedPolicy,
};

#[derive(Parser, Debug)]
#[command(name = "taskroute")]
#[command(about = "Static task routing table tool", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a routing table and print a summary
    Check {
        #[arg(long, env = "TASKROUTE_ROUTES", default_value = "config/routes.json")]
        routes: PathBuf,
    },
    /// Resolve task identifiers to their routing directives (JSON lines)
    Resolve {
        #[arg(long, env = "TASKROUTE_ROUTES", default_value = "config/routes.json")]
        routes: PathBuf,

        #[arg(required = true)]
        tasks: Vec<String>,
    },
    /// Print the exchanges and queues to declare on the broker
    Topology {
        #[arg(long, env = "TASKROUTE_ROUTES", default_value = "config/routes.json")]
        routes: PathBuf,
    },
    /// Dispatch a few tasks through an in-memory publisher
    Demo {
        #[arg(long, env = "TASKROUTE_ROUTES", default_value = "config/routes.json")]
        routes: PathBuf,
    },
}

#[derive(Serialize)]
struct Resolution<'a> {
    task: &'a str,
    #[serde(flatten)]
    directive: &'a RoutingDirective,
}

fn load(path: &Path) -> anyhow::Result<Resolver> {
    tracing::debug!(path = %path.display(), "loading routing table");
    let table = RouteTable::from_json_file(path)
        .with_context(|| format!("failed to load routing table {}", path.display()))?;
    let resolver = Resolver::from_table(table)
        .with_context(|| format!("invalid routing table {}", path.display()))?;
    Ok(resolver)
}

fn check(path: &Path) -> anyhow::Result<()> {
    let resolver = load(path)?;
    let table = resolver.table();

    println!(
        "ok: {} exchanges, {} queues, {} tasks",
        table.exchanges().count(),
        table.queues().count(),
        resolver.len()
    );
    if let Some(queue) = table.default_queue() {
        println!("default queue: {}", queue.name);
    }
    if let Some(dl) = table.dead_letter() {
        println!("dead letter: {} -> {}", dl.exchange, dl.queue);
    }
    Ok(())
}

fn resolve(path: &Path, tasks: &[String]) -> anyhow::Result<()> {
    let resolver = load(path)?;

    // 未登録の task は最初の 1 件で失敗させる
    for task in tasks {
        let directive = resolver.resolve(task)?;
        let line = serde_json::to_string(&Resolution { task, directive })?;
        println!("{line}");
    }
    Ok(())
}

fn topology(path: &Path) -> anyhow::Result<()> {
    let resolver = load(path)?;
    let topology = Topology::from(&resolver);
    println!("{}", serde_json::to_string_pretty(&topology)?);
    Ok(())
}

async fn demo(path: &Path) -> anyhow::Result<()> {
    let resolver = Arc::new(load(path)?);
    let dispatcher = Dispatcher::new(resolver, InMemoryPublisher::new(), SystemClock)
        .with_policy(UnroutedPolicy::DefaultQueue);

    let calls = [
        ("app.proc.tasks.add", json!([1, 2])),
        ("app.proc.tasks.mul", json!([3, 4])),
        ("app.proc.tasks.div", json!([8, 2])),
        ("app.proc.tasks.modulo", json!([7, 3])),
        ("app.io.tasks.get_data", json!(["https://example.com/items/1"])),
        // 未登録: DefaultQueue ポリシーで default に落ちる
        ("app.proc.tasks.pow", json!([2, 10])),
    ];

    for (task, args) in calls {
        let args = args.as_array().cloned().unwrap_or_default();
        let id = dispatcher.dispatch(task, args, Map::new()).await?;
        println!("dispatched: {task} id={id}");
    }

    for (queue, count) in dispatcher.publisher().counts().await {
        println!("{queue}: {count}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match args.command {
        Command::Check { routes } => check(&routes),
        Command::Resolve { routes, tasks } => resolve(&routes, &tasks),
        Command::Topology { routes } => topology(&routes),
        Command::Demo { routes } => demo(&routes).await,
    }
}
