//! tapestry: run a simulated deploy and print the result tree it produced.
//!
//! ```text
//! tapestry --fail push --warn slack --timings
//! ```
//!
//! `validate` runs first; `build`, `push` and `notify` then run concurrently.
//! Any failure fails the deploy and the process exits non-zero.

mod simulate;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tapestry_core::ports::ChannelObserver;
use tapestry_core::trackers::{GeneratorMessage, StatusMessage};
use tapestry_core::{
    ErrorObject, GeneratorStatus, NodeId, NodeSummary, RenderedNode, ResultStatus, ResultTree,
    ResultType, TapestryConfig, TaskStatus, UnitOfWork, run_concurrent, run_unit,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::simulate::{Faults, SimulatedTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "tapestry", version, about = "Track a simulated deploy as a result tree")]
struct Cli {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Make a task or step fail (repeatable)
    #[arg(long = "fail", value_name = "TASK")]
    fail: Vec<String>,

    /// Make a task or step finish with a warning (repeatable)
    #[arg(long = "warn", value_name = "TASK")]
    warn: Vec<String>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Only show branches that contain a failure
    #[arg(long)]
    failures_only: bool,

    /// Show durations
    #[arg(long)]
    timings: bool,

    /// Show node detail payloads
    #[arg(long)]
    detail: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    summary: NodeSummary,
    aggregate_status: ResultStatus,
    tree: RenderedNode,
    task_messages: &'a [StatusMessage],
    generator_messages: &'a [GeneratorMessage],
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => TapestryConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TapestryConfig::default(),
    };
    config.render.failures_only |= cli.failures_only;
    config.render.include_timings |= cli.timings;
    config.render.include_detail |= cli.detail;

    let faults = Arc::new(Faults {
        fail: cli.fail.iter().cloned().collect(),
        warn: cli.warn.iter().cloned().collect(),
    });

    let mut tree = ResultTree::create(
        ResultType::Command,
        "deploy",
        Some(serde_json::json!({ "fail": cli.fail, "warn": cli.warn })),
    )?;
    let root = tree.root();
    tree.set_status(root, ResultStatus::Waiting, None)?;

    let (observer, mut events) = ChannelObserver::channel();
    let echo = config.status.echo_task_messages;
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if echo {
                info!(task = %event.task_name, at = %event.timestamp, "{}", event.message);
            }
        }
    });
    let mut progress = TaskStatus::new("deploy").with_observer(Arc::new(observer));
    let mut generator = GeneratorStatus::new();

    progress.record("validating inputs")?;
    let validate = SimulatedTask::new("validate", &["lint", "schema"], 10, faults.clone());
    let validated = run_unit(&mut tree, root, &validate).await?;
    log_outcome(&tree, validated, &mut generator)?;

    if tree.node(validated)?.is_failed() {
        let cause = tree.node(validated)?.error().cloned();
        let mut error = ErrorObject::new("validation failed");
        if let Some(cause) = cause {
            error = error.with_cause(cause);
        }
        tree.set_status(root, ResultStatus::Failure, Some(error))?;
    } else {
        progress.record("dispatching build, push and notify")?;
        let units: Vec<Arc<dyn UnitOfWork>> = vec![
            Arc::new(SimulatedTask::new("build", &["compile", "package"], 30, faults.clone())),
            Arc::new(SimulatedTask::new("push", &["upload", "tag"], 20, faults.clone())),
            Arc::new(SimulatedTask::new("notify", &["slack", "email"], 5, faults.clone())),
        ];
        let dispatched = run_concurrent(&mut tree, root, units).await?;
        for &id in &dispatched {
            log_outcome(&tree, id, &mut generator)?;
        }
        settle_root(&mut tree, root, &dispatched)?;
    }
    progress.record(format!("finished: {}", tree.node(root)?.status()))?;

    let task_messages = progress.messages().to_vec();
    drop(progress);
    drain.await.context("status drain task")?;

    let aggregate = tree.aggregate_status(root)?;
    let rendered = tree.render_tree(root, config.render)?;
    let summary = tree.summary(root)?;

    match cli.format {
        Format::Json => {
            let report = Report {
                summary,
                aggregate_status: aggregate,
                tree: rendered,
                task_messages: &task_messages,
                generator_messages: generator.messages(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Format::Text => {
            print!("{}", rendered.to_text());
            println!();
            println!(
                "{} {}: {} ({} of {} children failed)",
                summary.result_type,
                summary.name,
                aggregate,
                summary.failed_child_count,
                summary.child_count,
            );
            if config.status.print_generator_log {
                for m in generator.messages() {
                    let mark = if m.is_failure { "x" } else { "+" };
                    println!("  {mark} {}", m.message);
                }
            }
        }
    }

    Ok(if aggregate.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn log_outcome(tree: &ResultTree, id: NodeId, generator: &mut GeneratorStatus) -> Result<()> {
    let node = tree.node(id)?;
    match node.error() {
        Some(error) => generator.add_failure(format!("{}: {error}", node.name())),
        None => generator.add_message(format!("{}: {}", node.name(), node.status()), false),
    }
    Ok(())
}

/// Decide the deploy's own status from its concurrent tasks.
fn settle_root(tree: &mut ResultTree, root: NodeId, dispatched: &[NodeId]) -> Result<()> {
    let mut failed = Vec::new();
    let mut degraded = false;
    for &id in dispatched {
        let node = tree.node(id)?;
        if node.is_failed() {
            failed.push(id);
        } else if tree.aggregate_status(id)? == ResultStatus::Warning {
            degraded = true;
        }
    }

    if let Some(&first) = failed.first() {
        let node = tree.node(first)?;
        let mut error = ErrorObject::new(format!("{} of {} tasks failed", failed.len(), dispatched.len()));
        if let Some(cause) = node.error() {
            error = error.with_cause(cause.clone());
        }
        tree.set_status(root, ResultStatus::Failure, Some(error))?;
    } else if degraded {
        tree.set_status(root, ResultStatus::Warning, None)?;
    } else {
        tree.set_status(root, ResultStatus::Success, None)?;
    }
    Ok(())
}
