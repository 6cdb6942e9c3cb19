//! deferq: run persisted deferred tasks.

mod greeter;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use deferq_core::app::TASK_NOT_FOUND;
use deferq_core::{
    AppBuilder, NewTask, RunOnce, Runner, Scope, StoreConfig, Target, TaskId, TaskStore,
};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::greeter::Greeter;

/// Run persisted deferred tasks from a file or SQLite store.
#[derive(Parser)]
#[command(name = "deferq", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every pending task, forever, until Ctrl-C.
    RunAll,

    /// Run pending tasks of one tag, forever, until Ctrl-C.
    RunTag { tag: String },

    /// Run a single task once.
    Run { id: String },

    /// List pending tasks.
    List {
        #[arg(long)]
        tag: Option<String>,

        /// One JSON document per line instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Schedule a greeting through the built-in greeter target.
    EnqueueGreeting {
        name: String,

        #[arg(long, default_value = "Hello")]
        greeting: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        tag: Option<String>,

        /// Delay before the task becomes due.
        #[arg(long, default_value_t = 0)]
        delay_secs: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deferq=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        StoreConfig::from_file(path)?
    } else {
        StoreConfig::default()
    };

    let app = AppBuilder::new()
        .register::<Greeter>()?
        .expect_targets(&[Greeter::TYPE])
        .build()?;
    let store = app.open_store(&config).context("cannot open task store")?;

    match cli.command {
        Command::RunAll => run_forever(store, &config, Scope::All).await,
        Command::RunTag { tag } => run_forever(store, &config, Scope::Tag(tag)).await,
        Command::Run { id } => {
            let id = TaskId::new(id)?;
            match Runner::new(store, config.interval()).run_once(id).await {
                RunOnce::NotFound => println!("{TASK_NOT_FOUND}"),
                RunOnce::NotDue | RunOnce::Ran(_) => {}
            }
            Ok(())
        }
        Command::List { tag, json } => list(store.as_ref(), tag.as_deref(), json),
        Command::EnqueueGreeting {
            name,
            greeting,
            title,
            tag,
            delay_secs,
        } => {
            let mut new_task = NewTask::instance(&Greeter::new(greeting), "greet")?
                .arg(name)
                .scheduled_at(Utc::now() + Duration::seconds(delay_secs));
            if let Some(title) = title {
                new_task = new_task.title(title);
            }
            if let Some(tag) = tag {
                new_task = new_task.tag(&tag);
            }

            let task = store
                .create(new_task)?
                .context("task could not be persisted")?;
            println!("{}", task.id());
            Ok(())
        }
    }
}

async fn run_forever(
    store: Arc<dyn TaskStore>,
    config: &StoreConfig,
    scope: Scope,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested");
        }
        // ignore send error: the runner may already be gone
        let _ = shutdown_tx.send(true);
    });

    Runner::new(store, config.interval())
        .run_forever(scope, shutdown_rx)
        .await;
    Ok(())
}

fn list(store: &dyn TaskStore, tag: Option<&str>, json: bool) -> anyhow::Result<()> {
    let tasks = match tag {
        Some(tag) => store.get_by_tag(tag),
        None => store.get_all(),
    };

    for task in tasks.iter() {
        if json {
            println!("{}", serde_json::to_string(task)?);
        } else {
            println!(
                "{}\t{}\t{}\t{}/{}\t{}::{}",
                task.id(),
                task.tag(),
                task.scheduled_at().to_rfc3339(),
                task.attempts(),
                store.max_attempts(),
                task.target().type_name(),
                task.method(),
            );
        }
    }
    Ok(())
}
