use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use easel_config::{HostConfig, ShutdownMode};
use easel_dispatch::{Dispatcher, EventName, Mailbox};
use easel_host_http::HttpFetcher;
use easel_script_lua::LuaScript;
use easel_storage::{NoopNotifier, Storage};
use easel_task::TaskRunner;

/// Easel - an event-driven script host with background fetch storage
#[derive(Parser)]
#[command(name = "easel")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to a JSON host config (default: ~/.easel/config.json if present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Load a script, raise its lifecycle events and run until all fetches settle
  Run {
    /// Path to the Lua script
    script: PathBuf,

    /// Extra events to raise after the configured lifecycle events
    #[arg(long = "event")]
    events: Vec<String>,

    /// Print the final store as JSON on stdout
    #[arg(long)]
    dump: bool,
  },

  /// Load a script and list the events it handles
  Check {
    /// Path to the Lua script
    script: PathBuf,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref())?;

  match cli.command {
    Some(Commands::Run {
      script,
      events,
      dump,
    }) => {
      run_script(script, events, dump, config)?;
    }
    Some(Commands::Check { script }) => {
      check_script(script, config)?;
    }
    None => {
      println!("easel - use --help to see available commands");
    }
  }

  Ok(())
}

fn load_config(path: Option<&Path>) -> Result<HostConfig> {
  if let Some(path) = path {
    return HostConfig::load(path)
      .with_context(|| format!("failed to load config: {}", path.display()));
  }

  let default_path = dirs::home_dir().map(|home| home.join(".easel").join("config.json"));
  match default_path {
    Some(path) if path.exists() => HostConfig::load(&path)
      .with_context(|| format!("failed to load config: {}", path.display())),
    _ => Ok(HostConfig::default()),
  }
}

fn run_script(script: PathBuf, events: Vec<String>, dump: bool, config: HostConfig) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { run_script_async(script, events, dump, config).await })
}

async fn run_script_async(
  script_path: PathBuf,
  events: Vec<String>,
  dump: bool,
  config: HostConfig,
) -> Result<()> {
  let fetcher = HttpFetcher::new(&config.http).context("failed to create http client")?;
  let runner = TaskRunner::current()?;

  // Storage reports completions into the mailbox the dispatcher drains.
  let mailbox = Mailbox::new();
  let storage = Storage::new(Arc::new(fetcher), runner.clone(), mailbox.notifier());

  let script = LuaScript::from_file(&script_path, storage.clone(), &config.script)
    .with_context(|| format!("failed to load script: {}", script_path.display()))?;
  let table = script
    .handler_table()
    .context("failed to bind script handlers")?;

  let mut dispatcher = Dispatcher::new(table, storage.clone(), mailbox);

  for event in config.runtime.lifecycle_events.iter().chain(events.iter()) {
    let event = EventName::from(event.as_str());
    if let Err(e) = dispatcher.dispatch(&event) {
      error!(event = %event, error = %e, "event handler failed");
    }
  }

  let shutdown = tokio::select! {
      processed = dispatcher.run_until_idle() => {
          info!(processed, "all fetches settled");
          config.runtime.shutdown
      }
      _ = tokio::signal::ctrl_c() => {
          warn!(in_flight = storage.in_flight(), "interrupted, abandoning in-flight fetches");
          ShutdownMode::Abandon
      }
  };

  runner.shutdown(shutdown).await;

  if dump {
    println!("{}", serde_json::to_string_pretty(&storage.snapshot())?);
  }

  Ok(())
}

fn check_script(script: PathBuf, config: HostConfig) -> Result<()> {
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async { check_script_async(script, config).await })
}

async fn check_script_async(script_path: PathBuf, config: HostConfig) -> Result<()> {
  // Loading runs the chunk; nothing is dispatched, so completions go nowhere.
  let fetcher = HttpFetcher::new(&config.http).context("failed to create http client")?;
  let storage = Storage::new(Arc::new(fetcher), TaskRunner::current()?, NoopNotifier);

  let script = LuaScript::from_file(&script_path, storage, &config.script)
    .with_context(|| format!("failed to load script: {}", script_path.display()))?;

  for event in script.events() {
    println!("{}", event);
  }

  Ok(())
}
