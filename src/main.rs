//! # LinkMind — Bookmark Reminder Scheduler
//!
//! Schedules, dispatches, and reconciles read-later reminders for bookmarks.
//! The CRUD layer posts bookmark lifecycle events to the API; this service
//! owns everything from "when is the reminder due" to "the push was delivered".
//!
//! Usage:
//!   linkmind serve                       # Start API + scheduler loops
//!   linkmind serve --port 8080           # Custom API port
//!   linkmind dispatch-now                # One dispatch pass, then exit
//!   linkmind status <bookmark-id>        # Reminder status for a bookmark
//!   linkmind init-config                 # Write a default config file

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linkmind_api::AppState;
use linkmind_core::{Clock, LinkMindConfig, SystemClock, NotificationSender};
use linkmind_scheduler::{
    DigestAggregator, DispatchWorker, LogSender, ReconciliationSweeper, SchedulingGateway,
    WebhookSender, spawn_digest_loop, spawn_dispatch_loop, spawn_sweep_loop,
};
use linkmind_store::{SqliteBookmarkRepo, TaskStore};

#[derive(Parser)]
#[command(
    name = "linkmind",
    version,
    about = "🔖 LinkMind — bookmark reminder scheduling and dispatch"
)]
struct Cli {
    /// Config file path (default: ~/.linkmind/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the API server and background scheduler loops
    Serve {
        /// Override the API port from the config file
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a single dispatch pass against the local store, then exit
    DispatchNow,
    /// Show the reminder status for a bookmark
    Status { bookmark_id: String },
    /// Write a default config file and exit
    InitConfig,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(cli: &Cli) -> Result<LinkMindConfig> {
    match &cli.config {
        Some(path) => Ok(LinkMindConfig::load_from(Path::new(&expand_path(path)))?),
        None => Ok(LinkMindConfig::load()?),
    }
}

/// Open the stores and wire the scheduler components onto them.
fn build_state(config: LinkMindConfig) -> Result<Arc<AppState>> {
    let db_path = expand_path(&config.store.db_path);
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = Arc::new(TaskStore::open(Path::new(&db_path))?);
    let bookmarks = Arc::new(SqliteBookmarkRepo::open(Path::new(&db_path))?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let sender: Arc<dyn NotificationSender> = if config.sender.push_url.is_empty() {
        tracing::warn!("⚠️ No push_url configured — reminders are logged, not sent");
        Arc::new(LogSender)
    } else {
        Arc::new(WebhookSender::new(&config.sender))
    };

    let gateway = Arc::new(SchedulingGateway::new(store.clone(), clock.clone()));
    let worker = Arc::new(DispatchWorker::new(
        store.clone(),
        bookmarks.clone(),
        sender,
        clock.clone(),
        &config.scheduler,
    ));

    Ok(Arc::new(AppState {
        config,
        store,
        bookmarks,
        gateway,
        worker,
        clock,
        start_time: std::time::Instant::now(),
    }))
}

async fn serve(mut config: LinkMindConfig, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        config.api.port = port;
    }
    let scheduler = config.scheduler.clone();
    let state = build_state(config)?;

    let sweeper = Arc::new(ReconciliationSweeper::new(
        state.store.clone(),
        state.bookmarks.clone(),
        state.clock.clone(),
        chrono::Duration::seconds(scheduler.audit_retention_secs as i64),
    ));
    let digest_sender: Arc<dyn NotificationSender> = if state.config.sender.push_url.is_empty() {
        Arc::new(LogSender)
    } else {
        Arc::new(WebhookSender::new(&state.config.sender))
    };
    let digest = Arc::new(DigestAggregator::new(
        state.bookmarks.clone(),
        digest_sender,
        state.clock.clone(),
    ));

    spawn_dispatch_loop(state.worker.clone(), scheduler.dispatch_interval_secs);
    spawn_sweep_loop(sweeper, scheduler.sweep_interval_secs);
    spawn_digest_loop(digest, scheduler.digest_interval_secs);

    println!("🔖 LinkMind v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "   📡 API:       http://{}:{}",
        state.config.api.host, state.config.api.port
    );
    println!("   🗄️  Database:  {}", expand_path(&state.config.store.db_path));
    println!(
        "   ⏰ Dispatch:  every {}s (batch {})",
        scheduler.dispatch_interval_secs, scheduler.dispatch_batch_size
    );
    println!("   🧹 Sweep:     every {}s", scheduler.sweep_interval_secs);
    println!("   📰 Digest:    every {}s", scheduler.digest_interval_secs);
    println!();

    linkmind_api::start(state).await
}

async fn dispatch_now(config: LinkMindConfig) -> Result<()> {
    let state = build_state(config)?;
    let stats = state.worker.run_once().await?;
    println!(
        "📣 Dispatch pass: {} claimed, {} delivered, {} retried, {} failed, {} cancelled",
        stats.claimed, stats.delivered, stats.retried, stats.failed, stats.cancelled
    );
    Ok(())
}

fn status(config: LinkMindConfig, bookmark_id: &str) -> Result<()> {
    let state = build_state(config)?;
    match state.store.status(bookmark_id)? {
        Some(task) => {
            println!("🔖 Bookmark {bookmark_id}");
            println!("   State:    {}", task.state);
            println!("   Due at:   {}", task.due_at.to_rfc3339());
            println!("   Attempts: {}", task.attempt);
            if let Some(err) = &task.last_error {
                println!("   Last err: {err}");
            }
        }
        None => println!("🔖 Bookmark {bookmark_id}: no reminder task"),
    }
    Ok(())
}

fn init_config(cli: &Cli) -> Result<()> {
    let path = match &cli.config {
        Some(p) => std::path::PathBuf::from(expand_path(p)),
        None => LinkMindConfig::default_path(),
    };
    if path.exists() {
        println!("⚠️  Config already exists at {}", path.display());
        return Ok(());
    }
    LinkMindConfig::default().save_to(&path)?;
    println!("✅ Wrote default config to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "linkmind=debug,tower_http=debug"
    } else {
        "linkmind=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // init-config must run before loading: the file may not exist yet.
    if matches!(cli.command, Command::InitConfig) {
        return init_config(&cli);
    }

    let config = load_config(&cli)?;

    match &cli.command {
        Command::Serve { port } => serve(config, *port).await,
        Command::DispatchNow => dispatch_now(config).await,
        Command::Status { bookmark_id } => status(config, bookmark_id),
        Command::InitConfig => unreachable!(),
    }
}
