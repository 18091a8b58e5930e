use anyhow::Context;
use clap::{Parser, Subcommand};
use signalwatch_core::config::{PollSettings, Settings};
use signalwatch_core::poll::PollOrchestrator;
use signalwatch_core::schedule::{CycleRunner, Scheduler};
use signalwatch_core::storage::{PgStore, SignalStore};
use signalwatch_core::tracking::{self, TrackError};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "signalwatch_worker", about = "Watch tracked accounts and alert on new posts")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start tracking an account.
    Add {
        handle: String,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Stop tracking an account.
    Remove { handle: String },
    /// List tracked accounts.
    List,
    /// Run one poll cycle now and print its counters.
    Poll,
    /// Poll on a fixed interval until Ctrl-C.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(args.command, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run(command: Command, settings: &Settings) -> anyhow::Result<ExitCode> {
    let store = PgStore::connect(settings.require_database_url()?).await?;
    signalwatch_core::storage::migrate(store.pool()).await?;
    let store: Arc<dyn SignalStore> = Arc::new(store);

    match command {
        Command::Add { handle, user_id } => {
            match tracking::track(store.as_ref(), &handle, user_id.as_deref()).await {
                Ok(account) => {
                    println!("Now tracking @{}", account.handle);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err @ (TrackError::InvalidHandle(_) | TrackError::AlreadyTracked(_))) => {
                    eprintln!("{err}");
                    Ok(ExitCode::FAILURE)
                }
                Err(TrackError::Store(err)) => Err(err).context("failed to add account"),
            }
        }
        Command::Remove { handle } => {
            let (handle, removed) = tracking::untrack(store.as_ref(), &handle)
                .await
                .context("failed to remove account")?;
            if removed {
                println!("Stopped tracking @{handle}");
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("@{handle} is not tracked");
                Ok(ExitCode::FAILURE)
            }
        }
        Command::List => {
            let accounts = tracking::list(store.as_ref())
                .await
                .context("failed to list accounts")?;
            if accounts.is_empty() {
                println!("No tracked accounts");
            }
            for account in accounts {
                println!(
                    "@{:<16} last seen {:<20} added {}",
                    account.handle,
                    account.last_seen_post_id.as_deref().unwrap_or("-"),
                    account.created_at.format("%Y-%m-%d %H:%M UTC"),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Poll => {
            let runner = build_runner(settings, store)?;
            let stats = runner.run_once().await;
            println!("posts fetched:           {}", stats.posts_fetched);
            println!("posts processed:         {}", stats.posts_processed);
            println!("posts skipped duplicate: {}", stats.posts_skipped_duplicate);
            println!("notifications sent:      {}", stats.notifications_sent);
            println!("errors:                  {}", stats.errors);
            Ok(ExitCode::SUCCESS)
        }
        Command::Run => {
            let runner = build_runner(settings, store)?;
            let interval = runner.orchestrator().settings().interval;
            let scheduler = Scheduler::start(runner, interval);

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            tracing::info!("shutdown requested; waiting for in-flight cycle");
            scheduler.stop().await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_runner(settings: &Settings, store: Arc<dyn SignalStore>) -> anyhow::Result<Arc<CycleRunner>> {
    let poll = PollSettings::from_env()?;
    let orchestrator = PollOrchestrator::from_settings(settings, poll, store)?;
    Ok(Arc::new(CycleRunner::new(orchestrator)))
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
