use clap::{Parser, Subcommand};
use lectern_core::config::LecternConfig;
use lectern_publisher::PublisherEngine;
use tracing::{error, info};

mod startup;

#[derive(Parser)]
#[command(
    name = "lectern-worker",
    about = "Publishes scheduled lessons and cascades publication to their programs",
    version
)]
struct Cli {
    /// Config file (default: $LECTERN_CONFIG, then ./lectern.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    /// Run the publication loop until SIGINT/SIGTERM (default)
    Run,
    /// Run a single tick, print its report as JSON and exit
    Once,
    /// Insert the demo catalog (idempotent) and exit
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lectern_worker=info,lectern_publisher=info,lectern_catalog=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // config: --config > LECTERN_CONFIG env > ./lectern.toml
    let config_path = cli.config.or_else(|| std::env::var("LECTERN_CONFIG").ok());
    let config = LecternConfig::load(config_path.as_deref()).inspect_err(|e| {
        error!(code = e.code(), "config load failed: {e}");
    })?;

    // Failing to reach the store at startup is the one fatal error class.
    let mut conn = startup::open_store(&config).inspect_err(|e| {
        error!(code = e.code(), path = %config.database.path, "cannot open store: {e}");
    })?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let engine = PublisherEngine::new(conn, config.publisher)?;
            run_until_shutdown(engine).await
        }
        Command::Once => {
            let mut engine = PublisherEngine::new(conn, config.publisher)?;
            let report = engine.tick()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Seed => {
            let summary = lectern_catalog::seed::seed_demo(&mut conn, chrono::Utc::now())?;
            info!(
                programs = summary.programs,
                terms = summary.terms,
                lessons = summary.lessons,
                "seed complete"
            );
            Ok(())
        }
    }
}

/// Drive the engine on a background task and stop it on SIGINT/SIGTERM.
///
/// The engine observes shutdown only between ticks, so awaiting its task
/// guarantees no transaction is left half-way when the process exits.
async fn run_until_shutdown(engine: PublisherEngine) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(async move { engine.run(shutdown_rx).await });

    startup::shutdown_signal().await;

    let _ = shutdown_tx.send(true);
    handle.await?;
    info!("lectern worker stopped");
    Ok(())
}
