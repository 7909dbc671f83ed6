// ABOUTME: Entry point for the multi-bot webhook host
// ABOUTME: Parses the CLI, loads config, initializes logging, and serves or lists bots

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use teambots::config::{Config, LogFormat};
use teambots::registry::BotRegistry;
use teambots::service::{self, BotService};
use teambots_core::MemoryStorage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "teambots")]
#[command(about = "Host several chat bots behind one webhook server", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to TEAMBOTS_CONFIG_PATH, then ./config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve every configured bot
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List known bot kinds and the routes configured bots resolve to
    Bots,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC! teambots crashed with the following error:\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    init_logging(config.logging.format);

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!(
                addr = %config.bind_address(),
                bots = config.bots.len(),
                authenticated = !config.credentials.app_id.is_empty(),
                "Configuration loaded"
            );
            service::serve(config).await
        }
        Commands::Bots => list_bots(config),
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn list_bots(config: Config) -> Result<()> {
    let registry = BotRegistry::new(
        Arc::new(config.settings()),
        Arc::new(MemoryStorage::new()),
    );
    println!("Known bot kinds: {}", registry.available_kinds().join(", "));

    let mut service = BotService::new(registry).with_bots(config.bot_refs());
    service.setup(axum::Router::new())?;
    for bot in service.health_report().bots {
        println!(
            "{:<20} {:<16} {}{}",
            bot.name,
            bot.kind,
            bot.route,
            if bot.authenticated { "" } else { "  (anonymous)" }
        );
    }
    Ok(())
}
