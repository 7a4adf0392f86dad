//! Surface GW - route MIDI control surfaces and pulses to show software

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use surface_gw::cli::{self, Command};
use surface_gw::config::{watcher::ConfigWatcher, AppConfig};
use surface_gw::gateway::Gateway;

/// Surface Gateway - map MIDI keys to OSC, UDP, CSV and MIDI targets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Start an interactive console
    #[arg(long)]
    repl: bool,

    /// Do not reload the configuration when the file changes
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level, args.json_logs)?;

    if args.list_ports {
        cli::list_ports_formatted();
        return Ok(());
    }

    info!("Starting Surface GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let (mut watcher, config) = if args.no_watch {
        (None, AppConfig::load(&args.config).await?)
    } else {
        let (watcher, config) = ConfigWatcher::new(args.config.clone()).await?;
        info!("Configuration loaded with hot-reload enabled");
        (Some(watcher), config)
    };

    let mut gateway = Gateway::start(config)?;

    let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);
    if args.repl {
        cli::spawn_repl(command_tx)?;
    } else {
        drop(command_tx);
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }

            Some(new_config) = next_config(&mut watcher) => {
                info!("Applying new configuration");
                if let Err(e) = gateway.reload(new_config) {
                    warn!("Keeping previous configuration: {:#}", e);
                }
            }

            Some(command) = command_rx.recv() => {
                match cli::execute(command, &gateway).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => warn!("{:#}", e),
                }
            }
        }
    }

    // A console blocked on input ends with the process
    gateway.shutdown();

    info!("Surface GW shutdown complete");
    Ok(())
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
