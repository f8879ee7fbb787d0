use clap::{Parser, Subcommand};
use moderation_client::{load_config, LiveClient, LiveConfig, LiveEvent};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn, Level};

/// Environment variable consulted when `--token` is not given
const TOKEN_ENV: &str = "MODERATION_TOKEN";

#[derive(Parser)]
#[command(name = "moderation-client")]
#[command(about = "Live event client for the image moderation service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Origin of the admin site (overrides config file)
    #[arg(long)]
    origin: Option<String>,

    /// Session token (falls back to $MODERATION_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Log level
    #[arg(short, long, default_value = "info", value_parser = clap::value_parser!(Level))]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and follow live events until Ctrl+C
    Monitor,

    /// Connect once without reconnecting and report the result
    Probe,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    debug!(
        "Parsed command line arguments: config={:?}, origin={:?}, log_level={:?}",
        args.config, args.origin, args.log_level
    );

    let mut live_config = if let Some(config_path) = &args.config {
        debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?.live
    } else {
        debug!("Using default configuration");
        LiveConfig::default()
    };

    if let Some(origin) = args.origin {
        live_config.origin = origin;
    }

    let token = match args.token {
        Some(token) => token,
        None => std::env::var(TOKEN_ENV)
            .map_err(|_| format!("no token given; pass --token or set {}", TOKEN_ENV))?,
    };

    match args.command {
        Commands::Monitor => run_monitor(live_config, &token).await?,
        Commands::Probe => run_probe(live_config, &token).await?,
    }

    Ok(())
}

async fn run_monitor(config: LiveConfig, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = LiveClient::new(config);
    let mut receiver = client.subscribe();

    // A failed first attempt is retried in the background
    if let Err(e) = client.connect(token).await {
        warn!("Initial connection failed: {}", e);
    }

    info!("Monitoring live events (press Ctrl+C to stop)...");

    loop {
        tokio::select! {
            event = receiver.recv() => {
                match event {
                    Ok(LiveEvent::Dispatched { event }) => {
                        let state = client.snapshot().await;
                        info!(
                            "Event: {} - images={} pending={} completed={}",
                            event,
                            state.images().len(),
                            state.pending().len(),
                            state.completed().len()
                        );
                    }
                    Ok(LiveEvent::ReconnectFailed { reason }) => {
                        warn!("Giving up: {}", reason);
                        break;
                    }
                    Ok(event) => info!("{}", event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Monitor fell behind, skipped {} events", missed);
                    }
                    Err(e) => {
                        debug!("Event receiver error: {}", e);
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}

async fn run_probe(mut config: LiveConfig, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    config.reconnect.enabled = false;
    let client = LiveClient::new(config);

    client.connect(token).await?;
    info!("Connected to {}", client.config().ws_url()?);

    client.disconnect().await?;
    Ok(())
}
