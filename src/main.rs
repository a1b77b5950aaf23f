//! review-relay: watch a homework review status API and announce changes in
//! a Telegram chat.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use review_relay::channel::telegram::TelegramNotifier;
use review_relay::config::{Credentials, DEFAULT_CONFIG_PATH, RelayConfig, redact};
use review_relay::relay::{Relay, RelaySettings};
use review_relay::status::PollCursor;
use review_relay::status::client::StatusClient;

/// Relay homework review status changes to Telegram.
#[derive(Parser)]
#[command(name = "review-relay", version, about)]
struct Cli {
    /// Path to the settings file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll forever, notifying on every change.
    Run {
        /// Start watermark in epoch seconds (default: now).
        #[arg(long)]
        from: Option<i64>,
    },

    /// Run a single iteration, then exit.
    Once {
        /// Start watermark in epoch seconds (default: now).
        #[arg(long)]
        from: Option<i64>,
    },

    /// Validate settings and credentials without contacting anything.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Load environment variables (RUST_LOG included) before logging starts.
    dotenvy::dotenv().ok();
    init_logging(cli.verbose);

    match cli.command {
        Command::Run { from } => cmd_run(&cli.config, from).await,
        Command::Once { from } => cmd_once(&cli.config, from).await,
        Command::Check => cmd_check(&cli.config),
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "review_relay=debug"
    } else {
        "review_relay=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load settings and credentials. Missing credentials are fatal here, before
/// any loop starts.
fn load(config_path: &Path) -> Result<(RelayConfig, Credentials)> {
    let config = RelayConfig::load(config_path)?;
    let credentials = Credentials::from_env().inspect_err(|e| error!("{e}"))?;
    Ok((config, credentials))
}

fn build_relay(config_path: &Path, from: Option<i64>) -> Result<Relay> {
    let (config, credentials) = load(config_path)?;

    let source = StatusClient::new(
        config.endpoint.clone(),
        credentials.practicum_token.clone(),
        config.request_timeout(),
    )?;
    let notifier = TelegramNotifier::new(
        credentials.telegram_token.clone(),
        config.telegram_api_base.clone(),
        config.send_timeout(),
    )?;
    let cursor = from.map(PollCursor::new).unwrap_or_else(PollCursor::now);

    Ok(Relay::new(
        Box::new(source),
        Box::new(notifier),
        RelaySettings::from_config(&config, &credentials),
        cursor,
    ))
}

async fn cmd_run(config_path: &Path, from: Option<i64>) -> Result<()> {
    let relay = build_relay(config_path, from)?;

    tokio::select! {
        _ = relay.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.wrap_err("failed to listen for Ctrl-C")?;
            info!("interrupted, exiting");
        }
    }

    Ok(())
}

async fn cmd_once(config_path: &Path, from: Option<i64>) -> Result<()> {
    let mut relay = build_relay(config_path, from)?;
    let report = relay.tick().await;

    println!("Message: {}", report.candidate.message());
    println!("Outcome: {}", report.outcome);
    println!("Cursor:  {}", report.cursor);
    Ok(())
}

fn cmd_check(config_path: &Path) -> Result<()> {
    let (config, credentials) = load(config_path)?;

    println!("Config:           {}", config_path.display());
    println!("Endpoint:         {}", config.endpoint);
    println!("Poll interval:    {}s", config.poll_interval_secs);
    println!("Request timeout:  {}s", config.request_timeout_secs);
    println!("Send timeout:     {}s", config.send_timeout_secs);
    println!("Stamp messages:   {}", config.stamp_messages);
    println!("Telegram API:     {}", config.telegram_api_base);
    println!("Practicum token:  {}", redact(&credentials.practicum_token));
    println!("Telegram token:   {}", redact(&credentials.telegram_token));
    println!("Chat ID:          {}", credentials.chat_id);
    Ok(())
}
