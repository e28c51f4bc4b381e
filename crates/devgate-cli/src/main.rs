//! Devgate CLI - dev server, preview server and WebSocket probes
//!
//! `dev` and `preview` run the Pingora proxy; `probe` and `check` exercise
//! the backend's WebSocket endpoints directly.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CheckCommand, ConfigCommand, ProbeCommand, ServeCommand};
use devgate_proxy::ServeMode;
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DEVGATE_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "DEVGATE_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the dev server (public dir + proxy rules)
    Dev(ServeCommand),
    /// Serve the production build output with the same proxy rules
    Preview(ServeCommand),
    /// Open one WebSocket connection and print its lifecycle events
    Probe(ProbeCommand),
    /// Log in and exercise the backend's WebSocket channels
    Check(CheckCommand),
    /// Print the resolved configuration
    Config(ConfigCommand),
}

fn init_tracing(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    // If RUST_LOG is set, use it directly; otherwise use our default filter
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .map_err(|e| anyhow::anyhow!("Invalid RUST_LOG environment variable: {}", e))?
    } else {
        tracing_subscriber::EnvFilter::try_new(format!(
            "devgate={level},\
             devgate_config={level},\
             devgate_proxy={level},\
             devgate_probe={level},\
             pingora=warn,\
             h2=warn,\
             hyper=warn,\
             reqwest=warn,\
             tungstenite=warn,\
             tokio_tungstenite=warn",
            level = log_level
        ))
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", log_level, e))?
    };

    let fmt_layer = match log_format {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default subscriber: {}", e))?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, &cli.log_format)?;

    // The proxy commands are synchronous because Pingora owns its runtime
    match cli.command {
        Commands::Dev(cmd) => cmd.execute(ServeMode::Dev),
        Commands::Preview(cmd) => cmd.execute(ServeMode::Preview),
        Commands::Probe(cmd) => cmd.execute(),
        Commands::Check(cmd) => cmd.execute(),
        Commands::Config(cmd) => cmd.execute(),
    }
}
