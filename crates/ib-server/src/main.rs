use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod pipeline;
mod routes;

use config::Config;

/// Log level for tracing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything, including HTTP client internals
    Trace,
    /// Lookup steps, prompts, fetch details
    Debug,
    /// Requests, lookup results, data origins
    Info,
    /// Only fallbacks, warnings and errors
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Parser)]
#[command(name = "icebreaker")]
#[command(
    author,
    version,
    about = "Ice Breaker: conversation starters from LinkedIn and Twitter/X",
    long_about = None
)]
struct Cli {
    /// Config file (default: ~/.config/icebreaker/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_enum, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Enable debug logging (shorthand for --log-level debug)
    #[arg(short, long, global = true)]
    debug: bool,

    /// Write logs to file (JSON-lines format)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Generate an ice breaker for one person and print it as JSON
    Run {
        /// Full name of the person
        #[arg(short, long)]
        name: String,

        /// Extra context to pick the right person (company, city, role)
        #[arg(long)]
        context: Option<String>,
    },
    /// Show the effective configuration with credentials hidden
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; variables may come from the environment
    dotenvy::dotenv().ok();

    init_logging(&cli)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => serve(config, bind).await,
        Commands::Run { name, context } => run_once(config, &name, context.as_deref()).await,
        Commands::Config => show_config(&config),
    }
}

fn init_logging(cli: &Cli) -> Result<()> {
    let log_level = if cli.debug {
        LogLevel::Debug
    } else {
        cli.log_level
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_filter()));

    if let Some(log_path) = &cli.log_file {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("Failed to create log file: {:?}", log_path))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn serve(config: Config, bind: Option<String>) -> Result<()> {
    config.validate()?;

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let ice_breaker = Arc::new(pipeline::build_ice_breaker(&config));
    let app = routes::create_app(ice_breaker, config.request_timeout());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %bind, model = %config.llm.model, "Ice Breaker listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_once(config: Config, name: &str, context: Option<&str>) -> Result<()> {
    config.validate()?;

    let ice_breaker = pipeline::build_ice_breaker(&config);
    let report = ice_breaker
        .ice_break_with_context(name, context)
        .await
        .with_context(|| format!("Failed to generate an ice breaker for {}", name))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn show_config(config: &Config) -> Result<()> {
    match Config::config_path() {
        Some(path) if path.exists() => println!("# Default config file: {}", path.display()),
        Some(path) => println!("# Default config file: {} (not present)", path.display()),
        None => println!("# No config directory on this platform"),
    }
    let rendered = toml::to_string_pretty(&config.redacted()).context("Failed to render config")?;
    println!("{}", rendered);
    Ok(())
}
