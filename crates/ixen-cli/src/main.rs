//! Ixen CLI - live chat relay and dashboard
//!
//! Usage:
//!   ixen init                   Write a default ixen.toml
//!   ixen serve                  Run the relay server and dashboard
//!   ixen watch <username>       Follow a creator's chat in the terminal

mod watch;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ixen_core::config::{ClassifierBackend, TransportKind, CONFIG_FILE};
use ixen_core::IxenConfig;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "ixen")]
#[command(author, version, about = "Live chat relay with comment classification")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run the relay server and dashboard
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Upstream transport (browser or demo)
        #[arg(long)]
        transport: Option<TransportKind>,

        /// Comment classifier (anthropic or heuristic)
        #[arg(long)]
        classifier: Option<ClassifierBackend>,

        /// Don't open the dashboard in a browser
        #[arg(long)]
        no_open: bool,
    },

    /// Follow a creator's chat from a running server
    Watch {
        /// Creator username, with or without a leading @
        username: String,

        /// Base URL of the relay server
        #[arg(long, default_value = "http://localhost:9002")]
        server: String,

        /// Comment classifier (anthropic or heuristic)
        #[arg(long)]
        classifier: Option<ClassifierBackend>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { force } => cmd_init(&cli.config, force),
        Commands::Serve {
            host,
            port,
            transport,
            classifier,
            no_open,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(transport) = transport {
                config.upstream.transport = transport;
            }
            if let Some(classifier) = classifier {
                config.classifier.backend = classifier;
            }
            if no_open {
                config.server.open_browser = false;
            }
            cmd_serve(config).await
        }
        Commands::Watch {
            username,
            server,
            classifier,
        } => {
            let mut config = load_config(&cli.config)?;
            if let Some(classifier) = classifier {
                config.classifier.backend = classifier;
            }
            watch::run(&server, &username, config).await
        }
    }
}

fn load_config(path: &Path) -> Result<IxenConfig> {
    IxenConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    IxenConfig::write_default(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

async fn cmd_serve(config: IxenConfig) -> Result<()> {
    info!(
        "Transport: {:?}, classifier: {:?}",
        config.upstream.transport, config.classifier.backend
    );
    ixen_server::run(config).await
}
