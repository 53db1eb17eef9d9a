//! # Vassago CLI
//!
//! *"He declares things past and to come, and finds what was lost"*
//!
//! Serves retrieval-augmented question answering over uploaded documents.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;

mod commands;
mod config;
mod logging;

use commands::ServeOverrides;
use logging::{init_logging, LoggingConfig};

#[derive(Parser)]
#[command(name = "vassago")]
#[command(author = "Daemoniorum Engineering")]
#[command(version)]
#[command(about = "Ask questions of your documents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Model to load at startup
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Add local documents to the persistent knowledge base
    Ingest {
        /// Files to parse (.pdf, .txt, .docx)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Display version and build info
    Version,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    init_logging(&LoggingConfig {
        service_name: "vassago",
        log_level: cli.log_level.clone(),
        json_logs: cli.json_logs,
    })?;

    let cfg = config::Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port, model } => {
            commands::serve(cfg, ServeOverrides { host, port, model }).await?;
        }

        Commands::Ingest { files } => {
            commands::ingest(&cfg, files).await?;
        }

        Commands::Version => {
            commands::version();
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                config::show_config(&cfg, cli.config.as_deref())?;
            }
            ConfigAction::Path => {
                let path = cli.config.unwrap_or_else(config::Config::config_path);
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}
