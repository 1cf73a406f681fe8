//! Quill CLI, the main entry point.
//!
//! Commands:
//! - `init`    Write a default config file
//! - `serve`   Start the HTTP gateway
//! - `ingest`  Extract facts from a document and index it
//! - `update`  Extract facts from conversation text
//! - `query`   Ask a question or fill a form
//! - `profile` Print the stored profile

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill: personal profile extraction and form-filling assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.quill/config.toml)
    #[arg(short, long, global = true, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ingest a document into the profile and its semantic index
    Ingest {
        /// Path to a .txt, .md, .json or .csv file
        path: PathBuf,
    },

    /// Merge facts stated in conversation text into the profile
    Update {
        /// Conversation text (reads stdin when omitted)
        text: Option<String>,
    },

    /// Ask a question about the stored profile and documents
    Query {
        question: String,

        /// Chat history, raw text or a JSON message array
        #[arg(long, default_value = "")]
        history: String,

        /// A form to fill instead of answering in prose
        #[arg(long)]
        form: Option<PathBuf>,
    },

    /// Print the stored profile as JSON
    Profile,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let config = cli.config;
    match cli.command {
        Commands::Init { force } => commands::init::run(config, force)?,
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Ingest { path } => commands::ingest::run(config, path).await?,
        Commands::Update { text } => commands::ingest::update(config, text).await?,
        Commands::Query {
            question,
            history,
            form,
        } => commands::query::run(config, question, history, form).await?,
        Commands::Profile => commands::profile::run(config).await?,
    }

    Ok(())
}
