//! gencache CLI: the main entry point.
//!
//! Commands:
//! - `generate`: run generation requests from a JSON file
//! - `prompt`:   print the prompts a request would be sent with
//! - `profile`:  map attitude scores to a personalization profile
//! - `config`:   initialize or inspect configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "gencache",
    about = "gencache: cached, conversation-aware LLM generation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.gencache/config.toml)
    #[arg(short, long, global = true, env = "GENCACHE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate results for the request(s) in a JSON file
    Generate {
        /// File holding one request object or an array of them
        #[arg(short, long)]
        file: PathBuf,

        /// Bypass cached results
        #[arg(long)]
        force: bool,
    },

    /// Print the assembled prompts for a request without generating
    Prompt {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the personalization profile for a set of attitude scores
    Profile {
        /// Attitude score as name=score (repeatable)
        #[arg(short, long = "attitude", value_name = "NAME=SCORE")]
        attitudes: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_path = commands::config_path(cli.config.as_deref());
    let loaded = commands::load_config(&config_path);

    // Initialize tracing
    let (level, json) = match &loaded {
        Ok(config) => (config.logging.level.clone(), config.logging.json),
        Err(_) => ("info".to_string(), false),
    };
    let filter = if cli.verbose { "debug".to_string() } else { level };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Config {
            action: ConfigAction::Init { force },
        } => commands::config_cmd::init(&config_path, force)?,
        Commands::Config {
            action: ConfigAction::Path,
        } => commands::config_cmd::path(&config_path),
        Commands::Config {
            action: ConfigAction::Show,
        } => commands::config_cmd::show(&loaded?)?,
        Commands::Generate { file, force } => commands::generate::run(&loaded?, &file, force).await?,
        Commands::Prompt { file } => commands::prompt::run(&loaded?, &file)?,
        Commands::Profile { attitudes } => commands::profile::run(&loaded?, &attitudes)?,
    }

    Ok(())
}
