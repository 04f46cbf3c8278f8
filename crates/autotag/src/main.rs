//! autotag - batch photo tagger.
//!
//! Reads a JSON array of image paths, tags each image by matching its
//! embedding against a pool of tag embeddings, and writes one JSON array of
//! `{"image_path", "tags"}` objects in input order.
//!
//! # Usage
//!
//! ```bash
//! # Multi-label: up to 5 tags scoring above 0.3
//! autotag paths.json 5 0.3
//!
//! # Single best tag from the curated photography pool
//! autotag paths.json --policy arg-max --pool photography
//!
//! # Caption each image with a local vision model, then match the caption
//! autotag paths.json --policy caption --pool photography
//!
//! # Maintenance
//! autotag config show
//! autotag pool list --pool styles
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// autotag - tag photos by embedding similarity.
#[derive(Parser, Debug)]
#[command(name = "autotag")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "AUTOTAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    classify: cli::classify::ClassifyArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Maintenance commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// View and manage configuration
    Config(cli::config::ConfigArgs),

    /// Inspect and pre-encode tag pools
    Pool(cli::pool::PoolArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config problems go to stderr directly.
    let (config, config_path) = match &cli.config {
        Some(path) => {
            let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
            let config = autotag_core::Config::load_from(&expanded)
                .with_context(|| format!("Failed to load config {}", expanded.display()))?;
            (config, expanded)
        }
        None => {
            let config = match autotag_core::Config::load() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to load config: {e}\n  \
                         Using default configuration. Check your config file with `autotag config path`."
                    );
                    autotag_core::Config::default()
                }
            };
            (config, autotag_core::Config::default_path())
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("autotag v{}", autotag_core::VERSION);

    match cli.command {
        Some(Commands::Config(args)) => cli::config::execute(args, config, &config_path).await,
        Some(Commands::Pool(args)) => cli::pool::execute(args, config).await,
        None => cli::classify::execute(cli.classify, config).await,
    }
}
