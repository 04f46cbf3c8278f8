//! The `autotag pool` command: inspect and pre-encode tag pools.

use autotag_core::pipeline::load_pool_encoder;
use autotag_core::tagging::presets::{resolve_entries, PRESET_NAMES};
use autotag_core::tagging::TagPool;
use autotag_core::Config;
use clap::{Args, Subcommand};

use super::types::PolicyArg;

/// Arguments for the `pool` command.
#[derive(Args, Debug)]
pub struct PoolArgs {
    #[command(subcommand)]
    pub command: PoolCommand,
}

/// Subcommands for tag pool management.
#[derive(Subcommand, Debug)]
pub enum PoolCommand {
    /// Print the labels and prompts of a pool
    List {
        /// Preset name or TOML pool file (defaults to the configured pool)
        #[arg(long)]
        pool: Option<String>,
    },

    /// Encode a pool and store it in the pool cache
    Build {
        /// Preset name or TOML pool file (defaults to the configured pool)
        #[arg(long)]
        pool: Option<String>,

        /// Policy whose text encoder the pool is built for
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
}

/// Execute the pool command.
pub async fn execute(args: PoolArgs, mut config: Config) -> anyhow::Result<()> {
    match args.command {
        PoolCommand::List { pool } => {
            let name = pool.unwrap_or_else(|| config.tagging.pool.clone());
            let entries = resolve_entries(&name, &config.tagging.prompt_template)?;
            println!("# {} ({} tags)", name, entries.len());
            for entry in &entries {
                if entry.label == entry.prompt {
                    println!("{}", entry.label);
                } else {
                    println!("{}\t{}", entry.label, entry.prompt);
                }
            }
            if !PRESET_NAMES.contains(&name.as_str()) {
                tracing::debug!("Built-in presets: {}", PRESET_NAMES.join(", "));
            }
        }

        PoolCommand::Build { pool, policy } => {
            if let Some(pool) = pool {
                config.tagging.pool = pool;
            }
            if let Some(policy) = policy {
                config.tagging.policy = policy.into();
            }
            config.validate()?;

            let entries =
                resolve_entries(&config.tagging.pool, &config.tagging.prompt_template)?;
            let cache_dir = config.cache_dir();
            std::fs::create_dir_all(&cache_dir)?;
            let cache_display = cache_dir.display().to_string();

            let pool = tokio::task::spawn_blocking(move || -> anyhow::Result<TagPool> {
                let encoder = load_pool_encoder(&config)?;
                let pool = TagPool::load_or_build(
                    entries,
                    &encoder,
                    config.tagging.encode_batch_size,
                    &cache_dir,
                )?;
                Ok(pool)
            })
            .await??;

            println!(
                "Pool ready: {} tags x {} dims (cached in {})",
                pool.len(),
                pool.embedding_dim(),
                cache_display
            );
        }
    }

    Ok(())
}
