mod files;
mod join;
mod render;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use roomlink::RoomOptions;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roomlink")]
#[command(bin_name = "roomlink")]
#[command(version, about = "Join a roomlink room from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room, chat with its participants and exchange files.
    Join(join::JoinArgs),

    /// Validate a room options file.
    Check {
        /// JSON file with camelCase room options.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,roomlink_client=info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Join(args) => join::run(args).await,
        Commands::Check { path } => check(&path),
    }
}

fn check(path: &Path) -> Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let options = RoomOptions::from_json_str(&raw)
        .with_context(|| format!("{} is not valid room options JSON", path.display()))?;

    match options.validate() {
        Ok(config) => {
            println!("{}", "✔ Configuration is valid".green().bold());
            println!("   room:      {}", config.room);
            let signaling = config
                .signaling_url
                .as_deref()
                .unwrap_or("(from bootstrap)");
            println!("   signaling: {}", signaling);
            println!("   trickle:   {}", config.enable_ice_trickle);
            Ok(())
        }
        Err(err) => {
            println!("{}", "✘ Configuration is invalid".red().bold());
            for field in &err.fields {
                println!("   {}: {}", field.field.yellow(), field.reason);
            }
            anyhow::bail!("{} invalid field(s)", err.fields.len())
        }
    }
}
