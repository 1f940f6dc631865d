//! visage: avatar acquisition CLI
//!
//! Resolve portraits from the command line using the same configuration
//! files a host application would.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use visage::{AvatarService, CacheKey, Config, Secrets};

/// Visage CLI
#[derive(Parser)]
#[command(name = "visage")]
#[command(version)]
#[command(about = "Avatar acquisition with caching and placeholder fallback")]
struct Args {
    /// Path to config file (default: ~/.visage/config.toml or /etc/visage/config.toml)
    #[arg(short, long, env = "VISAGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Acquire an avatar URL for a character
    Acquire {
        /// Character name
        name: String,
        /// Short character description
        #[arg(short, long)]
        description: Option<String>,
        /// Bypass caches and ask the provider for a new portrait
        #[arg(long)]
        regenerate: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cache key for a character
    Key {
        /// Character name
        name: String,
        /// Short character description
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Print the placeholder URL for a name
    Placeholder {
        /// Character name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Key { name, description } => {
            println!("{}", CacheKey::new(&name, description.as_deref()));
        }

        Command::Placeholder { name } => {
            let config = Config::load(args.config.as_deref())?;
            println!("{}", config.placeholder.generator()?.generate(name.trim()));
        }

        Command::Acquire {
            name,
            description,
            regenerate,
            json,
        } => {
            let config = Config::load(args.config.as_deref())?;
            let secrets = Secrets::load()?;
            let service = AvatarService::from_config(&config, &secrets)?;
            if !service.has_provider() {
                tracing::warn!("no provider API key configured, only placeholders are available");
            }

            let avatar = if regenerate {
                service.regenerate(&name, description.as_deref()).await
            } else {
                service.acquire(&name, description.as_deref()).await
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&avatar)?);
            } else {
                println!("{}", avatar.url);
                println!("source: {}", avatar.source);
            }
        }
    }

    Ok(())
}
