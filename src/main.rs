//! Stale Cache - command line access to a file backed cache
//!
//! Reads and manipulates the entries of a `FileStore` using the same engine
//! applications embed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stale_cache::config::parse_seconds;
use stale_cache::{Cache, Config, FileStore};

#[derive(Debug, Parser)]
#[command(name = "stale_cache", version, about = "Inspect and edit a file backed TTL cache")]
struct Cli {
    /// Cache file to operate on
    #[arg(long, env = "CACHE_FILE", default_value = "stale_cache.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a fresh value
    Get { key: String },
    /// Store a value; parsed as JSON when possible, otherwise a string
    Set {
        key: String,
        value: String,
        /// Group to register the key under
        #[arg(long)]
        group: Option<String>,
        /// TTL in seconds (fractions allowed, 0 = never expires)
        #[arg(long, value_parser = parse_ttl)]
        ttl: Option<Duration>,
    },
    /// Report whether an entry exists, expired or not
    Exists { key: String },
    /// Remove one key
    Remove { key: String },
    /// Remove every key matching a `*` pattern
    RemoveMatching { pattern: String },
    /// Remove every key of a group
    ClearGroup { group: String },
    /// Remove expired entries
    ClearExpired,
    /// Remove everything
    ClearAll,
    /// Print every entry as a JSON line
    List,
}

fn parse_ttl(raw: &str) -> Result<Duration, String> {
    parse_seconds(raw).ok_or_else(|| format!("invalid TTL: {raw}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stale_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let cache = Cache::from_config(FileStore::new(&cli.file), &config);
    cache
        .ready()
        .await
        .with_context(|| format!("failed to open cache file {}", cli.file.display()))?;

    match cli.command {
        Command::Get { key } => {
            let value: Value = cache.get_item(&key).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::Set {
            key,
            value,
            group,
            ttl,
        } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            cache.set_item(&key, &value, group.as_deref(), ttl).await?;
            info!(key = %key, "stored");
        }
        Command::Exists { key } => {
            println!("{}", cache.item_exists(&key).await?);
        }
        Command::Remove { key } => {
            cache.remove_item(&key).await?;
        }
        Command::RemoveMatching { pattern } => {
            let removed = cache.remove_items(&pattern).await?;
            println!("{removed}");
        }
        Command::ClearGroup { group } => {
            cache.clear_group(&group).await?;
        }
        Command::ClearExpired => {
            let removed = cache.clear_expired().await?;
            println!("{removed}");
        }
        Command::ClearAll => {
            cache.clear_all().await?;
        }
        Command::List => {
            for entry in cache.get_raw_items().await? {
                println!("{}", serde_json::to_string(&entry)?);
            }
        }
    }

    Ok(())
}
