//! metacache CLI - inspect and flush a configured metadata cache
//!
//! Usage:
//!   metacache status
//!   metacache show <table>
//!   metacache show --class <ClassName>
//!   metacache flush
//!
//! The adapter is taken from metacache.toml (see `Settings::load`).

use clap::{Parser, Subcommand};
use metacache::adapter::Adapter;
use metacache::cache::{fingerprint, CacheKey, MetadataStore};
use metacache::config::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "metacache")]
#[command(about = "Inspect and flush a model-metadata cache")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to the standard search locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report whether the cache holds any entry
    Status,

    /// Print a cached entry
    Show {
        /// Table name of the schema record
        #[arg(required_unless_present = "class")]
        table: Option<String>,

        /// Class name of the alias record
        #[arg(long, conflicts_with = "table")]
        class: Option<String>,
    },

    /// Remove every entry of the configured namespace
    Flush,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::load()?,
    };
    let store = MetadataStore::new(settings.metadata.open_adapter()?);

    match cli.command {
        Commands::Status => {
            let state = if store.is_empty()? { "empty" } else { "populated" };
            println!("adapter: {}", store.adapter().name());
            println!("suffix:  {:?}", settings.metadata.options.suffix);
            println!("state:   {}", state);
        }
        Commands::Show { table, class } => {
            let key = match (table, class) {
                (_, Some(class)) => CacheKey::class(&class)?,
                (Some(table), None) => CacheKey::table(&table)?,
                (None, None) => unreachable!("clap requires a table or --class"),
            };
            let Some(bytes) = store.adapter().read(&key)? else {
                eprintln!("'{}' is not cached", key);
                return Ok(ExitCode::FAILURE);
            };
            let value: serde_json::Value = serde_json::from_slice(&bytes)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            println!("fingerprint: {}", fingerprint(&bytes));
        }
        Commands::Flush => {
            store.reset()?;
            println!("flushed {} cache", store.adapter().name());
        }
    }

    Ok(ExitCode::SUCCESS)
}
