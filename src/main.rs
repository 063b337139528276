//! sqlite-memory CLI - Inspect and edit a key-value memory database

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use sqlite_memory::config::{self, StoreConfig};
use sqlite_memory::{Locator, SqliteMemory};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sqlite-memory")]
#[command(version)]
#[command(about = "Persistent key-value memory backed by SQLite")]
#[command(long_about = r#"
Stores binary values under string keys in a single SQLite table.

Example usage:
  sqlite-memory init
  sqlite-memory set greeting "hello"
  sqlite-memory get greeting
  sqlite-memory keys --json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file or `:memory:` (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the database
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },

    /// Store a value under a key
    Set {
        key: String,
        value: String,
    },

    /// Print the value stored under a key
    Get {
        key: String,
    },

    /// Remove a key
    Delete {
        key: String,
    },

    /// List all keys
    Keys {
        /// Print keys as a JSON array
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut store_config = config::load_config(Some(&config_path))?.unwrap_or_default();
    if let Some(database) = cli.database {
        store_config.database = Some(database);
    }

    match cli.command {
        Commands::Init { force } => {
            let cwd = std::env::current_dir()?;
            config::init(&config_path, &store_config, &cwd, force)?;
            println!("Wrote {}", config_path.display());
        }
        Commands::Set { key, value } => {
            let store = open_store(&store_config)?;
            store.set(&key, value.as_bytes())?;
            store.close()?;
        }
        Commands::Get { key } => {
            let store = open_store(&store_config)?;
            let Some(value) = store.get(&key)? else {
                anyhow::bail!("key not found: {key}");
            };
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&value)?;
            stdout.write_all(b"\n")?;
        }
        Commands::Delete { key } => {
            let store = open_store(&store_config)?;
            if !store.delete(&key)? {
                tracing::info!("Key {} was not set", key);
            }
            store.close()?;
        }
        Commands::Keys { json } => {
            let keys = open_store(&store_config)?.keys()?;
            if json {
                println!("{}", serde_json::to_string(&keys)?);
            } else {
                for key in keys {
                    println!("{key}");
                }
            }
        }
    }

    Ok(())
}

fn open_store(store_config: &StoreConfig) -> anyhow::Result<SqliteMemory> {
    let cwd = std::env::current_dir()?;
    let locator: Locator = store_config.locator_in(&cwd);
    config::ensure_db_dir(&locator)?;

    tracing::debug!("Opening memory at {}", locator);
    let options = store_config
        .options()
        .with_span(tracing::debug_span!("memory", db = %locator));
    Ok(SqliteMemory::open(locator, options)?)
}
