//! shardstore CLI - command line access to a local file store

use anyhow::Context;
use clap::{Parser, Subcommand};
use shardstore::{FileInfo, Filestore, Hash, StoreConfig};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardstore")]
#[command(about = "A content-addressed file store with a path namespace")]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to the platform data directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// JSON config file with driver, root and chunk_size
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Chunk size in bytes for large files
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Show one entry
    Stat { path: String },

    /// Write a file's content to stdout
    Cat { path: String },

    /// Store a local file (or "-" for stdin) at a path
    Put {
        /// Local source file, or "-" for stdin
        source: String,
        /// Destination path in the store
        path: String,
    },

    /// Create a directory (and missing parents)
    Mkdir { path: String },

    /// Delete a file or an empty directory
    Rm { path: String },

    /// Move or rename an entry
    Mv { from: String, to: String },

    /// Upgrade a legacy metadata record to the current schema
    Migrate {
        /// Content id (hex SHA-256)
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let fs = open_store(&cli)?;

    match cli.command {
        Commands::Ls { path } => {
            let entries = fs.list(&path)?;
            match cli.format {
                OutputFormat::Json => output(
                    &cli.format,
                    &serde_json::json!({
                        "count": entries.len(),
                        "entries": entries
                    }),
                )?,
                OutputFormat::Text => {
                    for entry in &entries {
                        println!("{}", text_line(entry));
                    }
                }
            }
        }

        Commands::Stat { path } => {
            let info = fs.stat(&path)?;
            output(&cli.format, &serde_json::to_value(&info)?)?;
        }

        Commands::Cat { path } => {
            let mut reader = fs.read(&path)?;
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            io::copy(&mut reader, &mut lock).with_context(|| format!("reading {path}"))?;
            lock.flush()?;
        }

        Commands::Put { source, path } => {
            let info = if source == "-" {
                fs.write(&path, io::stdin().lock(), None)?
            } else {
                let file = File::open(&source).with_context(|| format!("opening {source}"))?;
                let size = file.metadata()?.len();
                fs.write(&path, file, Some(size))?
            };
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "path": info.path,
                    "size": info.size,
                    "content_id": info.content_id
                }),
            )?;
        }

        Commands::Mkdir { path } => {
            let info = fs.mkdir(&path)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "path": info.path
                }),
            )?;
        }

        Commands::Rm { path } => {
            fs.delete(&path)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "path": path
                }),
            )?;
        }

        Commands::Mv { from, to } => {
            let info = fs.rename(&from, &to)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "from": from,
                    "to": info.path
                }),
            )?;
        }

        Commands::Migrate { id } => {
            let id: Hash = id.parse()?;
            let record = fs.migrate(&id)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "id": id.to_hex(),
                    "size": record.size,
                    "mime_type": record.mime_type
                }),
            )?;
        }
    }

    Ok(())
}

fn open_store(cli: &Cli) -> anyhow::Result<Filestore> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::new(StoreConfig::default_root()?),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    Filestore::open(&config)
        .with_context(|| format!("opening store at {}", config.root.display()))
}

fn output(format: &OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Text => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn text_line(entry: &FileInfo) -> String {
    let kind = if entry.is_dir() { 'd' } else { '-' };
    format!("{}{:o} {:>12} {}", kind, entry.mode, entry.size, entry.name)
}
