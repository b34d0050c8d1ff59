//! rudf CLI: inspect storage settings and move large objects in and out.

use clap::{Parser, Subcommand};
use rudf_core::config::StorageConfig;
use rudf_io::LargeObjectStore;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rudf")]
#[command(about = "Large-object storage tools for R user-defined functions", long_about = None)]
struct Cli {
    /// Object storage endpoint (overrides STORAGE_S3_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Bucket minted references go to (overrides STORAGE_LARGE_OBJECT_BUCKET)
    #[arg(long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved storage configuration as JSON
    Config,

    /// Mint a fresh large-object reference and print its URI
    Mint,

    /// Upload a local file to a large object
    Put {
        /// Target reference; a fresh one is minted when omitted
        #[arg(short, long)]
        uri: Option<String>,

        /// File to upload
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Download a large object to a local file
    Get {
        /// Source reference
        #[arg(short, long)]
        uri: String,

        /// Destination file
        #[arg(short, long)]
        file: PathBuf,
    },
}

const COPY_CHUNK: usize = 1024 * 1024;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(StorageConfig::from_env(), cli.endpoint, cli.bucket);

    let result = match cli.command {
        Commands::Config => show_config(&config),
        Commands::Mint => mint(&config),
        Commands::Put { uri, file } => put(&config, uri, &file),
        Commands::Get { uri, file } => get(&config, &uri, &file),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn resolve_config(
    mut config: StorageConfig,
    endpoint: Option<String>,
    bucket: Option<String>,
) -> StorageConfig {
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    if let Some(bucket) = bucket {
        config.default_bucket = bucket;
    }
    config
}

fn show_config(config: &StorageConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn mint(config: &StorageConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = LargeObjectStore::from_config(config)?;
    println!("{}", store.mint()?);
    Ok(())
}

fn put(
    config: &StorageConfig,
    uri: Option<String>,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = LargeObjectStore::from_config(config)?;
    let reference = match uri {
        Some(uri) => store.bind(&uri)?,
        None => store.mint()?,
    };

    let mut source = BufReader::new(File::open(path)?);
    let mut writer = store.open_write(&reference)?;
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut total = 0usize;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += writer.write(&buf[..n])?;
    }
    writer.close()?;

    println!("✓ Uploaded {} bytes to {}", total, reference);
    Ok(())
}

fn get(config: &StorageConfig, uri: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = LargeObjectStore::from_config(config)?;
    let reference = store.bind(uri)?;

    let mut reader = store.open_read(&reference)?;
    let mut sink = BufWriter::new(File::create(path)?);
    let mut total = 0usize;
    loop {
        let chunk = reader.read(COPY_CHUNK as i64)?;
        if chunk.is_empty() {
            break;
        }
        sink.write_all(&chunk)?;
        total += chunk.len();
    }
    sink.flush()?;
    reader.close();

    println!("✓ Downloaded {} bytes to {}", total, path.display());
    Ok(())
}
