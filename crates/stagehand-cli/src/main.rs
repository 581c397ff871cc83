//! Stagehand CLI: stage a byte stream into rolling storage generations.
//!
//! Reads raw bytes from stdin, appends them to the configured writer, rolls
//! whenever the current generation reaches --roll-bytes, and prints each
//! finalized location as a JSON line for a downstream committer. Backend
//! settings come from STAGEHAND_* environment variables; flags override.

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use stagehand_core::{StorageBackend, StorageLocation, WriterConfig};
use stagehand_writer::create_writer;
use tokio::io::AsyncReadExt;

#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(about = "Stage a byte stream into rolling storage generations")]
struct Args {
    /// Storage backend: local or s3 (default: STAGEHAND_BACKEND, else local)
    #[arg(long)]
    backend: Option<StorageBackend>,

    /// Base directory for the local backend
    #[arg(long)]
    dir: Option<String>,

    /// Bucket for the s3 backend
    #[arg(long)]
    bucket: Option<String>,

    /// Region for the s3 backend
    #[arg(long)]
    region: Option<String>,

    /// Custom endpoint URL for S3-compatible providers
    #[arg(long)]
    endpoint: Option<String>,

    /// Key/path prefix for generation names
    #[arg(long)]
    prefix: Option<String>,

    /// Extension for generation names
    #[arg(long)]
    extension: Option<String>,

    /// Roll after this many bytes have been staged into the current generation
    #[arg(long, default_value = "67108864")]
    roll_bytes: u64,

    /// Whether a zero-byte generation may roll into an empty object
    #[arg(long)]
    allow_empty: Option<bool>,
}

fn emit(location: &StorageLocation) -> Result<()> {
    println!("{}", serde_json::to_string(location)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = WriterConfig::from_env()?;
    if args.backend.is_some() {
        config.backend = args.backend;
    }
    if args.dir.is_some() {
        config.local_dir = args.dir;
    }
    if args.bucket.is_some() {
        config.s3_bucket = args.bucket;
    }
    if args.region.is_some() {
        config.s3_region = args.region;
    }
    if args.endpoint.is_some() {
        config.s3_endpoint = args.endpoint;
    }
    if let Some(prefix) = args.prefix {
        config.prefix = prefix;
    }
    if let Some(extension) = args.extension {
        config.extension = extension;
    }
    if let Some(allow_empty) = args.allow_empty {
        config.allow_empty = allow_empty;
    }

    let mut writer = create_writer(&config).await?;

    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; 64 * 1024];
    let mut staged: u64 = 0;
    let mut sink = writer.sink()?;

    loop {
        let n = stdin.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        sink.write_chunk(Bytes::copy_from_slice(&buf[..n])).await?;
        staged += n as u64;

        if staged >= args.roll_bytes {
            let finalized = writer.roll().await?;
            emit(&finalized)?;
            staged = 0;
            // The previous sink is bound to the rolled generation.
            sink = writer.sink()?;
        }
    }
    drop(sink);

    let trailing = writer.close().await?;
    if staged > 0 {
        if let Some(location) = trailing {
            emit(&location)?;
        }
    }

    Ok(())
}
