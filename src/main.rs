use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatsleuth::{GeminiClient, GeminiConfig, ServerConfig, normalize, serve};

#[derive(Parser)]
#[command(name = "chatsleuth")]
#[command(author, version, about = "Chat log analysis service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP analysis service
    Serve {
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for staged uploads (overrides UPLOAD_DIR)
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Normalize a saved model response and print the resulting JSON
    Normalize {
        /// File holding the raw model output
        #[arg(short, long)]
        input: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            upload_dir,
            verbose,
        } => {
            setup_logging(verbose);
            run_server(host, port, upload_dir).await
        }
        Commands::Normalize { input, verbose } => {
            setup_logging(verbose);
            normalize_file(input)
        }
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
}

async fn run_server(
    host: Option<IpAddr>,
    port: Option<u16>,
    upload_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = ServerConfig::from_env()?;
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(dir) = upload_dir {
        config.upload_dir = dir;
    }

    let client = GeminiClient::new(GeminiConfig::from_env()?)?;
    info!("Using model {}", client.model());
    info!(
        "Staging uploads in {:?}, max {} bytes, {} remote retries",
        config.upload_dir, config.max_upload_bytes, config.pipeline.max_remote_retries
    );

    serve(config, Arc::new(client)).await
}

fn normalize_file(input: PathBuf) -> Result<()> {
    info!("Normalizing model output from {:?}", input);
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("Failed to read file: {:?}", input))?;

    let result = normalize(&raw).context("Failed to normalize model output")?;
    info!("{} instances", result.len());

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
