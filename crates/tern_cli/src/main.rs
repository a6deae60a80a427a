use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tern_client::{SyncClient, TernClient};
use tern_core::prelude::*;
use tern_digest::DigestCache;
use tern_server::TernServer;

#[derive(Parser)]
#[command(name = "tern")]
#[command(about = "Asset bundle sync server and client")]
struct Cli {
    /// Config file; created with defaults when missing
    #[arg(short, long, default_value = "tern.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transfer server until Ctrl-C
    Serve,
    /// Pull asset bundles from a server once
    Sync {
        /// Server address, e.g. "http://host:5000"
        #[arg(short, long)]
        url: String,
    },
    /// Upload an archive or single file to a server
    Upload {
        path: PathBuf,

        /// Server address, e.g. "http://host:5000"
        #[arg(short, long)]
        url: String,

        /// Target zone
        #[arg(short, long, default_value = "models")]
        zone: String,
    },
    /// Fetch and print a server's manifest
    Manifest {
        /// Server address, e.g. "http://host:5000"
        #[arg(short, long)]
        url: String,
    },
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, is_error: bool) {
        if is_error {
            eprintln!("{message}");
        } else {
            println!("{message}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = SyncConfig::load(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let cache = DigestCache::new(cli.config.with_file_name("tern_cache.json"));
            let mut handle = TernServer::new((&config).into()).start(cache);
            match handle.bound_addr().await {
                Some(addr) => println!("Transfer server on http://{addr} (Ctrl-C to stop)"),
                None => anyhow::bail!("transfer server failed to start"),
            }
            tokio::signal::ctrl_c().await?;
            println!("Shutting down, flushing digest cache...");
            handle.stop().await;
        }
        Commands::Sync { url } => {
            let client = SyncClient::new(&config, Arc::new(NoHost), Arc::new(ConsoleNotifier));
            client.set_address_override(Some(url));
            client.run_sync().await;
        }
        Commands::Upload { path, url, zone } => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.tar.gz".to_string());
            let body = tokio::fs::read(&path).await?;
            let reply = TernClient::new(url).upload(&zone, &name, body).await?;
            println!("{reply}");
        }
        Commands::Manifest { url } => {
            let manifest = TernClient::new(url).fetch_manifest().await?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
    }

    Ok(())
}
