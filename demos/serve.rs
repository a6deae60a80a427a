//! # Serve demo
//!
//! Runs the transfer server from `tern.toml` in the working directory.
//!
//! ```sh
//! cargo run --example serve --features "server"
//! ```

use std::path::Path;
use tern::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = SyncConfig::load(Path::new("tern.toml"))?;
    if !config.enable_server {
        println!("enable_server is off in tern.toml, nothing to do");
        return Ok(());
    }

    let cache = DigestCache::new("tern_cache.json");
    let mut handle = TernServer::new((&config).into()).start(cache);

    match handle.bound_addr().await {
        Some(addr) => {
            println!("Transfer server on http://{addr}");
            println!("Advertising {} to clients", config.advertised_address());
        }
        None => anyhow::bail!("transfer server failed to start"),
    }

    tokio::signal::ctrl_c().await?;
    handle.stop().await;
    Ok(())
}
