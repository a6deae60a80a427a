//! # Pull demo
//!
//! Runs one client sync pass against the address given as the first
//! argument (standing in for the address a connected host would push).
//!
//! ```sh
//! cargo run --example pull --features "client" -- http://localhost:5000
//! ```

use std::path::Path;
use std::sync::Arc;
use tern::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = SyncConfig::load(Path::new("tern.toml"))?;
    let client = SyncClient::new(&config, Arc::new(NoHost), Arc::new(LogNotifier));
    client.set_address_override(std::env::args().nth(1));
    client.run_sync().await;
    Ok(())
}
