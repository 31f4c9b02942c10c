//! # Simple Server Demo
//!
//! Stores objects on the local disk and records in memory.
//!
//! ```sh
//! cargo run --example simple_server --features "server fs memory mock_auth"
//! ```

use romvault::prelude::*;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Providers
    let data_dir = env::var("ROMVAULT_DATA_DIR").unwrap_or_else(|_| "./romvault_data".to_string());
    let storage = FileSystemStorage::new(data_dir);
    let records = MemoryRecords::new();

    // Don't use this in production! This is just for demonstration/testing purposes
    let auth = AllowAllAuth;

    // Build App
    let app = RomvaultServer::default().build(storage, records, auth);

    // Serve
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    println!("Server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
