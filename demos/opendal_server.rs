//! # OpenDAL Server Demo
//!
//! ```sh
//! cargo run --example opendal_server --features "server opendal memory mock_auth"
//! ```

use opendal::{Operator, services::Fs};
use romvault::prelude::*;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Providers
    // This demo uses the FileSystem backend, but you can swap this
    // for S3, GCS, Azure, etc., by changing the Builder (e.g., opendal::services::S3).
    let root_path =
        env::var("ROMVAULT_DATA_DIR").unwrap_or_else(|_| "/tmp/romvault_opendal".to_string());
    let op = Operator::new(Fs::default().root(&root_path))?.finish();

    let storage = OpendalStorage::new(op);
    let records = MemoryRecords::new();

    // Don't use this in production! This is just for demonstration/testing purposes
    let auth = AllowAllAuth;

    // Build
    let app = RomvaultServer::default().build(storage, records, auth);

    // Serve
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    println!("Server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
