//! # S3 Server Demo
//!
//! Stores objects in an S3 or MinIO bucket. When `ROMVAULT_PUBLIC_ENDPOINT`
//! differs from `ROMVAULT_S3_ENDPOINT`, downloads go through the proxy routes
//! instead of presigned URLs.
//!
//! ```sh
//! ROMVAULT_BUCKET=roms ROMVAULT_S3_ENDPOINT=http://minio:9000 \
//! ROMVAULT_PUBLIC_ENDPOINT=https://files.example.com \
//!     cargo run --example s3_server --features "server s3 memory mock_auth"
//! ```

use anyhow::Context;
use aws_config::BehaviorVersion;
use romvault::prelude::*;
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Config
    let bucket = env::var("ROMVAULT_BUCKET").context("ROMVAULT_BUCKET env var required")?;
    let endpoint = env::var("ROMVAULT_S3_ENDPOINT").ok();
    let public_endpoint = env::var("ROMVAULT_PUBLIC_ENDPOINT").ok();

    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(endpoint) = &endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    let aws_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(endpoint.is_some())
        .build();
    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Providers
    let mut storage = S3Storage::new(s3_client, bucket.clone(), None);
    if let Some(public) = &public_endpoint {
        storage = storage.with_public_base_url(format!("{}/{bucket}", public.trim_end_matches('/')));
    }
    let records = MemoryRecords::new();

    // Don't use this in production! This is just for demonstration/testing purposes
    let auth = AllowAllAuth;

    // Build
    let mut config = ServerConfig::default();
    config.library.download.internal_endpoint = endpoint;
    config.library.download.public_endpoint = public_endpoint;
    let app = RomvaultServer::new(config).build(storage, records, auth);

    // Serve
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    println!("Server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
