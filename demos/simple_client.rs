//! # Simple Client Demo
//!
//! Uploads a ROM, writes a save into slot 1 and reads it back.
//! Run one of the server demos first.
//!
//! ```sh
//! cargo run --example simple_client --features "client"
//! ```

use romvault::prelude::*;
use std::path::Path;
use tokio::fs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let client = RomvaultClient::new("http://localhost:3000", Some("demo_user".to_string()));

    let dir = std::env::temp_dir().join("romvault_demo");
    fs::create_dir_all(&dir).await?;
    let rom_path = dir.join("demo.nes");
    fs::write(&rom_path, b"NES\x1a demo rom").await?;

    let game = client
        .upload_rom(
            &rom_path,
            &RomMeta {
                system: "nes".to_string(),
                title: Some("Demo".to_string()),
                ..Default::default()
            },
        )
        .await?;
    println!("Uploaded game {} at {} (md5 {})", game.id, game.path, game.md5_hash);

    let reference = client.download_reference(game.id).await?;
    println!("Download via {}", reference.url());

    let state_path = dir.join("slot-1.state");
    fs::write(&state_path, b"save state bytes").await?;
    let save = client
        .upload_save(game.id, 1, &state_path, None, Some("Start of level 1"))
        .await?;
    println!("Saved slot {} (id {})", save.slot, save.id);

    let output = dir.join("restored.state");
    client.download_save(save.id, Path::new(&output)).await?;
    println!("Restored save to {}", output.display());

    for group in client.duplicates().await? {
        println!("Possible duplicates: {} on {}", group.title, group.system);
    }

    Ok(())
}
