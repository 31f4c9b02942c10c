use clap::{Parser, Subcommand};
use romvault_client::{RomMeta, RomvaultClient};
use romvault_core::models::RecordId;
use std::path::PathBuf;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "romvault")]
#[command(about = "CLI for the romvault asset server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server URL
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(short, long, env = "ROMVAULT_TOKEN")]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a single ROM
    Upload {
        path: PathBuf,
        #[arg(short, long)]
        system: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },
    /// Upload every file under a directory laid out as `{system}/{file}`
    Import { dir: PathBuf },
    /// Upload a regional or revision variant of a game
    UploadVersion {
        game_id: RecordId,
        path: PathBuf,
        #[arg(long)]
        region: String,
        #[arg(long)]
        revision: Option<String>,
        #[arg(long)]
        preferred: bool,
    },
    /// Make a version the one that gets served
    SetPreferred { game_id: RecordId, version_id: RecordId },
    /// Download the ROM a game is played from
    Download {
        game_id: RecordId,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Upload a BIOS image
    UploadBios {
        path: PathBuf,
        #[arg(short, long)]
        system: String,
        #[arg(long)]
        required: bool,
    },
    /// Compare a BIOS against a known MD5 digest
    VerifyBios { id: RecordId, md5: String },
    /// Show which BIOS files a system is missing
    BiosStatus { system: String },
    /// Write a save state into a slot (1-10)
    Save {
        game_id: RecordId,
        slot: i64,
        state: PathBuf,
        #[arg(long)]
        screenshot: Option<PathBuf>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List your save states
    Saves {
        #[arg(long)]
        game_id: Option<RecordId>,
    },
    /// Download a save state
    Load {
        id: RecordId,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Delete a save state
    DeleteSave { id: RecordId },
    /// Print games that look like duplicates
    Duplicates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = RomvaultClient::new(cli.url.clone(), cli.token.clone());

    match cli.command {
        Commands::Upload {
            path,
            system,
            title,
            region,
        } => {
            let meta = RomMeta {
                system,
                title,
                region,
            };
            let game = client.upload_rom(&path, &meta).await?;
            println!("✅ Uploaded game {} ({}) md5 {}", game.id, game.path, game.md5_hash);
        }
        Commands::Import { dir } => {
            let mut count = 0;
            for entry in WalkDir::new(&dir).min_depth(2).max_depth(2) {
                let entry = entry?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let path = entry.path();
                let Some(system) = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|s| s.to_string_lossy().into_owned())
                else {
                    continue;
                };

                println!("Processing: {}", path.display());
                let meta = RomMeta {
                    system,
                    ..Default::default()
                };
                match client.upload_rom(path, &meta).await {
                    Ok(game) => {
                        println!("  -> game {}", game.id);
                        count += 1;
                    }
                    Err(e) if e.kind().is_some() => println!("  skipped: {e}"),
                    Err(e) => return Err(e.into()),
                }
            }
            println!("✅ Imported {count} ROMs from {dir:?}");
        }
        Commands::UploadVersion {
            game_id,
            path,
            region,
            revision,
            preferred,
        } => {
            let version = client
                .upload_version(game_id, &path, &region, revision.as_deref(), preferred)
                .await?;
            println!("✅ Uploaded version {} ({})", version.id, version.rom_path);
        }
        Commands::SetPreferred {
            game_id,
            version_id,
        } => {
            client.set_preferred(game_id, version_id).await?;
            println!("✅ Version {version_id} is now preferred for game {game_id}");
        }
        Commands::Download { game_id, output } => {
            println!("Downloading game {game_id}...");
            let size = client.download_rom(game_id, &output).await?;
            println!("✅ Saved {size} bytes to {output:?}");
        }
        Commands::UploadBios {
            path,
            system,
            required,
        } => {
            let bios = client.upload_bios(&path, &system, required).await?;
            println!("✅ Uploaded BIOS {} ({}) md5 {}", bios.id, bios.path, bios.md5_hash);
        }
        Commands::VerifyBios { id, md5 } => {
            let bios = client.verify_bios(id, &md5).await?;
            if bios.verified {
                println!("✅ {} matches", bios.file_name);
            } else {
                println!("❌ {} does not match (stored {})", bios.file_name, bios.md5_hash);
            }
        }
        Commands::BiosStatus { system } => {
            let status = client.bios_status(&system).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Save {
            game_id,
            slot,
            state,
            screenshot,
            description,
        } => {
            let save = client
                .upload_save(
                    game_id,
                    slot,
                    &state,
                    screenshot.as_deref(),
                    description.as_deref(),
                )
                .await?;
            println!("✅ Saved slot {} of game {} (id {})", save.slot, save.game_id, save.id);
        }
        Commands::Saves { game_id } => {
            let saves = client.list_saves(game_id).await?;
            println!("{}", serde_json::to_string_pretty(&saves)?);
        }
        Commands::Load { id, output } => {
            let size = client.download_save(id, &output).await?;
            println!("✅ Saved {size} bytes to {output:?}");
        }
        Commands::DeleteSave { id } => {
            client.delete_save(id).await?;
            println!("✅ Deleted save state {id}");
        }
        Commands::Duplicates => {
            let groups = client.duplicates().await?;
            if groups.is_empty() {
                println!("No duplicates found.");
            }
            for group in groups {
                println!("{} [{}]", group.title, group.system);
                for game in group.games {
                    println!("  {} {} ({})", game.id, game.title, game.created_at);
                }
            }
        }
    }

    Ok(())
}
