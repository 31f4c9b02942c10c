mod common;

use bytes::Bytes;
use common::*;
use romvault_core::prelude::*;
use romvault_library::{BiosUpload, DownloadReference, Library, RomUpload};
use romvault_memory::MemoryRecords;

fn bios(system: &str, file_name: &str, required: bool) -> BiosUpload {
    BiosUpload {
        system: system.into(),
        file_name: file_name.into(),
        description: None,
        required,
    }
}

#[tokio::test]
async fn created_rom_streams_back_unchanged() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);

    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let game = lib
        .assets
        .create_rom(Bytes::from(data.clone()), rom("NES", "Zelda (USA).nes"))
        .await
        .unwrap();

    assert_eq!(game.path, "roms/nes/Zelda (USA).nes");
    assert_eq!(game.system, "nes");
    assert_eq!(game.title, "Zelda (USA)");
    assert_eq!(game.md5_hash, md5_hex(&data));
    assert_eq!(game.file_size, data.len() as u64);

    let download = lib.assets.open(AssetRef::Game(game.id)).await.unwrap();
    assert_eq!(download.file_name, "Zelda (USA).nes");
    assert_eq!(collect(download).await, Bytes::from(data));
}

#[tokio::test]
async fn unsupported_system_is_rejected_before_io() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());

    let err = lib
        .assets
        .create_rom(Bytes::from_static(b"rom"), rom("amiga500", "x.adf"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unsupported_system");
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn file_names_must_be_one_key_segment() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());

    for name in ["../escape.nes", "a/b.nes", ""] {
        let err = lib
            .assets
            .create_rom(Bytes::from_static(b"rom"), rom("nes", name))
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::InvalidFileName(_)), "{name}");
    }
    assert_eq!(storage.calls(), 0);
}

#[tokio::test]
async fn second_rom_at_same_key_is_a_duplicate() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    game(&lib, "nes", "tetris.nes").await;
    let calls = storage.calls();

    let err = lib
        .assets
        .create_rom(Bytes::from_static(b"other"), rom("nes", "tetris.nes"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "duplicate_asset");
    assert_eq!(storage.calls(), calls);
}

#[tokio::test]
async fn duplicate_bios_is_rejected_without_upload() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    lib.assets
        .create_bios(Bytes::from_static(b"bios"), bios("psx", "scph1001.bin", true))
        .await
        .unwrap();
    let calls = storage.calls();

    let err = lib
        .assets
        .create_bios(Bytes::from_static(b"bios2"), bios("PSX", "scph1001.bin", true))
        .await
        .unwrap_err();
    assert!(matches!(err, AssetError::DuplicateAsset(_)));
    assert_eq!(storage.calls(), calls);
}

#[tokio::test]
async fn failed_upload_writes_no_record() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    storage.fail_puts(true);

    let err = lib
        .assets
        .create_rom(Bytes::from_static(b"rom"), rom("gb", "tetris.gb"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "storage_unavailable");
    assert!(!err.to_string().contains("injected"));
    assert!(records.game_summaries().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_record_write_keeps_the_object_and_reports_storage_unavailable() {
    let storage = SpyStorage::new();
    let records = FlakyRecords::new();
    let lib = Library::new(storage.clone(), records.clone(), &LibraryConfig::default());
    records.fail_inserts(true);

    let err = lib
        .assets
        .create_rom(Bytes::from_static(b"rom"), rom("gb", "tetris.gb"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "storage_unavailable");
    assert!(!err.to_string().contains("injected"));
    assert_eq!(storage.calls(), 1);
    assert_eq!(
        storage.inner.read("roms/gb/tetris.gb").await.unwrap(),
        Bytes::from_static(b"rom")
    );
    assert!(records.inner.game_summaries().await.unwrap().is_empty());

    let err = lib
        .assets
        .create_bios(Bytes::from_static(b"bios"), bios("psx", "scph1001.bin", true))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "storage_unavailable");
    assert_eq!(storage.calls(), 2);

    records.fail_inserts(false);
    let game = lib
        .assets
        .create_rom(Bytes::from_static(b"rom"), rom("gb", "tetris.gb"))
        .await
        .unwrap();
    assert_eq!(game.path, "roms/gb/tetris.gb");
    assert_eq!(storage.calls(), 3);
}

#[tokio::test]
async fn delete_succeeds_when_object_is_already_gone() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let game = game(&lib, "snes", "smw.sfc").await;

    storage.inner.delete(&game.path).await.unwrap();
    lib.assets.delete(AssetRef::Game(game.id)).await.unwrap();

    assert!(records.game(game.id).await.unwrap().is_none());
}

#[tokio::test]
async fn record_delete_runs_even_when_object_delete_fails() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let bios = lib
        .assets
        .create_bios(Bytes::from_static(b"bios"), bios("gba", "gba_bios.bin", true))
        .await
        .unwrap();

    storage.fail_deletes(true);
    lib.assets.delete(AssetRef::Bios(bios.id)).await.unwrap();

    assert_eq!(storage.deletes(), 1);
    assert!(records.bios(bios.id).await.unwrap().is_none());
    assert!(storage.inner.exists(&bios.path).await.unwrap());
}

#[tokio::test]
async fn deleting_a_missing_asset_is_not_found() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let err = lib.assets.delete(AssetRef::Game(42)).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(storage.deletes(), 0);
}

#[tokio::test]
async fn game_delete_cascades_records_and_removes_cover() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let game = game(&lib, "n64", "mario64.z64").await;
    lib.assets
        .set_cover(game.id, Bytes::from_static(b"jpeg"))
        .await
        .unwrap();
    lib.assets
        .add_screenshot(game.id, Bytes::from_static(b"jpeg"))
        .await
        .unwrap();

    lib.assets.delete(AssetRef::Game(game.id)).await.unwrap();

    assert!(!storage.inner.exists(&format!("covers/{}.jpg", game.id)).await.unwrap());
    assert!(!storage.inner.exists("roms/n64/mario64.z64").await.unwrap());
    assert!(records.screenshots(game.id).await.unwrap().is_empty());
    // Screenshot objects wait for the orphan sweep.
    assert_eq!(
        lib.assets.find_orphans("screenshots/").await.unwrap(),
        vec![format!("screenshots/{}/0.jpg", game.id)]
    );
}

#[tokio::test]
async fn bios_download_is_proxied_when_public_endpoint_overrides() {
    let storage = SpyStorage::signing("http://minio:9000/romvault");
    let records = MemoryRecords::new();
    let config = LibraryConfig {
        download: DownloadConfig {
            internal_endpoint: Some("http://minio:9000".into()),
            public_endpoint: Some("https://storage.example.com".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let lib = library_with(&storage, &records, &config);
    let bios = lib
        .assets
        .create_bios(Bytes::from_static(b"bios"), bios("psx", "scph1001.bin", true))
        .await
        .unwrap();

    let reference = lib
        .assets
        .download_reference(AssetRef::Bios(bios.id))
        .await
        .unwrap();
    assert_eq!(
        reference,
        DownloadReference::Proxy {
            url: format!("/bios/{}/download", bios.id)
        }
    );
    assert!(!reference.url().contains("minio"));
}

#[tokio::test]
async fn signed_mode_never_leaks_the_internal_host() {
    let storage = SpyStorage::signing("http://minio:9000/romvault");
    let records = MemoryRecords::new();
    let config = LibraryConfig {
        download: DownloadConfig {
            mode: DownloadMode::Signed,
            internal_endpoint: Some("http://minio:9000".into()),
            public_endpoint: Some("https://storage.example.com".into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let lib = library_with(&storage, &records, &config);
    let bios = lib
        .assets
        .create_bios(Bytes::from_static(b"bios"), bios("psx", "scph1001.bin", true))
        .await
        .unwrap();

    let reference = lib
        .assets
        .download_reference(AssetRef::Bios(bios.id))
        .await
        .unwrap();
    assert!(matches!(reference, DownloadReference::Proxy { .. }));
    assert!(!reference.url().contains("minio"));
}

#[tokio::test]
async fn signing_backends_hand_out_signed_urls() {
    let storage = SpyStorage::signing("http://minio:9000/romvault");
    let lib = library(&storage, &MemoryRecords::new());
    let game = game(&lib, "gb", "tetris.gb").await;

    let reference = lib
        .assets
        .download_reference(AssetRef::Game(game.id))
        .await
        .unwrap();
    assert_eq!(
        reference,
        DownloadReference::Signed {
            url: "http://minio:9000/romvault/roms/gb/tetris.gb?ttl=3600".into(),
            expires_in: 3600
        }
    );
}

#[tokio::test]
async fn unsigned_backends_fall_back_to_proxy() {
    let storage = SpyStorage::new();
    let config = LibraryConfig {
        download: DownloadConfig {
            proxy_base_url: "https://roms.example.com/".into(),
            ..Default::default()
        },
        ..Default::default()
    };
    let lib = library_with(&storage, &MemoryRecords::new(), &config);
    let game = game(&lib, "gb", "tetris.gb").await;

    let reference = lib
        .assets
        .download_reference(AssetRef::Game(game.id))
        .await
        .unwrap();
    assert_eq!(
        reference.url(),
        format!("https://roms.example.com/games/{}/rom", game.id)
    );
}

#[tokio::test]
async fn metadata_update_does_not_touch_storage() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let game = game(&lib, "genesis", "sonic.md").await;
    let calls = storage.calls();

    let updated = lib
        .assets
        .update_game(
            game.id,
            GameUpdate {
                title: Some("Sonic the Hedgehog".into()),
                release_year: Some(1991),
                cover_path: Some("covers/evil.jpg".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Sonic the Hedgehog");
    assert_eq!(updated.release_year, Some(1991));
    assert_eq!(updated.cover_path, None);
    assert_eq!(updated.md5_hash, game.md5_hash);

    let unchanged = lib
        .assets
        .update_game(
            game.id,
            GameUpdate {
                cover_path: Some("covers/evil.jpg".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unchanged.cover_path, None);
    assert_eq!(unchanged.updated_at, updated.updated_at);
    assert_eq!(storage.calls(), calls);
}

#[tokio::test]
async fn covers_and_screenshots_get_public_urls() {
    let storage = SpyStorage::public("https://cdn.example.com/");
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let game = game(&lib, "snes", "zelda.sfc").await;

    let updated = lib
        .assets
        .set_cover(game.id, Bytes::from_static(b"jpeg"))
        .await
        .unwrap();
    assert_eq!(updated.cover_path.as_deref(), Some(format!("covers/{}.jpg", game.id).as_str()));

    let first = lib.assets.add_screenshot(game.id, Bytes::from_static(b"a")).await.unwrap();
    let second = lib.assets.add_screenshot(game.id, Bytes::from_static(b"b")).await.unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(second.path, format!("screenshots/{}/1.jpg", game.id));

    assert_eq!(
        lib.assets.public_url(&second.path).as_deref(),
        Some(format!("https://cdn.example.com/screenshots/{}/1.jpg", game.id).as_str())
    );
    assert_eq!(lib.assets.public_url(&game.path), None);
}

#[tokio::test]
async fn bios_verification_and_readiness() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let data = Bytes::from_static(b"playstation bios");
    let required = lib
        .assets
        .create_bios(data.clone(), bios("psx", "scph1001.bin", true))
        .await
        .unwrap();
    lib.assets
        .create_bios(Bytes::from_static(b"opt"), bios("psx", "scph7502.bin", false))
        .await
        .unwrap();
    assert!(!required.verified);

    let status = lib.assets.bios_status("psx").await.unwrap();
    assert!(!status.ready);
    assert_eq!(status.files.len(), 2);

    let wrong = lib.assets.verify_bios(required.id, "00000000000000000000000000000000").await.unwrap();
    assert!(!wrong.verified);

    let right = lib
        .assets
        .verify_bios(required.id, &md5_hex(&data).to_uppercase())
        .await
        .unwrap();
    assert!(right.verified);
    assert!(lib.assets.bios_status("PSX").await.unwrap().ready);

    storage.inner.delete(&required.path).await.unwrap();
    let status = lib.assets.bios_status("psx").await.unwrap();
    assert!(!status.ready);
    assert!(status.files.iter().any(|f| !f.present));
}

#[tokio::test]
async fn orphan_scan_reports_unreferenced_keys_only() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    game(&lib, "gba", "metroid.gba").await;
    storage
        .inner
        .put("roms/gba/stray.gba", Bytes::from_static(b"x"), "")
        .await
        .unwrap();

    assert_eq!(
        lib.assets.find_orphans("roms/").await.unwrap(),
        vec!["roms/gba/stray.gba".to_string()]
    );
    assert_eq!(storage.deletes(), 0);
}

#[tokio::test]
async fn explicit_title_is_kept() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let game = lib
        .assets
        .create_rom(
            Bytes::from_static(b"rom"),
            RomUpload {
                title: Some("The Legend of Zelda".into()),
                region: Some("USA".into()),
                ..rom("nes", "zelda.nes")
            },
        )
        .await
        .unwrap();
    assert_eq!(game.title, "The Legend of Zelda");
    assert_eq!(game.region.as_deref(), Some("USA"));
}
