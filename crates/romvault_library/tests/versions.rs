mod common;

use bytes::Bytes;
use common::*;
use romvault_core::prelude::*;
use romvault_library::VersionUpload;
use romvault_memory::MemoryRecords;

fn version(region: &str, preferred: bool) -> VersionUpload {
    VersionUpload {
        name: None,
        region: region.into(),
        revision: None,
        preferred,
    }
}

#[tokio::test]
async fn versions_get_timestamped_keys() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let game = game(&lib, "snes", "zelda.sfc").await;

    let v = lib
        .versions
        .create_version(game.id, Bytes::from_static(b"jp"), version("Japan", false))
        .await
        .unwrap();

    let prefix = format!("roms/versions/{}/Japan-", game.id);
    assert!(v.rom_path.starts_with(&prefix), "{}", v.rom_path);
    let millis = &v.rom_path[prefix.len()..v.rom_path.len() - ".rom".len()];
    assert!(millis.parse::<i64>().is_ok());
    assert_eq!(v.md5_hash, md5_hex(b"jp"));
}

#[tokio::test]
async fn creating_a_preferred_version_clears_the_others() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let game = game(&lib, "nes", "mario.nes").await;

    let usa = lib
        .versions
        .create_version(game.id, Bytes::from_static(b"u"), version("USA", true))
        .await
        .unwrap();
    let europe = lib
        .versions
        .create_version(game.id, Bytes::from_static(b"e"), version("Europe", true))
        .await
        .unwrap();

    let versions = lib.versions.list_versions(game.id).await.unwrap();
    let preferred: Vec<_> = versions.iter().filter(|v| v.is_preferred).map(|v| v.id).collect();
    assert_eq!(preferred, vec![europe.id]);
    assert_eq!(versions[0].id, europe.id);
    assert!(versions.iter().any(|v| v.id == usa.id && !v.is_preferred));
}

#[tokio::test]
async fn concurrent_set_preferred_leaves_one_preferred() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let game = game(&lib, "gba", "advance_wars.gba").await;

    let mut ids = Vec::new();
    for region in ["USA", "Europe", "Japan", "Korea", "China"] {
        let v = lib
            .versions
            .create_version(game.id, Bytes::from(region.as_bytes().to_vec()), version(region, false))
            .await
            .unwrap();
        ids.push(v.id);
    }

    let mut handles = Vec::new();
    for round in 0..20 {
        let lib = lib.clone();
        let id = ids[round % ids.len()];
        let game_id = game.id;
        handles.push(tokio::spawn(async move {
            lib.versions.set_preferred(game_id, id).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let preferred = records
        .versions(game.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|v| v.is_preferred)
        .count();
    assert_eq!(preferred, 1);
}

#[tokio::test]
async fn set_preferred_rejects_versions_of_other_games() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let zelda = game(&lib, "nes", "zelda.nes").await;
    let metroid = game(&lib, "nes", "metroid.nes").await;
    let v = lib
        .versions
        .create_version(metroid.id, Bytes::from_static(b"m"), version("USA", false))
        .await
        .unwrap();

    let err = lib.versions.set_preferred(zelda.id, v.id).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert!(lib.versions.list_versions(metroid.id).await.unwrap().iter().all(|v| !v.is_preferred));
}

#[tokio::test]
async fn resolve_rom_prefers_flagged_version() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let game = game(&lib, "psx", "ff7.bin").await;

    let served = lib.versions.resolve_rom(game.id).await.unwrap();
    assert_eq!(served.asset, AssetRef::Game(game.id));
    assert_eq!(served.key, game.path);

    let v = lib
        .versions
        .create_version(game.id, Bytes::from_static(b"pal"), version("Europe", true))
        .await
        .unwrap();
    let served = lib.versions.resolve_rom(game.id).await.unwrap();
    assert_eq!(served.asset, AssetRef::Version(v.id));

    let download = lib.versions.open_served(game.id).await.unwrap();
    assert_eq!(collect(download).await, Bytes::from_static(b"pal"));
}

#[tokio::test]
async fn delete_version_is_two_phase() {
    let storage = SpyStorage::new();
    let records = MemoryRecords::new();
    let lib = library(&storage, &records);
    let game = game(&lib, "gb", "pokemon.gb").await;
    let v = lib
        .versions
        .create_version(game.id, Bytes::from_static(b"v"), version("USA", true))
        .await
        .unwrap();

    storage.fail_deletes(true);
    lib.versions.delete_version(v.id).await.unwrap();

    assert!(records.version(v.id).await.unwrap().is_none());
    assert_eq!(lib.versions.resolve_rom(game.id).await.unwrap().asset, AssetRef::Game(game.id));
}

#[tokio::test]
async fn versions_for_missing_games_upload_nothing() {
    let storage = SpyStorage::new();
    let lib = library(&storage, &MemoryRecords::new());
    let err = lib
        .versions
        .create_version(7, Bytes::from_static(b"v"), version("USA", false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
    assert_eq!(storage.calls(), 0);
}
