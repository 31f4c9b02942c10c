//! Creating, updating and deleting ROM and BIOS assets.
//!
//! Object writes always happen before record writes, so a record never points
//! at bytes that were not stored. The reverse can happen: if the record write
//! fails the object stays behind until an external sweep removes it.

use crate::cleanup::{log_cleanup_failure, remove_object};
use crate::download::{AssetDownload, DownloadReference, reference_for};
use crate::records::AssetRecords;
use bytes::Bytes;
use romvault_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RomUpload {
    pub system: String,
    pub file_name: String,
    /// Defaults to the file name without its extension.
    pub title: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiosUpload {
    pub system: String,
    pub file_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiosFileStatus {
    #[serde(flatten)]
    pub bios: BiosFile,
    /// Whether the object behind the record is still in storage.
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiosStatus {
    pub system: String,
    pub files: Vec<BiosFileStatus>,
    /// Every required file is present and verified.
    pub ready: bool,
}

#[derive(Clone)]
pub struct AssetLifecycle<S: StorageBackend, R: RecordStore> {
    storage: S,
    records: AssetRecords<R>,
    systems: SystemRegistry,
    download: DownloadConfig,
}

impl<S: StorageBackend, R: RecordStore> AssetLifecycle<S, R> {
    pub fn new(storage: S, records: R, config: &LibraryConfig) -> Self {
        Self {
            storage,
            records: AssetRecords::new(records),
            systems: config.registry(),
            download: config.download.clone(),
        }
    }

    pub fn records(&self) -> &AssetRecords<R> {
        &self.records
    }

    /// Stores a primary ROM at `roms/{system}/{fileName}` and records it.
    #[instrument(skip(self, data, upload), fields(system = %upload.system, file_name = %upload.file_name, size = data.len()))]
    pub async fn create_rom(&self, data: Bytes, upload: RomUpload) -> Result<Game, AssetError> {
        let system = self.systems.resolve(&upload.system)?;
        validate_file_name(&upload.file_name)?;

        let fp = fingerprint(
            &data,
            &AssetContext::Rom {
                system: &system,
                file_name: &upload.file_name,
            },
        );
        self.records.ensure_rom_path_free(&fp.key).await?;

        self.storage
            .put(&fp.key, data, "application/octet-stream")
            .await
            .map_err(AssetError::storage("uploading a ROM"))?;

        let title = upload
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_file_name(&upload.file_name));

        let game = self
            .records
            .store()
            .insert_game(NewGame {
                title,
                system,
                file_name: upload.file_name,
                path: fp.key.clone(),
                md5_hash: fp.md5,
                file_size: fp.size,
                region: upload.region,
                description: upload.description,
                developer: upload.developer,
                publisher: upload.publisher,
                genre: upload.genre,
                release_year: upload.release_year,
            })
            .await
            .inspect_err(|e| warn!(key = %fp.key, error = %e, "ROM stored but record write failed"))?;

        info!(game_id = game.id, key = %game.path, "ROM created");
        Ok(game)
    }

    /// Stores a BIOS image at `bios/{system}/{fileName}`. Unique per system and file name.
    #[instrument(skip(self, data, upload), fields(system = %upload.system, file_name = %upload.file_name, size = data.len()))]
    pub async fn create_bios(&self, data: Bytes, upload: BiosUpload) -> Result<BiosFile, AssetError> {
        let system = self.systems.resolve(&upload.system)?;
        validate_file_name(&upload.file_name)?;
        self.records
            .ensure_bios_free(&system, &upload.file_name)
            .await?;

        let fp = fingerprint(
            &data,
            &AssetContext::Bios {
                system: &system,
                file_name: &upload.file_name,
            },
        );

        self.storage
            .put(&fp.key, data, "application/octet-stream")
            .await
            .map_err(AssetError::storage("uploading a BIOS file"))?;

        let bios = self
            .records
            .store()
            .insert_bios(NewBiosFile {
                system,
                file_name: upload.file_name,
                path: fp.key.clone(),
                md5_hash: fp.md5,
                file_size: fp.size,
                description: upload.description,
                required: upload.required,
            })
            .await
            .inspect_err(|e| warn!(key = %fp.key, error = %e, "BIOS stored but record write failed"))?;

        info!(bios_id = bios.id, key = %bios.path, "BIOS file created");
        Ok(bios)
    }

    /// Changes descriptive fields only; the stored ROM is untouched.
    ///
    /// `cover_path` is ignored here and only written by [`Self::set_cover`].
    /// An update with nothing left to change returns the current record
    /// without refreshing `updated_at`.
    pub async fn update_game(&self, id: RecordId, mut update: GameUpdate) -> Result<Game, AssetError> {
        update.cover_path = None;
        if update.is_empty() {
            return self.records.game(id).await;
        }
        Ok(self.records.store().update_game(id, update).await?)
    }

    /// Replaces the cover art at `covers/{gameId}.jpg`.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn set_cover(&self, game_id: RecordId, data: Bytes) -> Result<Game, AssetError> {
        self.records.game(game_id).await?;
        let context = AssetContext::Cover { game_id };
        let key = context.key();
        self.storage
            .put(&key, data, context.content_type())
            .await
            .map_err(AssetError::storage("uploading cover art"))?;

        let update = GameUpdate {
            cover_path: Some(key),
            ..Default::default()
        };
        Ok(self.records.store().update_game(game_id, update).await?)
    }

    /// Appends a screenshot at `screenshots/{gameId}/{index}.jpg`.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn add_screenshot(
        &self,
        game_id: RecordId,
        data: Bytes,
    ) -> Result<Screenshot, AssetError> {
        self.records.game(game_id).await?;
        let index = self.records.store().screenshots(game_id).await?.len() as u32;
        let context = AssetContext::Screenshot { game_id, index };
        let key = context.key();
        self.storage
            .put(&key, data, context.content_type())
            .await
            .map_err(AssetError::storage("uploading a screenshot"))?;

        Ok(self.records.store().insert_screenshot(game_id, key).await?)
    }

    /// Unsigned URL for cover art and screenshots.
    pub fn public_url(&self, key: &str) -> Option<String> {
        self.storage.public_url(key)
    }

    /// Two-phase delete: the object is removed best-effort, then the record
    /// is removed unconditionally.
    ///
    /// Deleting a game cascades to its versions, screenshots and save states
    /// in the record store only. Their objects are left for the external sweep.
    #[instrument(skip(self))]
    pub async fn delete(&self, asset: AssetRef) -> Result<(), AssetError> {
        let keys = self.object_keys(asset).await?;

        for key in &keys {
            if let Err(err) = remove_object(&self.storage, key).await {
                log_cleanup_failure(&err);
            }
        }

        let store = self.records.store();
        match asset {
            AssetRef::Game(id) => store.delete_game(id).await?,
            AssetRef::Version(id) => store.delete_version(id).await?,
            AssetRef::Bios(id) => store.delete_bios(id).await?,
        }

        info!(%asset, "asset deleted");
        Ok(())
    }

    pub async fn download_reference(&self, asset: AssetRef) -> Result<DownloadReference, AssetError> {
        let key = self.rom_key(asset).await?;
        reference_for(&self.storage, &self.download, asset, &key).await
    }

    /// Streams an asset through this process, for the proxy routes.
    #[instrument(skip(self))]
    pub async fn open(&self, asset: AssetRef) -> Result<AssetDownload, AssetError> {
        let (key, file_name, size, md5) = match asset {
            AssetRef::Game(id) => {
                let game = self.records.game(id).await?;
                (game.path, game.file_name, game.file_size, game.md5_hash)
            }
            AssetRef::Version(id) => {
                let version = self.records.version(id).await?;
                let file_name = key_file_name(&version.rom_path);
                (version.rom_path, file_name, version.file_size, version.md5_hash)
            }
            AssetRef::Bios(id) => {
                let bios = self.records.bios(id).await?;
                (bios.path, bios.file_name, bios.file_size, bios.md5_hash)
            }
        };

        let stream = self.storage.get_stream(&key).await.map_err(|e| match e {
            StorageError::NotFound(_) => {
                warn!(%key, "record points at a missing object");
                AssetError::NotFound(asset.to_string())
            }
            other => AssetError::storage("downloading")(other),
        })?;

        Ok(AssetDownload {
            file_name,
            size,
            md5: Some(md5),
            stream,
        })
    }

    /// Compares the stored digest with `expected_md5` and records the outcome.
    #[instrument(skip(self))]
    pub async fn verify_bios(&self, id: RecordId, expected_md5: &str) -> Result<BiosFile, AssetError> {
        let bios = self.records.bios(id).await?;
        let verified = bios.md5_hash.eq_ignore_ascii_case(expected_md5.trim());
        if !verified {
            warn!(bios_id = id, stored = %bios.md5_hash, "BIOS digest mismatch");
        }
        Ok(self.records.store().set_bios_verified(id, verified).await?)
    }

    /// Which BIOS files of a system are usable right now.
    pub async fn bios_status(&self, system: &str) -> Result<BiosStatus, AssetError> {
        let system = self.systems.resolve(system)?;
        let mut files = Vec::new();
        for bios in self.records.store().bios_files(Some(&system)).await? {
            let present = self
                .storage
                .exists(&bios.path)
                .await
                .map_err(AssetError::storage("checking BIOS files"))?;
            files.push(BiosFileStatus { bios, present });
        }
        let ready = files
            .iter()
            .filter(|f| f.bios.required)
            .all(|f| f.present && f.bios.verified);
        Ok(BiosStatus {
            system,
            files,
            ready,
        })
    }

    /// Object keys under `prefix` that no record refers to. Deletes nothing.
    pub async fn find_orphans(&self, prefix: &str) -> Result<Vec<String>, AssetError> {
        let keys = self
            .storage
            .list(prefix)
            .await
            .map_err(AssetError::storage("listing objects"))?;
        let referenced = self.records.store().referenced_paths().await?;
        Ok(keys.into_iter().filter(|k| !referenced.contains(k)).collect())
    }

    async fn rom_key(&self, asset: AssetRef) -> Result<String, AssetError> {
        Ok(match asset {
            AssetRef::Game(id) => self.records.game(id).await?.path,
            AssetRef::Version(id) => self.records.version(id).await?.rom_path,
            AssetRef::Bios(id) => self.records.bios(id).await?.path,
        })
    }

    async fn object_keys(&self, asset: AssetRef) -> Result<Vec<String>, AssetError> {
        Ok(match asset {
            AssetRef::Game(id) => {
                let game = self.records.game(id).await?;
                std::iter::once(game.path).chain(game.cover_path).collect()
            }
            other => vec![self.rom_key(other).await?],
        })
    }
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string())
}

pub(crate) fn key_file_name(key: &str) -> String {
    key.rsplit('/').next().unwrap_or(key).to_string()
}
