use crate::cleanup::{log_cleanup_failure, remove_object};
use crate::download::{AssetDownload, DownloadReference, reference_for};
use crate::lifecycle::key_file_name;
use crate::records::AssetRecords;
use bytes::Bytes;
use chrono::Utc;
use romvault_core::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionUpload {
    /// Defaults to `{region}` or `{region}-{revision}`.
    pub name: Option<String>,
    pub region: String,
    pub revision: Option<String>,
    #[serde(default)]
    pub preferred: bool,
}

impl VersionUpload {
    fn version_name(&self) -> String {
        match (&self.name, &self.revision) {
            (Some(name), _) if !name.trim().is_empty() => name.trim().to_string(),
            (_, Some(rev)) if !rev.trim().is_empty() => format!("{}-{}", self.region, rev.trim()),
            _ => self.region.clone(),
        }
    }
}

/// The ROM a game should be played from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServedRom {
    pub asset: AssetRef,
    pub key: String,
    pub md5_hash: String,
    pub file_size: u64,
}

/// Regional and revision variants of a game, with at most one preferred.
///
/// The preferred flag is only ever changed through the record store's
/// clear-then-set methods, which run as a single transaction.
#[derive(Clone)]
pub struct VersionSelector<S: StorageBackend, R: RecordStore> {
    storage: S,
    records: AssetRecords<R>,
    download: DownloadConfig,
}

impl<S: StorageBackend, R: RecordStore> VersionSelector<S, R> {
    pub fn new(storage: S, records: R, config: &LibraryConfig) -> Self {
        Self {
            storage,
            records: AssetRecords::new(records),
            download: config.download.clone(),
        }
    }

    #[instrument(skip(self, data, upload), fields(region = %upload.region, size = data.len(), preferred = upload.preferred))]
    pub async fn create_version(
        &self,
        game_id: RecordId,
        data: Bytes,
        upload: VersionUpload,
    ) -> Result<GameVersion, AssetError> {
        let name = upload.version_name();
        validate_file_name(&name)?;
        self.records.game(game_id).await?;

        let fp = fingerprint(
            &data,
            &AssetContext::Version {
                game_id,
                version_name: &name,
                unix_millis: Utc::now().timestamp_millis(),
            },
        );

        self.storage
            .put(&fp.key, data, "application/octet-stream")
            .await
            .map_err(AssetError::storage("uploading a game version"))?;

        let version = self
            .records
            .store()
            .insert_version(NewGameVersion {
                game_id,
                name,
                region: upload.region,
                revision: upload.revision,
                rom_path: fp.key.clone(),
                md5_hash: fp.md5,
                file_size: fp.size,
                is_preferred: upload.preferred,
            })
            .await
            .inspect_err(|e| warn!(key = %fp.key, error = %e, "version stored but record write failed"))?;

        info!(version_id = version.id, key = %version.rom_path, "game version created");
        Ok(version)
    }

    /// Makes `version_id` the only preferred version of `game_id`.
    ///
    /// A version that belongs to a different game is reported as not found.
    #[instrument(skip(self))]
    pub async fn set_preferred(
        &self,
        game_id: RecordId,
        version_id: RecordId,
    ) -> Result<GameVersion, AssetError> {
        self.records.game(game_id).await?;
        let version = self
            .records
            .store()
            .set_preferred_version(game_id, version_id)
            .await?;
        info!("preferred version changed");
        Ok(version)
    }

    #[instrument(skip(self))]
    pub async fn delete_version(&self, version_id: RecordId) -> Result<(), AssetError> {
        let version = self.records.version(version_id).await?;

        if let Err(err) = remove_object(&self.storage, &version.rom_path).await {
            log_cleanup_failure(&err);
        }
        self.records.store().delete_version(version_id).await?;

        info!(key = %version.rom_path, "game version deleted");
        Ok(())
    }

    /// Preferred first, then newest.
    pub async fn list_versions(&self, game_id: RecordId) -> Result<Vec<GameVersion>, AssetError> {
        self.records.game(game_id).await?;
        let mut versions = self.records.store().versions(game_id).await?;
        versions.sort_by(|a, b| {
            b.is_preferred
                .cmp(&a.is_preferred)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(versions)
    }

    /// The preferred version if the game has one, else its primary ROM.
    pub async fn resolve_rom(&self, game_id: RecordId) -> Result<ServedRom, AssetError> {
        let game = self.records.game(game_id).await?;
        let preferred = self
            .records
            .store()
            .versions(game_id)
            .await?
            .into_iter()
            .find(|v| v.is_preferred);

        Ok(match preferred {
            Some(v) => ServedRom {
                asset: AssetRef::Version(v.id),
                key: v.rom_path,
                md5_hash: v.md5_hash,
                file_size: v.file_size,
            },
            None => ServedRom {
                asset: AssetRef::Game(game.id),
                key: game.path,
                md5_hash: game.md5_hash,
                file_size: game.file_size,
            },
        })
    }

    pub async fn download_reference(&self, game_id: RecordId) -> Result<DownloadReference, AssetError> {
        let rom = self.resolve_rom(game_id).await?;
        reference_for(&self.storage, &self.download, rom.asset, &rom.key).await
    }

    /// Streams whichever ROM `resolve_rom` picks.
    pub async fn open_served(&self, game_id: RecordId) -> Result<AssetDownload, AssetError> {
        let rom = self.resolve_rom(game_id).await?;
        let stream = self
            .storage
            .get_stream(&rom.key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => AssetError::NotFound(rom.asset.to_string()),
                other => AssetError::storage("downloading")(other),
            })?;
        Ok(AssetDownload {
            file_name: key_file_name(&rom.key),
            size: rom.file_size,
            md5: Some(rom.md5_hash),
            stream,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: Option<&str>, revision: Option<&str>) -> VersionUpload {
        VersionUpload {
            name: name.map(str::to_string),
            region: "USA".into(),
            revision: revision.map(str::to_string),
            preferred: false,
        }
    }

    #[test]
    fn version_names_fall_back_to_region_and_revision() {
        assert_eq!(upload(None, None).version_name(), "USA");
        assert_eq!(upload(None, Some("Rev 1")).version_name(), "USA-Rev 1");
        assert_eq!(upload(Some(" Beta "), Some("Rev 1")).version_name(), "Beta");
        assert_eq!(upload(Some(""), None).version_name(), "USA");
    }
}
