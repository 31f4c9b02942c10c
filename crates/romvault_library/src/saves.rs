//! Per-user save slots, 1 to 10 for each game.
//!
//! State objects live at an untimestamped key, so saving into an occupied slot
//! overwrites the previous bytes in place. There is no save history.
//!
//! Saving without a screenshot clears the record's screenshot path but leaves
//! any earlier `slot-{n}.png` in the bucket for the orphan scan. A concurrent
//! save into the same slot may already own that key again.

use crate::cleanup::remove_objects;
use crate::download::AssetDownload;
use crate::records::AssetRecords;
use bytes::Bytes;
use romvault_core::prelude::*;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub user_id: String,
    pub game_id: RecordId,
    /// Checked against the slot range before any I/O.
    pub slot: i64,
    pub state: Bytes,
    pub screenshot: Option<Bytes>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct SaveSlots<S: StorageBackend, R: RecordStore> {
    storage: S,
    records: AssetRecords<R>,
}

impl<S: StorageBackend, R: RecordStore> SaveSlots<S, R> {
    pub fn new(storage: S, records: R) -> Self {
        Self {
            storage,
            records: AssetRecords::new(records),
        }
    }

    /// Writes the slot, replacing whatever it held.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, game_id = request.game_id, slot = request.slot, size = request.state.len()))]
    pub async fn create_or_update(&self, request: SaveRequest) -> Result<SaveState, AssetError> {
        let slot = Slot::new(request.slot)?;
        validate_file_name(&request.user_id)?;
        self.records.game(request.game_id).await?;

        let state_ctx = AssetContext::SaveState {
            user_id: &request.user_id,
            game_id: request.game_id,
            slot,
        };
        let state_key = state_ctx.key();
        let file_size = request.state.len() as u64;
        self.storage
            .put(&state_key, request.state, state_ctx.content_type())
            .await
            .map_err(AssetError::storage("uploading a save state"))?;

        let screenshot_path = match request.screenshot {
            Some(png) => {
                let shot_ctx = AssetContext::SaveScreenshot {
                    user_id: &request.user_id,
                    game_id: request.game_id,
                    slot,
                };
                let key = shot_ctx.key();
                self.storage
                    .put(&key, png, shot_ctx.content_type())
                    .await
                    .map_err(AssetError::storage("uploading a save screenshot"))?;
                Some(key)
            }
            None => None,
        };

        let save = self
            .records
            .store()
            .upsert_save_state(NewSaveState {
                user_id: request.user_id,
                game_id: request.game_id,
                slot: slot.get(),
                path: state_key,
                screenshot_path,
                description: request.description,
                file_size,
            })
            .await
            .inspect_err(|e| warn!(error = %e, "save state stored but record write failed"))?;

        info!(save_id = save.id, key = %save.path, "save state written");
        Ok(save)
    }

    /// Ordered by game, then slot.
    pub async fn list(
        &self,
        user_id: &str,
        game_id: Option<RecordId>,
    ) -> Result<Vec<SaveState>, AssetError> {
        Ok(self.records.store().save_states(user_id, game_id).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: RecordId, user_id: &str) -> Result<(), AssetError> {
        let save = self.records.owned_save_state(id, user_id).await?;

        let keys = std::iter::once(save.path.clone()).chain(save.screenshot_path.clone());
        remove_objects(&self.storage, keys).await;
        self.records.store().delete_save_state(id).await?;

        info!(key = %save.path, "save state deleted");
        Ok(())
    }

    /// Streams the state bytes without buffering them.
    #[instrument(skip(self))]
    pub async fn load(
        &self,
        id: RecordId,
        user_id: &str,
    ) -> Result<(SaveState, AssetDownload), AssetError> {
        let save = self.records.owned_save_state(id, user_id).await?;
        let download = self
            .open(&save.path, save.file_size, format!("slot-{}.state", save.slot))
            .await?;
        Ok((save, download))
    }

    pub async fn load_screenshot(
        &self,
        id: RecordId,
        user_id: &str,
    ) -> Result<AssetDownload, AssetError> {
        let save = self.records.owned_save_state(id, user_id).await?;
        let key = save
            .screenshot_path
            .ok_or_else(|| AssetError::NotFound(format!("Screenshot for save state {id}")))?;
        let size = self
            .storage
            .stat(&key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => {
                    AssetError::NotFound(format!("Screenshot for save state {id}"))
                }
                other => AssetError::storage("downloading")(other),
            })?
            .size;
        self.open(&key, size, format!("slot-{}.png", save.slot)).await
    }

    async fn open(&self, key: &str, size: u64, file_name: String) -> Result<AssetDownload, AssetError> {
        let stream = self.storage.get_stream(key).await.map_err(|e| match e {
            StorageError::NotFound(k) => AssetError::NotFound(k),
            other => AssetError::storage("downloading")(other),
        })?;
        Ok(AssetDownload {
            file_name,
            size,
            md5: None,
            stream,
        })
    }
}
