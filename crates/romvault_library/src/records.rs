use romvault_core::prelude::*;

/// Record-store access with the existence and ownership checks the managers
/// run before touching object storage.
#[derive(Clone)]
pub struct AssetRecords<R: RecordStore> {
    store: R,
}

impl<R: RecordStore> AssetRecords<R> {
    pub fn new(store: R) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub async fn game(&self, id: RecordId) -> Result<Game, AssetError> {
        self.store
            .game(id)
            .await?
            .ok_or_else(|| AssetError::NotFound(format!("Game {id}")))
    }

    pub async fn version(&self, id: RecordId) -> Result<GameVersion, AssetError> {
        self.store
            .version(id)
            .await?
            .ok_or_else(|| AssetError::NotFound(format!("Game version {id}")))
    }

    pub async fn bios(&self, id: RecordId) -> Result<BiosFile, AssetError> {
        self.store
            .bios(id)
            .await?
            .ok_or_else(|| AssetError::NotFound(format!("BIOS file {id}")))
    }

    /// A save state that must belong to `user_id`.
    pub async fn owned_save_state(
        &self,
        id: RecordId,
        user_id: &str,
    ) -> Result<SaveState, AssetError> {
        let save = self
            .store
            .save_state(id)
            .await?
            .ok_or_else(|| AssetError::NotFound(format!("Save state {id}")))?;
        if save.user_id != user_id {
            return Err(AssetError::AccessDenied);
        }
        Ok(save)
    }

    /// Fails with `DuplicateAsset` when another game already owns `path`.
    pub async fn ensure_rom_path_free(&self, path: &str) -> Result<(), AssetError> {
        match self.store.game_by_path(path).await? {
            Some(existing) => Err(AssetError::DuplicateAsset(format!(
                "{path} (game {})",
                existing.id
            ))),
            None => Ok(()),
        }
    }

    /// Fails with `DuplicateAsset` when `(system, file_name)` is already registered.
    pub async fn ensure_bios_free(&self, system: &str, file_name: &str) -> Result<(), AssetError> {
        match self.store.bios_by_name(system, file_name).await? {
            Some(_) => Err(AssetError::DuplicateAsset(format!(
                "BIOS {file_name} for {system}"
            ))),
            None => Ok(()),
        }
    }
}
