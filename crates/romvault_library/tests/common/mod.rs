#![allow(dead_code)]

use bytes::Bytes;
use romvault_core::prelude::*;
use romvault_library::{Library, RomUpload};
use romvault_memory::{MemoryRecords, MemoryStorage};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Wraps [`MemoryStorage`], counting calls and failing on request.
#[derive(Clone, Default)]
pub struct SpyStorage {
    pub inner: MemoryStorage,
    calls: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    fail_puts: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    signing_base: Option<String>,
}

impl SpyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs URLs as `{base}/{key}?ttl={secs}`, like a presigning backend would.
    pub fn signing(base: &str) -> Self {
        Self {
            signing_base: Some(base.to_string()),
            ..Self::default()
        }
    }

    pub fn public(base: &str) -> Self {
        Self {
            inner: MemoryStorage::new().with_public_base_url(base),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl StorageBackend for SpyStorage {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.hit();
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Generic("injected put failure".into()));
        }
        self.inner.put(key, data, content_type).await
    }

    async fn put_stream(
        &self,
        key: &str,
        stream: BodyStream,
        content_length: Option<u64>,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        self.hit();
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Generic("injected put failure".into()));
        }
        self.inner
            .put_stream(key, stream, content_length, content_type)
            .await
    }

    async fn get_stream(&self, key: &str) -> Result<ByteStream, StorageError> {
        self.hit();
        self.inner.get_stream(key).await
    }

    async fn stat(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        self.hit();
        self.inner.stat(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.hit();
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Generic("injected delete failure".into()));
        }
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.hit();
        self.inner.list(prefix).await
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<Option<String>, StorageError> {
        self.hit();
        Ok(self
            .signing_base
            .as_ref()
            .map(|base| format!("{base}/{key}?ttl={}", ttl.as_secs())))
    }

    fn public_base_url(&self) -> Option<&str> {
        self.inner.public_base_url()
    }
}

pub type TestLibrary = Library<SpyStorage, MemoryRecords>;

pub fn library(storage: &SpyStorage, records: &MemoryRecords) -> TestLibrary {
    library_with(storage, records, &LibraryConfig::default())
}

pub fn library_with(
    storage: &SpyStorage,
    records: &MemoryRecords,
    config: &LibraryConfig,
) -> TestLibrary {
    Library::new(storage.clone(), records.clone(), config)
}

pub fn rom(system: &str, file_name: &str) -> RomUpload {
    RomUpload {
        system: system.into(),
        file_name: file_name.into(),
        ..Default::default()
    }
}

pub async fn game(lib: &TestLibrary, system: &str, file_name: &str) -> Game {
    lib.assets
        .create_rom(Bytes::from(file_name.as_bytes().to_vec()), rom(system, file_name))
        .await
        .unwrap()
}

pub async fn collect(download: romvault_library::AssetDownload) -> Bytes {
    use futures::TryStreamExt;
    let chunks: Vec<Bytes> = download.stream.try_collect().await.unwrap();
    Bytes::from(chunks.concat())
}

/// Wraps [`MemoryRecords`], failing game and BIOS inserts on request.
#[derive(Clone, Default)]
pub struct FlakyRecords {
    pub inner: MemoryRecords,
    fail_inserts: Arc<AtomicBool>,
}

impl FlakyRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RecordError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RecordError::Backend("injected insert failure".into()));
        }
        Ok(())
    }
}

impl RecordStore for FlakyRecords {
    async fn insert_game(&self, game: NewGame) -> Result<Game, RecordError> {
        self.check()?;
        self.inner.insert_game(game).await
    }

    async fn game(&self, id: RecordId) -> Result<Option<Game>, RecordError> {
        self.inner.game(id).await
    }

    async fn game_by_path(&self, path: &str) -> Result<Option<Game>, RecordError> {
        self.inner.game_by_path(path).await
    }

    async fn update_game(&self, id: RecordId, update: GameUpdate) -> Result<Game, RecordError> {
        self.inner.update_game(id, update).await
    }

    async fn delete_game(&self, id: RecordId) -> Result<(), RecordError> {
        self.inner.delete_game(id).await
    }

    async fn game_summaries(&self) -> Result<Vec<GameSummary>, RecordError> {
        self.inner.game_summaries().await
    }

    async fn insert_version(&self, version: NewGameVersion) -> Result<GameVersion, RecordError> {
        self.inner.insert_version(version).await
    }

    async fn version(&self, id: RecordId) -> Result<Option<GameVersion>, RecordError> {
        self.inner.version(id).await
    }

    async fn versions(&self, game_id: RecordId) -> Result<Vec<GameVersion>, RecordError> {
        self.inner.versions(game_id).await
    }

    async fn set_preferred_version(
        &self,
        game_id: RecordId,
        version_id: RecordId,
    ) -> Result<GameVersion, RecordError> {
        self.inner.set_preferred_version(game_id, version_id).await
    }

    async fn delete_version(&self, id: RecordId) -> Result<(), RecordError> {
        self.inner.delete_version(id).await
    }

    async fn insert_bios(&self, bios: NewBiosFile) -> Result<BiosFile, RecordError> {
        self.check()?;
        self.inner.insert_bios(bios).await
    }

    async fn bios(&self, id: RecordId) -> Result<Option<BiosFile>, RecordError> {
        self.inner.bios(id).await
    }

    async fn bios_by_name(
        &self,
        system: &str,
        file_name: &str,
    ) -> Result<Option<BiosFile>, RecordError> {
        self.inner.bios_by_name(system, file_name).await
    }

    async fn bios_files(&self, system: Option<&str>) -> Result<Vec<BiosFile>, RecordError> {
        self.inner.bios_files(system).await
    }

    async fn set_bios_verified(&self, id: RecordId, verified: bool) -> Result<BiosFile, RecordError> {
        self.inner.set_bios_verified(id, verified).await
    }

    async fn delete_bios(&self, id: RecordId) -> Result<(), RecordError> {
        self.inner.delete_bios(id).await
    }

    async fn upsert_save_state(&self, save: NewSaveState) -> Result<SaveState, RecordError> {
        self.inner.upsert_save_state(save).await
    }

    async fn save_state(&self, id: RecordId) -> Result<Option<SaveState>, RecordError> {
        self.inner.save_state(id).await
    }

    async fn save_states(
        &self,
        user_id: &str,
        game_id: Option<RecordId>,
    ) -> Result<Vec<SaveState>, RecordError> {
        self.inner.save_states(user_id, game_id).await
    }

    async fn delete_save_state(&self, id: RecordId) -> Result<(), RecordError> {
        self.inner.delete_save_state(id).await
    }

    async fn insert_screenshot(&self, game_id: RecordId, path: String) -> Result<Screenshot, RecordError> {
        self.inner.insert_screenshot(game_id, path).await
    }

    async fn screenshots(&self, game_id: RecordId) -> Result<Vec<Screenshot>, RecordError> {
        self.inner.screenshots(game_id).await
    }

    async fn referenced_paths(&self) -> Result<HashSet<String>, RecordError> {
        self.inner.referenced_paths().await
    }
}
