use crate::error::*;
use crate::keys::is_public_key;
use crate::models::*;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt};
use std::collections::HashSet;
use std::pin::Pin;
use std::time::Duration;

/// Bytes read back from the object store.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Bytes arriving from a caller, e.g. an HTTP request body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// The object store gateway. Keys are flat strings; there are no directories.
pub trait StorageBackend: Send + Sync + 'static + Clone {
    /// Create or overwrite `key`.
    fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Create or overwrite `key` from a stream, returning the number of bytes written.
    fn put_stream(
        &self,
        key: &str,
        stream: BodyStream,
        content_length: Option<u64>,
        content_type: &str,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    fn get_stream(&self, key: &str)
    -> impl Future<Output = Result<ByteStream, StorageError>> + Send;

    /// Size and version details, or [`StorageError::NotFound`].
    fn stat(&self, key: &str) -> impl Future<Output = Result<ObjectMeta, StorageError>> + Send;

    /// Removing a key that does not exist is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list(&self, prefix: &str) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// A time-limited URL reading `key` directly from the store.
    ///
    /// Returns `None` when the backend cannot sign.
    fn signed_url(
        &self,
        key: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    /// Base URL anonymous readers reach the bucket on, if it has one.
    fn public_base_url(&self) -> Option<&str> {
        None
    }

    /// Unsigned URL for keys under a public-read prefix.
    fn public_url(&self, key: &str) -> Option<String> {
        if !is_public_key(key) {
            return None;
        }
        self.public_base_url()
            .map(|base| format!("{}/{key}", base.trim_end_matches('/')))
    }

    fn read(&self, key: &str) -> impl Future<Output = Result<Bytes, StorageError>> + Send {
        async move {
            let chunks: Vec<Bytes> = self.get_stream(key).await?.try_collect().await?;
            Ok(Bytes::from(chunks.concat()))
        }
    }

    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send {
        async move {
            match self.stat(key).await {
                Ok(_) => Ok(true),
                Err(StorageError::NotFound(_)) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}

/// The relational metadata store, seen as typed record operations.
///
/// Implementations must make every single method atomic. The preferred-version
/// methods in particular clear and set the flag inside one transaction.
pub trait RecordStore: Send + Sync + 'static + Clone {
    fn insert_game(&self, game: NewGame)
    -> impl Future<Output = Result<Game, RecordError>> + Send;

    fn game(&self, id: RecordId) -> impl Future<Output = Result<Option<Game>, RecordError>> + Send;

    fn game_by_path(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<Game>, RecordError>> + Send;

    fn update_game(
        &self,
        id: RecordId,
        update: GameUpdate,
    ) -> impl Future<Output = Result<Game, RecordError>> + Send;

    /// Removes the game together with its versions, screenshots and save states.
    fn delete_game(&self, id: RecordId) -> impl Future<Output = Result<(), RecordError>> + Send;

    fn game_summaries(&self) -> impl Future<Output = Result<Vec<GameSummary>, RecordError>> + Send;

    /// Inserts a version. When `is_preferred` is set, every other version of
    /// the same game is cleared first, in the same transaction.
    fn insert_version(
        &self,
        version: NewGameVersion,
    ) -> impl Future<Output = Result<GameVersion, RecordError>> + Send;

    fn version(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<GameVersion>, RecordError>> + Send;

    fn versions(
        &self,
        game_id: RecordId,
    ) -> impl Future<Output = Result<Vec<GameVersion>, RecordError>> + Send;

    /// Clears the flag on every version of `game_id`, then sets it on
    /// `version_id`, atomically. Fails with `NotFound` when the version does
    /// not exist or belongs to another game.
    fn set_preferred_version(
        &self,
        game_id: RecordId,
        version_id: RecordId,
    ) -> impl Future<Output = Result<GameVersion, RecordError>> + Send;

    fn delete_version(&self, id: RecordId) -> impl Future<Output = Result<(), RecordError>> + Send;

    /// Fails with `Conflict` when `(system, file_name)` is already registered.
    fn insert_bios(
        &self,
        bios: NewBiosFile,
    ) -> impl Future<Output = Result<BiosFile, RecordError>> + Send;

    fn bios(&self, id: RecordId)
    -> impl Future<Output = Result<Option<BiosFile>, RecordError>> + Send;

    fn bios_by_name(
        &self,
        system: &str,
        file_name: &str,
    ) -> impl Future<Output = Result<Option<BiosFile>, RecordError>> + Send;

    fn bios_files(
        &self,
        system: Option<&str>,
    ) -> impl Future<Output = Result<Vec<BiosFile>, RecordError>> + Send;

    fn set_bios_verified(
        &self,
        id: RecordId,
        verified: bool,
    ) -> impl Future<Output = Result<BiosFile, RecordError>> + Send;

    fn delete_bios(&self, id: RecordId) -> impl Future<Output = Result<(), RecordError>> + Send;

    /// Insert or replace by `(user_id, game_id, slot)`. Replacing refreshes `updated_at`
    /// and keeps the original id and `created_at`.
    fn upsert_save_state(
        &self,
        save: NewSaveState,
    ) -> impl Future<Output = Result<SaveState, RecordError>> + Send;

    fn save_state(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<Option<SaveState>, RecordError>> + Send;

    fn save_states(
        &self,
        user_id: &str,
        game_id: Option<RecordId>,
    ) -> impl Future<Output = Result<Vec<SaveState>, RecordError>> + Send;

    fn delete_save_state(
        &self,
        id: RecordId,
    ) -> impl Future<Output = Result<(), RecordError>> + Send;

    /// Appends a screenshot at the next free index for the game.
    fn insert_screenshot(
        &self,
        game_id: RecordId,
        path: String,
    ) -> impl Future<Output = Result<Screenshot, RecordError>> + Send;

    fn screenshots(
        &self,
        game_id: RecordId,
    ) -> impl Future<Output = Result<Vec<Screenshot>, RecordError>> + Send;

    /// Every object key some record points at.
    fn referenced_paths(&self) -> impl Future<Output = Result<HashSet<String>, RecordError>> + Send;
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub scopes: Vec<String>,
}

impl User {
    pub fn has_scope(&self, required: &str) -> bool {
        self.scopes.iter().any(|s| s == "admin" || s == required)
    }
}

pub trait AuthProvider: Send + Sync + 'static + Clone {
    fn verify(&self, token: &str) -> impl Future<Output = Result<User, AuthError>> + Send;
}
