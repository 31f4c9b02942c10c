//! # romvault FileSystem Storage
//!
//! A local filesystem backend for romvault.
//!
//! This crate implements the [`StorageBackend`] trait, storing every object
//! key as a file below a root directory (`roms/nes/zelda.nes` becomes
//! `<root>/roms/nes/zelda.nes`).
//!
//! ## Features
//!
//! * **Atomic Writes**: Uses temporary files and rename operations so a ROM or save state is never read half-written.
//! * **Streaming Reads**: Objects are streamed from disk in chunks instead of being loaded whole.
//!
//! The filesystem cannot presign URLs, so downloads from this backend always
//! go through the proxy routes.
//!
//! ## Usage
//!
//! ```no_run
//! use romvault_fs::FileSystemStorage;
//!
//! let storage = FileSystemStorage::new("./romvault_data");
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use romvault_core::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument, warn};

const PARTIAL_SUFFIX: &str = ".partial";

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

fn temp_path(path: &Path) -> PathBuf {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}-{seq}{PARTIAL_SUFFIX}", std::process::id()))
}

async fn atomic_write(path: &Path, data: Bytes) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
    }

    let tmp_path = temp_path(path);
    let result = match fs::write(&tmp_path, data).await {
        Ok(()) => fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    discard_on_error(&tmp_path, result).await
}

/// Writes the stream to `tmp_path`, then moves it over `path`.
async fn write_stream(tmp_path: &Path, path: &Path, mut stream: BodyStream) -> std::io::Result<u64> {
    let mut file = fs::File::create(tmp_path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);
    fs::rename(tmp_path, path).await?;
    Ok(written)
}

/// Removes the temp file of a failed write so no `.partial` is left behind.
async fn discard_on_error<T>(tmp_path: &Path, result: std::io::Result<T>) -> Result<T, StorageError> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            match fs::remove_file(tmp_path).await {
                Err(cleanup) if cleanup.kind() != std::io::ErrorKind::NotFound => {
                    warn!(path = %tmp_path.display(), error = %cleanup, "temp file left behind");
                }
                _ => {}
            }
            Err(StorageError::Io(e))
        }
    }
}

fn not_found_or_io(key: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(e)
        }
    }
}

#[derive(Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FileSystemStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            root: path.into(),
            public_base_url: None,
        }
    }

    /// Base URL a static file server exposes `covers/` and `screenshots/` on.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn walk(&self, dir: PathBuf, keys: &mut Vec<String>) -> Result<(), StorageError> {
        let mut pending = vec![dir];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    keys.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        Ok(())
    }
}

impl StorageBackend for FileSystemStorage {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StorageError> {
        atomic_write(&self.get_path(key), data).await?;
        debug!("object written");
        Ok(())
    }

    #[instrument(skip(self, stream))]
    async fn put_stream(
        &self,
        key: &str,
        stream: BodyStream,
        _content_length: Option<u64>,
        _content_type: &str,
    ) -> Result<u64, StorageError> {
        let path = self.get_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(StorageError::Io)?;
        }
        let tmp_path = temp_path(&path);
        let written = discard_on_error(&tmp_path, write_stream(&tmp_path, &path, stream).await).await?;

        debug!(written, "object streamed to disk");
        Ok(written)
    }

    async fn get_stream(&self, key: &str) -> Result<ByteStream, StorageError> {
        let file = fs::File::open(self.get_path(key))
            .await
            .map_err(not_found_or_io(key))?;
        Ok(Box::pin(ReaderStream::new(file).map_err(StorageError::Io)))
    }

    async fn stat(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        let meta = fs::metadata(self.get_path(key))
            .await
            .map_err(not_found_or_io(key))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(ObjectMeta {
            size: meta.len(),
            last_modified: meta.modified().ok().map(DateTime::<Utc>::from),
            etag: None,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.get_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        // Walk from the deepest directory the prefix fully names.
        let start = match prefix.rfind('/') {
            Some(idx) => self.get_path(&prefix[..idx]),
            None => self.root.clone(),
        };
        let mut keys = Vec::new();
        self.walk(start, &mut keys).await?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    async fn signed_url(&self, _key: &str, _ttl: Duration) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}
