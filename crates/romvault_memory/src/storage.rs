use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{TryStreamExt, stream};
use romvault_core::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    public_base_url: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn poisoned() -> StorageError {
        StorageError::Generic("object map lock poisoned".into())
    }
}

impl StorageBackend for MemoryStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StorageError> {
        debug!(key, size = data.len(), "storing object in memory");
        let object = StoredObject {
            etag: md5_hex(&data),
            data,
            last_modified: Utc::now(),
        };
        self.objects
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(key.to_string(), object);
        Ok(())
    }

    async fn put_stream(
        &self,
        key: &str,
        stream: BodyStream,
        _content_length: Option<u64>,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        let data = Bytes::from(chunks.concat());
        let size = data.len() as u64;
        self.put(key, data, content_type).await?;
        Ok(size)
    }

    async fn get_stream(&self, key: &str) -> Result<ByteStream, StorageError> {
        let data = self
            .objects
            .read()
            .map_err(|_| Self::poisoned())?
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let chunks: Vec<Result<Bytes, StorageError>> = (0..data.len())
            .step_by(CHUNK_SIZE)
            .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    async fn stat(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        self.objects
            .read()
            .map_err(|_| Self::poisoned())?
            .get(key)
            .map(|o| ObjectMeta {
                size: o.data.len() as u64,
                last_modified: Some(o.last_modified),
                etag: Some(o.etag.clone()),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects
            .write()
            .map_err(|_| Self::poisoned())?
            .remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .map_err(|_| Self::poisoned())?
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn signed_url(&self, _key: &str, _ttl: Duration) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}
