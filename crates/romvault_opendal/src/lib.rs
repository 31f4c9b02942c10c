use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use opendal::{ErrorKind, Operator};
use romvault_core::prelude::*;
use std::time::Duration;
use tracing::debug;

fn map_err(path: &str) -> impl FnOnce(opendal::Error) -> StorageError + '_ {
    move |e| match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
        _ => StorageError::Generic(format!("OpenDAL Error: {e}")),
    }
}

#[derive(Clone)]
pub struct OpendalStorage {
    op: Operator,
    public_base_url: Option<String>,
}

impl OpendalStorage {
    /// Create a new storage from an OpenDAL Operator.
    /// The Operator can be configured for any supported backend e.g., s3, fs, gcs, etc.
    pub fn new(op: Operator) -> Self {
        Self {
            op,
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }
}

impl StorageBackend for OpendalStorage {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.op
            .write_with(path, data)
            .content_type(content_type)
            .await
            .map_err(|e| StorageError::Generic(format!("OpenDAL Write Error: {e}")))?;

        Ok(())
    }

    async fn put_stream(
        &self,
        path: &str,
        mut stream: BodyStream,
        _content_length: Option<u64>,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let mut writer = self
            .op
            .writer_with(path)
            .content_type(content_type)
            .await
            .map_err(|e| StorageError::Generic(format!("OpenDAL Writer Error: {e}")))?;

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let _ = writer.abort().await;
                    return Err(StorageError::Io(e));
                }
            };
            written += chunk.len() as u64;
            writer
                .write(chunk)
                .await
                .map_err(|e| StorageError::Generic(format!("OpenDAL Write Error: {e}")))?;
        }
        writer
            .close()
            .await
            .map_err(|e| StorageError::Generic(format!("OpenDAL Close Error: {e}")))?;

        Ok(written)
    }

    async fn get_stream(&self, path: &str) -> Result<ByteStream, StorageError> {
        let reader = self.op.reader(path).await.map_err(map_err(path))?;
        let stream = reader
            .into_bytes_stream(..)
            .await
            .map_err(map_err(path))?;
        Ok(Box::pin(stream.map_err(StorageError::Io)))
    }

    async fn stat(&self, path: &str) -> Result<ObjectMeta, StorageError> {
        let meta = self.op.stat(path).await.map_err(map_err(path))?;
        Ok(ObjectMeta {
            size: meta.content_length(),
            last_modified: None,
            etag: meta.etag().map(|tag| tag.trim_matches('"').to_string()),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.op
            .delete(path)
            .await
            .map_err(|e| StorageError::Generic(format!("OpenDAL Delete Error: {e}")))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..=idx],
            None => "/",
        };
        let entries = match self.op.list_with(dir).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Generic(format!("OpenDAL List Error: {e}"))),
        };

        let mut keys: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .map(|entry| entry.path().trim_start_matches('/').to_string())
            .filter(|key| key.starts_with(prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<Option<String>, StorageError> {
        match self.op.presign_read(path, ttl).await {
            Ok(request) => Ok(Some(request.uri().to_string())),
            Err(e) if e.kind() == ErrorKind::Unsupported => {
                debug!("Backend cannot presign, falling back to proxy downloads");
                Ok(None)
            }
            Err(e) => Err(StorageError::Generic(format!("OpenDAL Presign Error: {e}"))),
        }
    }

    fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::services::Memory;

    fn storage() -> OpendalStorage {
        let op = Operator::new(Memory::default()).unwrap().finish();
        OpendalStorage::new(op)
    }

    #[tokio::test]
    async fn round_trips_bytes() {
        let storage = storage();
        storage
            .put("roms/gb/tetris.gb", Bytes::from_static(b"tetris"), "application/octet-stream")
            .await
            .unwrap();

        assert_eq!(
            storage.read("roms/gb/tetris.gb").await.unwrap(),
            Bytes::from_static(b"tetris")
        );
        assert_eq!(storage.stat("roms/gb/tetris.gb").await.unwrap().size, 6);
    }

    #[tokio::test]
    async fn missing_keys_map_to_not_found() {
        let storage = storage();
        assert!(matches!(storage.stat("roms/gb/none.gb").await, Err(StorageError::NotFound(_))));
        assert!(!storage.exists("roms/gb/none.gb").await.unwrap());
    }

    #[tokio::test]
    async fn lists_by_prefix() {
        let storage = storage();
        for key in ["roms/gb/a.gb", "roms/gba/b.gba", "bios/gba/gba_bios.bin"] {
            storage.put(key, Bytes::from_static(b"x"), "").await.unwrap();
        }
        assert_eq!(
            storage.list("roms/gb/").await.unwrap(),
            vec!["roms/gb/a.gb".to_string()]
        );
        assert_eq!(storage.list("roms/").await.unwrap().len(), 2);
    }
}
