use aws_sdk_s3::Client;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use romvault_core::prelude::*;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, instrument};

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
    public_base_url: Option<String>,
}

impl S3Storage {
    pub fn new(client: Client, bucket: String, prefix: Option<String>) -> Self {
        Self {
            client,
            bucket,
            prefix: prefix.unwrap_or_default(),
            public_base_url: None,
        }
    }

    /// Base URL of the bucket as seen by browsers, used for `covers/` and `screenshots/`.
    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    fn key(&self, path: &str) -> String {
        self.prefix
            .is_empty()
            .then(|| path.to_string())
            .unwrap_or(format!("{}{path}", self.prefix))
    }

    fn strip_prefix(&self, key: &str) -> String {
        key.strip_prefix(self.prefix.as_str())
            .unwrap_or(key)
            .to_string()
    }
}

impl StorageBackend for S3Storage {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key, size = data.len()))]
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        let key = self.key(path);
        tracing::Span::current().record("key", &key);

        debug!("Uploading object to S3...");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(S3ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload object: {e:?}");
                StorageError::Generic(format!("S3 Upload Error: {e:?}"))
            })?;

        debug!("Upload successful");
        Ok(())
    }

    async fn put_stream(
        &self,
        path: &str,
        stream: BodyStream,
        _content_length: Option<u64>,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        // TODO: switch to multipart upload so large disc images are not buffered.
        let chunks: Vec<Bytes> = stream.try_collect().await?;
        let data = Bytes::from(chunks.concat());
        let size = data.len() as u64;
        self.put(path, data, content_type).await?;
        Ok(size)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key))]
    async fn get_stream(&self, path: &str) -> Result<ByteStream, StorageError> {
        let key = self.key(path);
        tracing::Span::current().record("key", &key);

        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match res {
            Ok(output) => {
                let reader = ReaderStream::new(output.body.into_async_read());
                Ok(Box::pin(reader.map_err(StorageError::Io)))
            }
            Err(SdkError::ServiceError(err)) => {
                let inner = err.err();
                if inner.is_no_such_key() {
                    debug!("Object not found in S3");
                    Err(StorageError::NotFound(path.to_string()))
                } else {
                    error!("S3 Service Error during read: {:?}", err);
                    Err(StorageError::Generic(format!(
                        "S3 Service Error: {:?}",
                        inner
                    )))
                }
            }
            Err(e) => {
                error!("Unexpected S3 Error: {:?}", e);
                Err(StorageError::Generic(format!("S3 Error: {:?}", e)))
            }
        }
    }

    async fn stat(&self, path: &str) -> Result<ObjectMeta, StorageError> {
        let key = self.key(path);
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match res {
            Ok(output) => Ok(ObjectMeta {
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: output
                    .last_modified()
                    .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())),
                etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
            }),
            Err(SdkError::ServiceError(err)) => err
                .err()
                .is_not_found()
                .then(|| Err(StorageError::NotFound(path.to_string())))
                .unwrap_or_else(|| {
                    error!("S3 Head Object Error: {:?}", err);
                    Err(StorageError::Generic(format!(
                        "S3 Service Error: {:?}",
                        err
                    )))
                }),
            Err(e) => Err(StorageError::Generic(format!("S3 Error: {e}"))),
        }
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to delete object: {e:?}");
                StorageError::Generic(format!("S3 Delete Error: {e:?}"))
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let full_prefix = self.key(prefix);
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let output = request
                .send()
                .await
                .map_err(|e| StorageError::Generic(format!("S3 List Error: {e:?}")))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .map(|k| self.strip_prefix(k)),
            );

            if output.is_truncated() == Some(true) {
                continuation_token = output.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn signed_url(&self, path: &str, ttl: Duration) -> Result<Option<String>, StorageError> {
        let config = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Generic(format!("Invalid presign TTL: {e}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .presigned(config)
            .await
            .map_err(|e| {
                error!("Failed to presign object: {e:?}");
                StorageError::Generic(format!("S3 Presign Error: {e:?}"))
            })?;

        Ok(Some(request.uri().to_string()))
    }

    fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}
