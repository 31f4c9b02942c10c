use romvault_core::prelude::*;
use tracing::warn;

/// First half of a two-phase delete: remove the object, reporting but never
/// propagating failure. The caller deletes the record afterwards regardless.
pub(crate) async fn remove_object<S: StorageBackend>(storage: &S, key: &str) -> Result<(), AssetError> {
    storage
        .delete(key)
        .await
        .map_err(|source| AssetError::StorageCleanupFailure {
            key: key.to_string(),
            source,
        })
}

pub(crate) async fn remove_objects<S, I>(storage: &S, keys: I)
where
    S: StorageBackend,
    I: IntoIterator<Item = String>,
{
    for key in keys {
        if let Err(err) = remove_object(storage, &key).await {
            log_cleanup_failure(&err);
        }
    }
}

pub(crate) fn log_cleanup_failure(err: &AssetError) {
    match err {
        AssetError::StorageCleanupFailure { key, source } => {
            warn!(key = %key, error = %source, "object left behind after record delete");
        }
        other => warn!(error = %other, "object cleanup failed"),
    }
}
