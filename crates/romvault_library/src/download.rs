use romvault_core::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a client should fetch an asset's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DownloadReference {
    /// Direct, time-limited object-store URL.
    #[serde(rename_all = "camelCase")]
    Signed { url: String, expires_in: u64 },
    /// Route on this service that streams the object through.
    Proxy { url: String },
}

impl DownloadReference {
    pub fn url(&self) -> &str {
        match self {
            DownloadReference::Signed { url, .. } | DownloadReference::Proxy { url } => url,
        }
    }
}

/// Bytes being streamed to a caller.
pub struct AssetDownload {
    pub file_name: String,
    pub size: u64,
    pub md5: Option<String>,
    pub stream: ByteStream,
}

impl std::fmt::Debug for AssetDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetDownload")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .field("md5", &self.md5)
            .finish_non_exhaustive()
    }
}

pub(crate) async fn reference_for<S: StorageBackend>(
    storage: &S,
    config: &DownloadConfig,
    asset: AssetRef,
    key: &str,
) -> Result<DownloadReference, AssetError> {
    let proxy = || DownloadReference::Proxy {
        url: format!(
            "{}{}",
            config.proxy_base_url.trim_end_matches('/'),
            asset.proxy_path()
        ),
    };

    match config.policy() {
        DownloadPolicy::Proxy { .. } => Ok(proxy()),
        DownloadPolicy::Signed { ttl } => {
            let signed = storage
                .signed_url(key, ttl)
                .await
                .map_err(AssetError::storage("signing a download URL"))?;
            match signed {
                Some(url) => Ok(DownloadReference::Signed {
                    url,
                    expires_in: ttl.as_secs(),
                }),
                None => {
                    debug!(%asset, "backend cannot sign, using proxy route");
                    Ok(proxy())
                }
            }
        }
    }
}
