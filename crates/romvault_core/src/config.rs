use crate::systems::{DEFAULT_SYSTEMS, SystemRegistry};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// System ids accepted on upload.
    ///
    /// Defaults to [`DEFAULT_SYSTEMS`].
    pub supported_systems: Vec<String>,
    pub download: DownloadConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            supported_systems: DEFAULT_SYSTEMS.iter().map(|s| s.to_string()).collect(),
            download: DownloadConfig::default(),
        }
    }
}

impl LibraryConfig {
    pub fn registry(&self) -> SystemRegistry {
        SystemRegistry::new(&self.supported_systems)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    /// Proxy when the public and internal storage addresses differ, sign otherwise.
    #[default]
    Auto,
    /// Sign unless an external override is configured, which always proxies.
    Signed,
    Proxy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub mode: DownloadMode,

    /// Lifetime of presigned URLs.
    ///
    /// Defaults to one hour.
    pub signed_url_ttl_secs: u64,

    /// Prepended to proxy paths. Empty yields relative paths such as `/bios/3/download`.
    pub proxy_base_url: String,

    /// Address the storage client was configured with, e.g. `http://minio:9000`.
    pub internal_endpoint: Option<String>,

    /// Address clients outside the deployment reach storage on.
    pub public_endpoint: Option<String>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            mode: DownloadMode::Auto,
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            proxy_base_url: String::new(),
            internal_endpoint: None,
            public_endpoint: None,
        }
    }
}

/// The download strategy fixed at deployment time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadPolicy {
    Signed { ttl: Duration },
    Proxy { base_url: String },
}

impl DownloadConfig {
    /// True when an external override points somewhere other than the internal client.
    pub fn endpoints_differ(&self) -> bool {
        match (&self.public_endpoint, &self.internal_endpoint) {
            (Some(public), Some(internal)) => normalize(public) != normalize(internal),
            (Some(_), None) => true,
            _ => false,
        }
    }

    /// A differing public endpoint forces proxying in every mode, since a URL
    /// signed against the internal host is unusable from outside.
    pub fn policy(&self) -> DownloadPolicy {
        let proxy = || DownloadPolicy::Proxy {
            base_url: self.proxy_base_url.trim_end_matches('/').to_string(),
        };
        let signed = || DownloadPolicy::Signed {
            ttl: Duration::from_secs(self.signed_url_ttl_secs),
        };
        match self.mode {
            DownloadMode::Proxy => proxy(),
            _ if self.endpoints_differ() => proxy(),
            DownloadMode::Signed | DownloadMode::Auto => signed(),
        }
    }
}

fn normalize(endpoint: &str) -> String {
    endpoint.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_signs_when_no_override_is_configured() {
        let config = DownloadConfig::default();
        assert_eq!(
            config.policy(),
            DownloadPolicy::Signed {
                ttl: Duration::from_secs(3600)
            }
        );
    }

    #[test]
    fn auto_proxies_when_public_endpoint_differs() {
        let config = DownloadConfig {
            internal_endpoint: Some("http://minio:9000".into()),
            public_endpoint: Some("https://cdn.example.com".into()),
            proxy_base_url: "https://games.example.com/api/".into(),
            ..Default::default()
        };
        assert_eq!(
            config.policy(),
            DownloadPolicy::Proxy {
                base_url: "https://games.example.com/api".into()
            }
        );
    }

    #[test]
    fn auto_signs_when_endpoints_only_differ_in_formatting() {
        let config = DownloadConfig {
            internal_endpoint: Some("http://MinIO:9000/".into()),
            public_endpoint: Some("http://minio:9000".into()),
            ..Default::default()
        };
        assert!(!config.endpoints_differ());
        assert!(matches!(config.policy(), DownloadPolicy::Signed { .. }));
    }

    #[test]
    fn signed_mode_still_proxies_behind_a_public_override() {
        let config = DownloadConfig {
            mode: DownloadMode::Signed,
            signed_url_ttl_secs: 60,
            internal_endpoint: Some("http://minio:9000".into()),
            public_endpoint: Some("https://storage.example.com".into()),
            ..Default::default()
        };
        assert_eq!(
            config.policy(),
            DownloadPolicy::Proxy {
                base_url: String::new()
            }
        );
    }

    #[test]
    fn explicit_modes_apply_without_an_override() {
        let config = DownloadConfig {
            mode: DownloadMode::Signed,
            signed_url_ttl_secs: 60,
            ..Default::default()
        };
        assert_eq!(
            config.policy(),
            DownloadPolicy::Signed {
                ttl: Duration::from_secs(60)
            }
        );

        let config = DownloadConfig {
            mode: DownloadMode::Proxy,
            ..Default::default()
        };
        assert_eq!(
            config.policy(),
            DownloadPolicy::Proxy {
                base_url: String::new()
            }
        );
    }

    #[test]
    fn deserializes_partial_config() {
        let config: LibraryConfig =
            serde_json::from_str(r#"{"download": {"mode": "proxy"}}"#).unwrap();
        assert_eq!(config.download.mode, DownloadMode::Proxy);
        assert_eq!(config.download.signed_url_ttl_secs, 3600);
        assert!(config.registry().contains("nes"));
    }
}
