//! Digest and object-key derivation.
//!
//! The key layout is shared with data already sitting in buckets, so every
//! format string here is part of the storage contract:
//!
//! ```text
//! roms/{system}/{fileName}
//! roms/versions/{gameId}/{versionName}-{unixMillis}.rom
//! bios/{system}/{fileName}
//! save-states/{userId}/{gameId}/slot-{slot}.state
//! save-states/{userId}/{gameId}/slot-{slot}.png
//! covers/{gameId}.jpg
//! screenshots/{gameId}/{index}.jpg
//! ```

use crate::error::AssetError;
use crate::models::RecordId;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

/// Prefixes a bucket policy may expose for anonymous reads.
/// ROM, BIOS and save-state prefixes are never public.
pub const PUBLIC_PREFIXES: [&str; 2] = ["covers/", "screenshots/"];

pub fn is_public_key(key: &str) -> bool {
    PUBLIC_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// A save position, 1 to 10 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Slot(u8);

impl Slot {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, AssetError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(AssetError::InvalidSlot(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Slot {
    type Error = AssetError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Slot::new(value)
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> Self {
        slot.0
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Rejects names that would not stay a single key segment.
pub fn validate_file_name(name: &str) -> Result<(), AssetError> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(AssetError::InvalidFileName(name.to_string()));
    }
    Ok(())
}

/// Where an asset lives, before its bytes are known.
#[derive(Debug, Clone, Copy)]
pub enum AssetContext<'a> {
    Rom {
        system: &'a str,
        file_name: &'a str,
    },
    Version {
        game_id: RecordId,
        version_name: &'a str,
        unix_millis: i64,
    },
    Bios {
        system: &'a str,
        file_name: &'a str,
    },
    SaveState {
        user_id: &'a str,
        game_id: RecordId,
        slot: Slot,
    },
    SaveScreenshot {
        user_id: &'a str,
        game_id: RecordId,
        slot: Slot,
    },
    Cover {
        game_id: RecordId,
    },
    Screenshot {
        game_id: RecordId,
        index: u32,
    },
}

impl AssetContext<'_> {
    pub fn key(&self) -> String {
        match *self {
            AssetContext::Rom { system, file_name } => format!("roms/{system}/{file_name}"),
            AssetContext::Version {
                game_id,
                version_name,
                unix_millis,
            } => format!("roms/versions/{game_id}/{version_name}-{unix_millis}.rom"),
            AssetContext::Bios { system, file_name } => format!("bios/{system}/{file_name}"),
            AssetContext::SaveState {
                user_id,
                game_id,
                slot,
            } => format!("save-states/{user_id}/{game_id}/slot-{slot}.state"),
            AssetContext::SaveScreenshot {
                user_id,
                game_id,
                slot,
            } => format!("save-states/{user_id}/{game_id}/slot-{slot}.png"),
            AssetContext::Cover { game_id } => format!("covers/{game_id}.jpg"),
            AssetContext::Screenshot { game_id, index } => {
                format!("screenshots/{game_id}/{index}.jpg")
            }
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AssetContext::SaveScreenshot { .. } => "image/png",
            AssetContext::Cover { .. } | AssetContext::Screenshot { .. } => "image/jpeg",
            _ => "application/octet-stream",
        }
    }
}

/// Digest, key and length of a buffer about to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub key: String,
    pub md5: String,
    pub size: u64,
}

pub fn fingerprint(data: &[u8], context: &AssetContext<'_>) -> Fingerprint {
    Fingerprint {
        key: context.key(),
        md5: md5_hex(data),
        size: data.len() as u64,
    }
}
