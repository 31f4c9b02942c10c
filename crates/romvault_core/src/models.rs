use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Primary key assigned by the record store.
pub type RecordId = i64;

/// A catalog entry and its primary ROM image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub id: RecordId,
    pub title: String,
    pub system: String,
    pub file_name: String,

    /// Object-store key of the primary ROM, e.g. `roms/nes/zelda.nes`.
    pub path: String,

    /// Lowercase hex MD5 of the uploaded bytes.
    pub md5_hash: String,
    pub file_size: u64,

    pub region: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
    pub cover_path: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    pub title: String,
    pub system: String,
    pub file_name: String,
    pub path: String,
    pub md5_hash: String,
    pub file_size: u64,
    pub region: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
}

/// Metadata-only changes. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameUpdate {
    pub title: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub genre: Option<String>,
    pub release_year: Option<i32>,
    /// Written by cover uploads. `AssetLifecycle::update_game` ignores it.
    pub cover_path: Option<String>,
}

impl GameUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.region.is_none()
            && self.description.is_none()
            && self.developer.is_none()
            && self.publisher.is_none()
            && self.genre.is_none()
            && self.release_year.is_none()
            && self.cover_path.is_none()
    }
}

/// The projection the duplicate detector works on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: RecordId,
    pub title: String,
    pub system: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Game> for GameSummary {
    fn from(game: &Game) -> Self {
        Self {
            id: game.id,
            title: game.title.clone(),
            system: game.system.clone(),
            created_at: game.created_at,
        }
    }
}

/// A regional or revision variant of a game, stored independently of the primary ROM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameVersion {
    pub id: RecordId,
    pub game_id: RecordId,
    pub name: String,
    pub region: String,
    pub revision: Option<String>,
    pub rom_path: String,
    pub md5_hash: String,
    pub file_size: u64,
    pub is_preferred: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameVersion {
    pub game_id: RecordId,
    pub name: String,
    pub region: String,
    pub revision: Option<String>,
    pub rom_path: String,
    pub md5_hash: String,
    pub file_size: u64,
    pub is_preferred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiosFile {
    pub id: RecordId,
    pub system: String,
    pub file_name: String,
    pub path: String,
    pub md5_hash: String,
    pub file_size: u64,
    pub description: Option<String>,
    pub required: bool,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBiosFile {
    pub system: String,
    pub file_name: String,
    pub path: String,
    pub md5_hash: String,
    pub file_size: u64,
    pub description: Option<String>,
    pub required: bool,
}

/// One occupied save slot. Unique on `(user_id, game_id, slot)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub id: RecordId,
    pub user_id: String,
    pub game_id: RecordId,
    pub slot: u8,
    pub path: String,
    pub screenshot_path: Option<String>,
    pub description: Option<String>,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSaveState {
    pub user_id: String,
    pub game_id: RecordId,
    pub slot: u8,
    pub path: String,
    pub screenshot_path: Option<String>,
    pub description: Option<String>,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: RecordId,
    pub game_id: RecordId,
    pub index: u32,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

/// Identifies a downloadable asset by record type and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum AssetRef {
    Game(RecordId),
    Version(RecordId),
    Bios(RecordId),
}

impl AssetRef {
    pub fn id(&self) -> RecordId {
        match *self {
            AssetRef::Game(id) | AssetRef::Version(id) | AssetRef::Bios(id) => id,
        }
    }

    /// Path segment of the proxy route serving this asset.
    pub fn resource(&self) -> &'static str {
        match self {
            AssetRef::Game(_) => "games",
            AssetRef::Version(_) => "versions",
            AssetRef::Bios(_) => "bios",
        }
    }

    /// Stable proxy path, e.g. `/games/3/rom` or `/bios/9/download`.
    pub fn proxy_path(&self) -> String {
        let action = match self {
            AssetRef::Game(_) | AssetRef::Version(_) => "rom",
            AssetRef::Bios(_) => "download",
        };
        format!("/{}/{}/{action}", self.resource(), self.id())
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetRef::Game(id) => write!(f, "Game {id}"),
            AssetRef::Version(id) => write!(f, "Game version {id}"),
            AssetRef::Bios(id) => write!(f, "BIOS file {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_paths_follow_route_layout() {
        assert_eq!(AssetRef::Game(3).proxy_path(), "/games/3/rom");
        assert_eq!(AssetRef::Version(12).proxy_path(), "/versions/12/rom");
        assert_eq!(AssetRef::Bios(9).proxy_path(), "/bios/9/download");
    }

    #[test]
    fn records_serialize_with_camel_case_fields() {
        let version = GameVersion {
            id: 1,
            game_id: 2,
            name: "USA".into(),
            region: "USA".into(),
            revision: None,
            rom_path: "roms/versions/2/USA-1.rom".into(),
            md5_hash: "d41d8cd98f00b204e9800998ecf8427e".into(),
            file_size: 0,
            is_preferred: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&version).unwrap();
        assert_eq!(json["isPreferred"], true);
        assert_eq!(json["romPath"], "roms/versions/2/USA-1.rom");
        assert_eq!(json["md5Hash"], "d41d8cd98f00b204e9800998ecf8427e");
    }
}
