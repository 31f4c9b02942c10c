use chrono::Utc;
use romvault_core::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Tables {
    last_id: RecordId,
    games: BTreeMap<RecordId, Game>,
    versions: BTreeMap<RecordId, GameVersion>,
    bios: BTreeMap<RecordId, BiosFile>,
    saves: BTreeMap<RecordId, SaveState>,
    screenshots: BTreeMap<RecordId, Screenshot>,
}

impl Tables {
    fn next_id(&mut self) -> RecordId {
        self.last_id += 1;
        self.last_id
    }

    fn require_game(&self, id: RecordId) -> Result<&Game, RecordError> {
        self.games
            .get(&id)
            .ok_or_else(|| RecordError::NotFound(format!("Game {id}")))
    }
}

#[derive(Clone, Default)]
pub struct MemoryRecords {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, RecordError>) -> Result<T, RecordError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| RecordError::Backend("record tables lock poisoned".into()))?;
        f(&mut tables)
    }
}

impl RecordStore for MemoryRecords {
    async fn insert_game(&self, game: NewGame) -> Result<Game, RecordError> {
        self.with(|t| {
            if t.games.values().any(|g| g.path == game.path) {
                return Err(RecordError::Conflict(game.path));
            }
            let now = Utc::now();
            let record = Game {
                id: t.next_id(),
                title: game.title,
                system: game.system,
                file_name: game.file_name,
                path: game.path,
                md5_hash: game.md5_hash,
                file_size: game.file_size,
                region: game.region,
                description: game.description,
                developer: game.developer,
                publisher: game.publisher,
                genre: game.genre,
                release_year: game.release_year,
                cover_path: None,
                created_at: now,
                updated_at: now,
            };
            t.games.insert(record.id, record.clone());
            Ok(record)
        })
    }

    async fn game(&self, id: RecordId) -> Result<Option<Game>, RecordError> {
        self.with(|t| Ok(t.games.get(&id).cloned()))
    }

    async fn game_by_path(&self, path: &str) -> Result<Option<Game>, RecordError> {
        self.with(|t| Ok(t.games.values().find(|g| g.path == path).cloned()))
    }

    async fn update_game(&self, id: RecordId, update: GameUpdate) -> Result<Game, RecordError> {
        self.with(|t| {
            let game = t
                .games
                .get_mut(&id)
                .ok_or_else(|| RecordError::NotFound(format!("Game {id}")))?;
            let GameUpdate {
                title,
                region,
                description,
                developer,
                publisher,
                genre,
                release_year,
                cover_path,
            } = update;
            if let Some(title) = title {
                game.title = title;
            }
            if region.is_some() {
                game.region = region;
            }
            if description.is_some() {
                game.description = description;
            }
            if developer.is_some() {
                game.developer = developer;
            }
            if publisher.is_some() {
                game.publisher = publisher;
            }
            if genre.is_some() {
                game.genre = genre;
            }
            if release_year.is_some() {
                game.release_year = release_year;
            }
            if cover_path.is_some() {
                game.cover_path = cover_path;
            }
            game.updated_at = Utc::now();
            Ok(game.clone())
        })
    }

    async fn delete_game(&self, id: RecordId) -> Result<(), RecordError> {
        self.with(|t| {
            t.games
                .remove(&id)
                .ok_or_else(|| RecordError::NotFound(format!("Game {id}")))?;
            t.versions.retain(|_, v| v.game_id != id);
            t.screenshots.retain(|_, s| s.game_id != id);
            t.saves.retain(|_, s| s.game_id != id);
            Ok(())
        })
    }

    async fn game_summaries(&self) -> Result<Vec<GameSummary>, RecordError> {
        self.with(|t| Ok(t.games.values().map(GameSummary::from).collect()))
    }

    async fn insert_version(&self, version: NewGameVersion) -> Result<GameVersion, RecordError> {
        self.with(|t| {
            t.require_game(version.game_id)?;
            if version.is_preferred {
                for other in t.versions.values_mut() {
                    if other.game_id == version.game_id {
                        other.is_preferred = false;
                    }
                }
            }
            let record = GameVersion {
                id: t.next_id(),
                game_id: version.game_id,
                name: version.name,
                region: version.region,
                revision: version.revision,
                rom_path: version.rom_path,
                md5_hash: version.md5_hash,
                file_size: version.file_size,
                is_preferred: version.is_preferred,
                created_at: Utc::now(),
            };
            t.versions.insert(record.id, record.clone());
            Ok(record)
        })
    }

    async fn version(&self, id: RecordId) -> Result<Option<GameVersion>, RecordError> {
        self.with(|t| Ok(t.versions.get(&id).cloned()))
    }

    async fn versions(&self, game_id: RecordId) -> Result<Vec<GameVersion>, RecordError> {
        self.with(|t| {
            Ok(t.versions
                .values()
                .filter(|v| v.game_id == game_id)
                .cloned()
                .collect())
        })
    }

    async fn set_preferred_version(
        &self,
        game_id: RecordId,
        version_id: RecordId,
    ) -> Result<GameVersion, RecordError> {
        self.with(|t| {
            match t.versions.get(&version_id) {
                Some(v) if v.game_id == game_id => {}
                _ => {
                    return Err(RecordError::NotFound(format!(
                        "Game version {version_id} of game {game_id}"
                    )));
                }
            }
            for version in t.versions.values_mut() {
                if version.game_id == game_id {
                    version.is_preferred = version.id == version_id;
                }
            }
            t.versions
                .get(&version_id)
                .cloned()
                .ok_or_else(|| RecordError::NotFound(format!("Game version {version_id}")))
        })
    }

    async fn delete_version(&self, id: RecordId) -> Result<(), RecordError> {
        self.with(|t| {
            t.versions
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| RecordError::NotFound(format!("Game version {id}")))
        })
    }

    async fn insert_bios(&self, bios: NewBiosFile) -> Result<BiosFile, RecordError> {
        self.with(|t| {
            if t
                .bios
                .values()
                .any(|b| b.system == bios.system && b.file_name == bios.file_name)
            {
                return Err(RecordError::Conflict(format!(
                    "BIOS {} for {}",
                    bios.file_name, bios.system
                )));
            }
            let record = BiosFile {
                id: t.next_id(),
                system: bios.system,
                file_name: bios.file_name,
                path: bios.path,
                md5_hash: bios.md5_hash,
                file_size: bios.file_size,
                description: bios.description,
                required: bios.required,
                verified: false,
                created_at: Utc::now(),
            };
            t.bios.insert(record.id, record.clone());
            Ok(record)
        })
    }

    async fn bios(&self, id: RecordId) -> Result<Option<BiosFile>, RecordError> {
        self.with(|t| Ok(t.bios.get(&id).cloned()))
    }

    async fn bios_by_name(
        &self,
        system: &str,
        file_name: &str,
    ) -> Result<Option<BiosFile>, RecordError> {
        self.with(|t| {
            Ok(t.bios
                .values()
                .find(|b| b.system == system && b.file_name == file_name)
                .cloned())
        })
    }

    async fn bios_files(&self, system: Option<&str>) -> Result<Vec<BiosFile>, RecordError> {
        self.with(|t| {
            Ok(t.bios
                .values()
                .filter(|b| system.is_none_or(|s| b.system == s))
                .cloned()
                .collect())
        })
    }

    async fn set_bios_verified(&self, id: RecordId, verified: bool) -> Result<BiosFile, RecordError> {
        self.with(|t| {
            let bios = t
                .bios
                .get_mut(&id)
                .ok_or_else(|| RecordError::NotFound(format!("BIOS file {id}")))?;
            bios.verified = verified;
            Ok(bios.clone())
        })
    }

    async fn delete_bios(&self, id: RecordId) -> Result<(), RecordError> {
        self.with(|t| {
            t.bios
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| RecordError::NotFound(format!("BIOS file {id}")))
        })
    }

    async fn upsert_save_state(&self, save: NewSaveState) -> Result<SaveState, RecordError> {
        self.with(|t| {
            t.require_game(save.game_id)?;
            let now = Utc::now();
            let existing = t.saves.values_mut().find(|s| {
                s.user_id == save.user_id && s.game_id == save.game_id && s.slot == save.slot
            });
            if let Some(current) = existing {
                current.path = save.path;
                current.screenshot_path = save.screenshot_path;
                current.description = save.description;
                current.file_size = save.file_size;
                current.updated_at = now;
                return Ok(current.clone());
            }
            let record = SaveState {
                id: t.next_id(),
                user_id: save.user_id,
                game_id: save.game_id,
                slot: save.slot,
                path: save.path,
                screenshot_path: save.screenshot_path,
                description: save.description,
                file_size: save.file_size,
                created_at: now,
                updated_at: now,
            };
            t.saves.insert(record.id, record.clone());
            Ok(record)
        })
    }

    async fn save_state(&self, id: RecordId) -> Result<Option<SaveState>, RecordError> {
        self.with(|t| Ok(t.saves.get(&id).cloned()))
    }

    async fn save_states(
        &self,
        user_id: &str,
        game_id: Option<RecordId>,
    ) -> Result<Vec<SaveState>, RecordError> {
        self.with(|t| {
            let mut saves: Vec<SaveState> = t
                .saves
                .values()
                .filter(|s| s.user_id == user_id && game_id.is_none_or(|g| s.game_id == g))
                .cloned()
                .collect();
            saves.sort_by_key(|s| (s.game_id, s.slot));
            Ok(saves)
        })
    }

    async fn delete_save_state(&self, id: RecordId) -> Result<(), RecordError> {
        self.with(|t| {
            t.saves
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| RecordError::NotFound(format!("Save state {id}")))
        })
    }

    async fn insert_screenshot(
        &self,
        game_id: RecordId,
        path: String,
    ) -> Result<Screenshot, RecordError> {
        self.with(|t| {
            t.require_game(game_id)?;
            let index = t
                .screenshots
                .values()
                .filter(|s| s.game_id == game_id)
                .count() as u32;
            let record = Screenshot {
                id: t.next_id(),
                game_id,
                index,
                path,
                created_at: Utc::now(),
            };
            t.screenshots.insert(record.id, record.clone());
            Ok(record)
        })
    }

    async fn screenshots(&self, game_id: RecordId) -> Result<Vec<Screenshot>, RecordError> {
        self.with(|t| {
            let mut shots: Vec<Screenshot> = t
                .screenshots
                .values()
                .filter(|s| s.game_id == game_id)
                .cloned()
                .collect();
            shots.sort_by_key(|s| s.index);
            Ok(shots)
        })
    }

    async fn referenced_paths(&self) -> Result<HashSet<String>, RecordError> {
        self.with(|t| {
            let games = t
                .games
                .values()
                .flat_map(|g| std::iter::once(g.path.clone()).chain(g.cover_path.clone()));
            let versions = t.versions.values().map(|v| v.rom_path.clone());
            let bios = t.bios.values().map(|b| b.path.clone());
            let saves = t
                .saves
                .values()
                .flat_map(|s| std::iter::once(s.path.clone()).chain(s.screenshot_path.clone()));
            let shots = t.screenshots.values().map(|s| s.path.clone());
            Ok(games
                .chain(versions)
                .chain(bios)
                .chain(saves)
                .chain(shots)
                .collect())
        })
    }
}
