use romvault_core::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How titles are compared when grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TitleMatch {
    /// Lowercase only. "Zelda" and "zelda " are different titles.
    #[default]
    CaseOnly,
    /// Lowercase, trimmed, inner whitespace collapsed.
    Normalized,
}

impl TitleMatch {
    fn key(self, title: &str) -> String {
        match self {
            TitleMatch::CaseOnly => title.to_lowercase(),
            TitleMatch::Normalized => title
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    /// The matched title, as normalized for comparison.
    pub title: String,
    pub system: String,
    /// Oldest first.
    pub games: Vec<GameSummary>,
}

/// Read-only grouping of games that look like the same title on the same system.
/// Never touches object storage.
#[derive(Clone)]
pub struct DuplicateDetector<R: RecordStore> {
    store: R,
    mode: TitleMatch,
}

impl<R: RecordStore> DuplicateDetector<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            mode: TitleMatch::default(),
        }
    }

    pub fn with_mode(mut self, mode: TitleMatch) -> Self {
        self.mode = mode;
        self
    }

    pub async fn find_duplicates(&self) -> Result<Vec<DuplicateGroup>, AssetError> {
        let games = self.store.game_summaries().await?;
        Ok(group(games, self.mode))
    }
}

fn group(games: Vec<GameSummary>, mode: TitleMatch) -> Vec<DuplicateGroup> {
    let mut groups: BTreeMap<(String, String), Vec<GameSummary>> = BTreeMap::new();
    for game in games {
        groups
            .entry((mode.key(&game.title), game.system.clone()))
            .or_default()
            .push(game);
    }

    groups
        .into_iter()
        .filter(|(_, games)| games.len() > 1)
        .map(|((title, system), mut games)| {
            games.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            DuplicateGroup {
                title,
                system,
                games,
            }
        })
        .collect()
}
