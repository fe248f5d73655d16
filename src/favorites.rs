//! Favorite actions and per-action usage counters.
//!
//! Ranking ties are broken by the order in which the actions were favorited,
//! earliest first. Un-favoriting and re-favoriting moves an action to the end
//! of that order; its usage count is kept.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::ActionType;

/// Number of shortcuts returned by the quick-actions view by default.
pub const DEFAULT_TOP_LIMIT: usize = 5;

/// One ranked quick-action shortcut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteAction {
    pub id: ActionType,
    pub label: String,
    pub usage_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredFavorites")]
pub struct FavoritesRanking {
    /// Insertion-ordered set.
    favorites: Vec<ActionType>,
    usage: BTreeMap<ActionType, u64>,
}

/// Persisted form of [`FavoritesRanking`]. Ids are decoded one by one so an
/// action id this build does not know drops only that id.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredFavorites {
    #[serde(default)]
    favorites: Vec<String>,
    #[serde(default)]
    usage: BTreeMap<String, u64>,
}

impl From<StoredFavorites> for FavoritesRanking {
    fn from(raw: StoredFavorites) -> Self {
        let mut ranking = Self::new();
        for id in &raw.favorites {
            match id.parse::<ActionType>() {
                Ok(action) if !ranking.favorites.contains(&action) => ranking.favorites.push(action),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "skipping persisted favorite"),
            }
        }
        for (id, count) in raw.usage {
            match id.parse::<ActionType>() {
                Ok(action) => {
                    ranking.usage.insert(action, count);
                }
                Err(e) => tracing::warn!(error = %e, "skipping persisted usage count"),
            }
        }
        ranking
    }
}

impl FavoritesRanking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `action`. Returns whether it is now a favorite.
    pub fn toggle_favorite(&mut self, action: ActionType) -> bool {
        if let Some(pos) = self.favorites.iter().position(|a| *a == action) {
            self.favorites.remove(pos);
            false
        } else {
            self.favorites.push(action);
            true
        }
    }

    pub fn is_favorite(&self, action: ActionType) -> bool {
        self.favorites.contains(&action)
    }

    /// Favorited actions in the order they were favorited.
    pub fn favorites(&self) -> &[ActionType] {
        &self.favorites
    }

    /// Count one invocation of `action` and return the new total.
    pub fn increment_usage(&mut self, action: ActionType) -> u64 {
        let count = self.usage.entry(action).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Invocations recorded for `action`; 0 if never used.
    pub fn usage_count(&self, action: ActionType) -> u64 {
        self.usage.get(&action).copied().unwrap_or(0)
    }

    /// Up to `limit` favorites ranked by descending usage.
    pub fn most_used(&self, limit: usize) -> Vec<FavoriteAction> {
        let mut ranked: Vec<FavoriteAction> = self
            .favorites
            .iter()
            .map(|&id| FavoriteAction {
                id,
                label: id.label().to_string(),
                usage_count: self.usage_count(id),
            })
            .collect();
        // Stable sort keeps favorite order among equal counts.
        ranked.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        ranked.truncate(limit);
        ranked
    }
}
