//! The action store: ledger, favorites and templates behind one handle.
//!
//! Construct one per session and pass it to every consumer. Each mutation
//! writes the affected collection to the optional [`KvStore`] afterwards.
//! Persistence is best effort: failures are logged and never returned to the
//! caller, and a store whose backend fails keeps working in memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::action::{ActionHistoryEntry, ActionType, NewActionEntry};
use crate::config::AppConfig;
use crate::favorites::{FavoriteAction, FavoritesRanking};
use crate::ledger::{ActionLedger, ActionSummary};
use crate::persist::{KvStore, PersistError};
use crate::templates::{
    MessageTemplate, NewTemplate, RenderedTemplate, TemplateCategory, TemplateError,
    TemplateLibrary, TemplatePlatform, TemplateUpdate,
};

pub const HISTORY_KEY: &str = "action_history";
pub const FAVORITES_KEY: &str = "favorite_actions";
pub const TEMPLATES_KEY: &str = "message_templates";

/// Sizing knobs taken from [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_entries: usize,
    pub recent_limit: usize,
    pub top_limit: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for StoreLimits {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            max_entries: cfg.ledger.max_entries,
            recent_limit: cfg.ledger.recent_limit,
            top_limit: cfg.favorites.top_limit,
        }
    }
}

pub struct ActionStore {
    ledger: ActionLedger,
    favorites: FavoritesRanking,
    templates: TemplateLibrary,
    limits: StoreLimits,
    backend: Option<Arc<dyn KvStore>>,
}

impl ActionStore {
    /// A store with no persistence.
    pub fn in_memory(limits: StoreLimits) -> Self {
        Self {
            ledger: ActionLedger::new(limits.max_entries),
            favorites: FavoritesRanking::new(),
            templates: TemplateLibrary::new(),
            limits,
            backend: None,
        }
    }

    /// Load persisted state from `backend`. Missing or unreadable collections
    /// start empty.
    pub fn open(backend: Arc<dyn KvStore>, limits: StoreLimits) -> Self {
        let history: Vec<ActionHistoryEntry> = load_or_default(backend.as_ref(), HISTORY_KEY);
        let favorites: FavoritesRanking = load_or_default(backend.as_ref(), FAVORITES_KEY);
        let templates: TemplateLibrary = load_or_default(backend.as_ref(), TEMPLATES_KEY);

        let ledger = ActionLedger::from_entries(history, limits.max_entries);
        tracing::info!(
            history = ledger.len(),
            favorites = favorites.favorites().len(),
            templates = templates.len(),
            "action store loaded"
        );

        Self {
            ledger,
            favorites,
            templates,
            limits,
            backend: Some(backend),
        }
    }

    pub fn limits(&self) -> StoreLimits {
        self.limits
    }

    pub fn is_persistent(&self) -> bool {
        self.backend.is_some()
    }

    // -- ledger -------------------------------------------------------------

    /// Append an entry to the ledger.
    pub fn add_entry(&mut self, entry: NewActionEntry) -> ActionHistoryEntry {
        let added = self.ledger.add_entry(entry).clone();
        self.persist_history();
        added
    }

    /// Record one invocation from the actions panel: counts the use of the
    /// action (whatever the outcome) and appends it to the ledger.
    pub fn record_action(&mut self, entry: NewActionEntry) -> ActionHistoryEntry {
        let usage = self.favorites.increment_usage(entry.action_type);
        let added = self.ledger.add_entry(entry).clone();
        tracing::info!(
            product_id = %added.product_id(),
            action = %added.action_type(),
            success = added.success(),
            usage,
            "action recorded"
        );
        self.persist_favorites();
        self.persist_history();
        added
    }

    /// Entries for `product_id`, most recent first.
    pub fn history_by_product(&self, product_id: &str) -> Vec<ActionHistoryEntry> {
        self.ledger.history_by_product(product_id).cloned().collect()
    }

    /// Most recent entries; `None` uses the configured default.
    pub fn recent_history(&self, limit: Option<usize>) -> Vec<ActionHistoryEntry> {
        let limit = limit.unwrap_or(self.limits.recent_limit);
        self.ledger.recent_history(Some(limit)).into_iter().cloned().collect()
    }

    pub fn clear_history(&mut self) {
        self.ledger.clear();
        tracing::info!("action history cleared");
        self.persist_history();
    }

    pub fn history_len(&self) -> usize {
        self.ledger.len()
    }

    pub fn success_rate(&self, product_id: Option<&str>) -> Option<f64> {
        self.ledger.success_rate(product_id)
    }

    pub fn count_by_action(&self) -> BTreeMap<ActionType, ActionSummary> {
        self.ledger.count_by_action()
    }

    // -- favorites ----------------------------------------------------------

    /// Flip favorite membership; returns the new state.
    pub fn toggle_favorite(&mut self, action: ActionType) -> bool {
        let now = self.favorites.toggle_favorite(action);
        tracing::debug!(%action, favorite = now, "favorite toggled");
        self.persist_favorites();
        now
    }

    pub fn is_favorite(&self, action: ActionType) -> bool {
        self.favorites.is_favorite(action)
    }

    pub fn favorites(&self) -> Vec<ActionType> {
        self.favorites.favorites().to_vec()
    }

    pub fn increment_usage(&mut self, action: ActionType) -> u64 {
        let count = self.favorites.increment_usage(action);
        self.persist_favorites();
        count
    }

    pub fn usage_count(&self, action: ActionType) -> u64 {
        self.favorites.usage_count(action)
    }

    /// Favorites ranked by usage; `None` uses the configured default.
    pub fn most_used(&self, limit: Option<usize>) -> Vec<FavoriteAction> {
        self.favorites
            .most_used(limit.unwrap_or(self.limits.top_limit))
    }

    // -- templates ----------------------------------------------------------

    pub fn create_template(&mut self, new: NewTemplate) -> Result<MessageTemplate, TemplateError> {
        let created = self.templates.create(new)?.clone();
        self.persist_templates();
        Ok(created)
    }

    pub fn template(&self, id: &str) -> Result<MessageTemplate, TemplateError> {
        self.templates.get(id).cloned()
    }

    pub fn list_templates(
        &self,
        platform: Option<TemplatePlatform>,
        category: Option<TemplateCategory>,
    ) -> Vec<MessageTemplate> {
        self.templates
            .list(platform, category)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn update_template(
        &mut self,
        id: &str,
        update: TemplateUpdate,
    ) -> Result<MessageTemplate, TemplateError> {
        let updated = self.templates.update(id, update)?.clone();
        self.persist_templates();
        Ok(updated)
    }

    pub fn delete_template(&mut self, id: &str) -> bool {
        let removed = self.templates.delete(id);
        if removed {
            self.persist_templates();
        }
        removed
    }

    pub fn duplicate_template(&mut self, id: &str, new_name: &str) -> Result<MessageTemplate, TemplateError> {
        let copy = self.templates.duplicate(id, new_name)?.clone();
        self.persist_templates();
        Ok(copy)
    }

    pub fn render_template(
        &mut self,
        id: &str,
        vars: &BTreeMap<String, String>,
        include_hashtags: bool,
    ) -> Result<RenderedTemplate, TemplateError> {
        let rendered = self.templates.render(id, vars, include_hashtags)?;
        self.persist_templates();
        Ok(rendered)
    }

    // -- persistence --------------------------------------------------------

    fn persist_history(&self) {
        let entries: Vec<&ActionHistoryEntry> = self.ledger.iter().collect();
        self.persist(HISTORY_KEY, &entries);
    }

    fn persist_favorites(&self) {
        self.persist(FAVORITES_KEY, &self.favorites);
    }

    fn persist_templates(&self) {
        self.persist(TEMPLATES_KEY, &self.templates);
    }

    fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let Some(backend) = &self.backend else {
            return;
        };
        if let Err(e) = save(backend.as_ref(), key, value) {
            tracing::warn!(key, error = %e, "failed to persist, continuing in memory");
        }
    }
}

fn save<T: Serialize + ?Sized>(kv: &dyn KvStore, key: &str, value: &T) -> Result<(), PersistError> {
    let json = serde_json::to_string(value).map_err(|source| PersistError::Codec {
        key: key.to_string(),
        source,
    })?;
    kv.set(key, &json)
}

fn load<T: DeserializeOwned>(kv: &dyn KvStore, key: &str) -> Result<Option<T>, PersistError> {
    let Some(json) = kv.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|source| PersistError::Codec {
            key: key.to_string(),
            source,
        })
}

fn load_or_default<T: DeserializeOwned + Default>(kv: &dyn KvStore, key: &str) -> T {
    match load(kv, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "could not load persisted state, starting empty");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryKv;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Backend that can be switched into a failing state.
    #[derive(Default)]
    struct FlakyKv {
        inner: MemoryKv,
        broken: AtomicBool,
    }

    impl FlakyKv {
        fn check(&self) -> Result<(), PersistError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(PersistError::Unavailable("disk gone".into()))
            } else {
                Ok(())
            }
        }
    }

    impl KvStore for FlakyKv {
        fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
            self.check()?;
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), PersistError> {
            self.check()?;
            self.inner.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), PersistError> {
            self.check()?;
            self.inner.remove(key)
        }
    }

    fn limits(max_entries: usize) -> StoreLimits {
        StoreLimits {
            max_entries,
            recent_limit: 50,
            top_limit: 5,
        }
    }

    fn entry(pid: &str, action: ActionType) -> NewActionEntry {
        NewActionEntry::success(pid, format!("Product {pid}"), action)
    }

    #[test]
    fn test_record_action_counts_usage_on_failure_too() {
        let mut store = ActionStore::in_memory(limits(10));
        store.record_action(entry("p1", ActionType::Whatsapp));
        store.record_action(NewActionEntry::failure("p1", "Product p1", ActionType::Whatsapp, "rate limited"));

        assert_eq!(store.usage_count(ActionType::Whatsapp), 2);
        assert_eq!(store.history_len(), 2);
        assert!(!store.recent_history(Some(1))[0].success());
    }

    #[test]
    fn test_add_entry_does_not_touch_usage() {
        let mut store = ActionStore::in_memory(limits(10));
        store.add_entry(entry("p1", ActionType::Export));
        assert_eq!(store.usage_count(ActionType::Export), 0);
    }

    #[test]
    fn test_state_survives_reopen() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        {
            let mut store = ActionStore::open(kv.clone(), limits(10));
            store.record_action(entry("p1", ActionType::Tiktok));
            store.record_action(entry("p2", ActionType::Youtube));
            store.toggle_favorite(ActionType::Tiktok);
            store
                .create_template(NewTemplate {
                    name: "Hook".into(),
                    caption_template: "{{product_name}} is trending".into(),
                    ..Default::default()
                })
                .unwrap();
        }

        let store = ActionStore::open(kv, limits(10));
        assert_eq!(store.history_len(), 2);
        assert_eq!(store.recent_history(None)[0].product_id(), "p2");
        assert_eq!(store.favorites(), vec![ActionType::Tiktok]);
        assert_eq!(store.usage_count(ActionType::Youtube), 1);
        assert_eq!(store.list_templates(None, None).len(), 1);
    }

    #[test]
    fn test_reopen_with_smaller_cap_truncates() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let mut store = ActionStore::open(kv.clone(), limits(10));
        for i in 0..8 {
            store.add_entry(entry(&format!("p{i}"), ActionType::Crm));
        }
        let reopened = ActionStore::open(kv, limits(3));
        assert_eq!(reopened.history_len(), 3);
        assert_eq!(reopened.recent_history(None)[0].product_id(), "p7");
    }

    #[test]
    fn test_persistence_failure_is_swallowed() {
        let flaky = Arc::new(FlakyKv::default());
        let mut store = ActionStore::open(flaky.clone(), limits(10));
        flaky.broken.store(true, Ordering::SeqCst);

        let added = store.record_action(entry("p1", ActionType::Email));
        assert_eq!(added.product_id(), "p1");
        assert!(store.toggle_favorite(ActionType::Email));
        store.clear_history();
        assert_eq!(store.history_len(), 0);
        assert_eq!(store.usage_count(ActionType::Email), 1);
    }

    #[test]
    fn test_unreadable_backend_starts_empty() {
        let flaky = Arc::new(FlakyKv::default());
        flaky.broken.store(true, Ordering::SeqCst);
        let mut store = ActionStore::open(flaky, limits(10));
        assert_eq!(store.history_len(), 0);
        store.add_entry(entry("p1", ActionType::CopyInfo));
        assert_eq!(store.history_len(), 1);
    }

    #[test]
    fn test_corrupt_value_starts_empty() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(HISTORY_KEY, "{not json").unwrap();
        kv.set(FAVORITES_KEY, r#"{"favorites":["crm"],"usage":{"crm":3}}"#).unwrap();

        let store = ActionStore::open(kv, limits(10));
        assert_eq!(store.history_len(), 0);
        assert_eq!(store.usage_count(ActionType::Crm), 3);
    }

    #[test]
    fn test_unknown_favorite_id_keeps_the_rest() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(
            FAVORITES_KEY,
            r#"{"favorites":["crm","pinterest"],"usage":{"crm":3,"pinterest":7}}"#,
        )
        .unwrap();

        let mut store = ActionStore::open(kv.clone(), limits(10));
        assert_eq!(store.favorites(), vec![ActionType::Crm]);
        assert_eq!(store.usage_count(ActionType::Crm), 3);

        // The next write drops the unknown id from the stored value.
        store.increment_usage(ActionType::Crm);
        let raw = kv.get(FAVORITES_KEY).unwrap().unwrap_or_default();
        assert!(!raw.contains("pinterest"));
        assert!(raw.contains("\"crm\":4"));
    }

    #[test]
    fn test_defaults_come_from_limits() {
        let mut store = ActionStore::in_memory(StoreLimits {
            max_entries: 100,
            recent_limit: 2,
            top_limit: 1,
        });
        for a in [ActionType::Crm, ActionType::Email, ActionType::Export] {
            store.toggle_favorite(a);
            store.record_action(entry("p1", a));
        }
        assert_eq!(store.recent_history(None).len(), 2);
        assert_eq!(store.most_used(None).len(), 1);
        assert_eq!(store.most_used(Some(10)).len(), 3);
    }
}
