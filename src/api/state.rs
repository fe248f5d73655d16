use std::sync::Arc;

use tokio::sync::Mutex;

use crate::store::ActionStore;

/// Store handle shared by all request handlers. The mutex serializes every
/// operation, so handlers see the same single-writer model as the desktop UI.
pub type SharedStore = Arc<Mutex<ActionStore>>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
}

impl AppState {
    pub fn new(store: ActionStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }
}
