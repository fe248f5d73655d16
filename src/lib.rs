//! tiktrend-actions -- action history, favorites and message templates for
//! the TikTrend Finder desktop app.
//!
//! The [`store::ActionStore`] is the single owner of all state; the HTTP API
//! and the CLI are thin layers over it.

pub mod action;
pub mod api;
pub mod config;
pub mod favorites;
pub mod ledger;
pub mod persist;
pub mod storage;
pub mod store;
pub mod templates;

use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::persist::{KvStore, MemoryKv, SqliteKv};
use crate::store::{ActionStore, StoreLimits};

/// Build the store described by `config`: SQLite-backed, or memory-backed
/// when `ephemeral` is set.
pub fn open_store(config: &AppConfig, ephemeral: bool) -> Result<ActionStore> {
    let backend: Arc<dyn KvStore> = if ephemeral {
        tracing::info!("using ephemeral in-memory store");
        Arc::new(MemoryKv::new())
    } else {
        tracing::info!(db_path = %config.storage.db_path, "Initializing database");
        Arc::new(SqliteKv::new(storage::open_pool(&config.storage.db_path)?))
    };
    Ok(ActionStore::open(backend, StoreLimits::from(config)))
}

/// Start the HTTP API daemon.
pub async fn serve(bind: &str, store: ActionStore) -> Result<()> {
    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(api::state::AppState::new(store));

    tracing::info!(%addr, "tiktrend-actions listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
