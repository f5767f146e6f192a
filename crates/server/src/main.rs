use std::sync::Arc;

use db::DBService;
use services::services::{
    block_store::BlockStore,
    config::Config,
    editor::EditorSessionService,
    events::PageEvents,
    extractor::{ContentExtractor, HttpPageFetcher},
    migration::LegacyImporter,
    storage::StorageService,
};
use tokio::net::TcpListener;
use tracing::info;

mod error;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::logging::init();

    let config = Config::from_env()?;
    let db = DBService::new(&config.database_path).await?;

    let events = PageEvents::new();
    let store = BlockStore::new(db.clone(), events.clone());
    let extractor = ContentExtractor::new(
        store.clone(),
        Arc::new(HttpPageFetcher::new()?),
        config.site_origin.clone(),
        config.extract.clone(),
    );
    let editors = EditorSessionService::new(store.clone(), config.site_origin.clone());
    let _watcher = editors.spawn_watcher(&events);
    let importer = LegacyImporter::new(db.clone(), store.clone());
    let storage = StorageService::new(&config.upload_dir, config.public_base_url.clone());

    let bind_addr = config.bind_addr.clone();
    let upload_dir = config.upload_dir.clone();
    let state = AppState::new(config, events, store, extractor, editors, importer, storage);

    let listener = TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "content service listening");

    axum::serve(listener, routes::router(&upload_dir).with_state(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}
