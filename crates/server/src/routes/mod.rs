use std::path::Path;

use axum::Router;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::state::AppState;

mod blocks;
mod editor;
mod events;
mod extract;
mod health;
mod legacy;
mod settings;
mod storage;

pub fn router(upload_dir: &Path) -> Router<AppState> {
    let api = Router::new()
        .merge(health::router())
        .merge(blocks::router())
        .merge(extract::router())
        .merge(editor::router())
        .merge(events::router())
        .merge(storage::router())
        .merge(legacy::router())
        .merge(settings::router());

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(CorsLayer::permissive())
}
