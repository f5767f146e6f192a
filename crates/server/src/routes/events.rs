use std::convert::Infallible;

use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};
use utils::path::normalize_page_path;

use crate::state::AppState;

use super::blocks::PageQuery;

/// GET /api/events/blocks?path=/eyecare
///
/// Streams block-change events for one page as server-sent events. A client
/// that lags behind simply misses the dropped events; its next received
/// event still carries the latest version, so a refetch catches it up.
pub async fn block_events(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let page_path = normalize_page_path(&query.path);
    let rx = state.events().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |change| match change {
        Ok(change) if change.page_path == page_path => Event::default()
            .event("block_change")
            .json_data(&change)
            .ok()
            .map(Ok::<_, Infallible>),
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/events/blocks", get(block_events))
}
