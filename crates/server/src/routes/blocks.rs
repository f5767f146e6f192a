use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::content_block::{ContentBlock, CreateContentBlock};
use serde::{Deserialize, Serialize};
use services::services::block_store::{PageBlocks, UpsertBlock};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub path: String,
}

/// Full-list save; `base_version` carries the optimistic-concurrency token
/// (omit it to force the write, e.g. from migration tooling).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ReplacePageRequest {
    pub page_path: String,
    pub base_version: Option<i64>,
    pub blocks: Vec<CreateContentBlock>,
}

/// GET /api/pages/blocks?path=/eyecare
pub async fn get_page_blocks(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<PageBlocks>>, ApiError> {
    let page = state.blocks().fetch_page(&query.path).await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// PUT /api/pages/blocks
pub async fn replace_page_blocks(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<ReplacePageRequest>,
) -> Result<ResponseJson<ApiResponse<PageBlocks>>, ApiError> {
    let page = state
        .blocks()
        .replace_page(&payload.page_path, payload.blocks, payload.base_version)
        .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

/// POST /api/blocks
pub async fn upsert_block(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<UpsertBlock>,
) -> Result<ResponseJson<ApiResponse<ContentBlock>>, ApiError> {
    let block = state.blocks().upsert_block(payload).await?;
    Ok(ResponseJson(ApiResponse::success(block)))
}

/// DELETE /api/blocks/{block_id}
pub async fn delete_block(
    State(state): State<AppState>,
    Path(block_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.blocks().delete_block(block_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/pages/blocks",
            get(get_page_blocks).put(replace_page_blocks),
        )
        .route("/blocks", post(upsert_block))
        .route("/blocks/{block_id}", delete(delete_block))
}
