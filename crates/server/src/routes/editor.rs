use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::content_block::CreateContentBlock;
use serde::{Deserialize, Serialize};
use services::services::editor::{DraftAck, SessionView};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OpenSessionRequest {
    pub page_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct DraftRequest {
    pub blocks: Vec<CreateContentBlock>,
}

/// POST /api/editor/sessions
pub async fn open_session(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<OpenSessionRequest>,
) -> Result<ResponseJson<ApiResponse<SessionView>>, ApiError> {
    let view = state.editors().open(&payload.page_path).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// GET /api/editor/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<SessionView>>, ApiError> {
    let view = state.editors().view(session_id)?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// DELETE /api/editor/sessions/{session_id}
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.editors().close(session_id)?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// POST /api/editor/sessions/{session_id}/edit
pub async fn begin_edit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<SessionView>>, ApiError> {
    let view = state.editors().begin_edit(session_id)?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// PUT /api/editor/sessions/{session_id}/draft
pub async fn update_draft(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    axum::Json(payload): axum::Json<DraftRequest>,
) -> Result<ResponseJson<ApiResponse<DraftAck>>, ApiError> {
    let ack = state.editors().update_draft(session_id, payload.blocks)?;
    Ok(ResponseJson(ApiResponse::success(ack)))
}

/// POST /api/editor/sessions/{session_id}/save
pub async fn save_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<SessionView>>, ApiError> {
    let view = state.editors().save(session_id).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

/// POST /api/editor/sessions/{session_id}/cancel
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<SessionView>>, ApiError> {
    let view = state.editors().cancel(session_id).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/editor/sessions",
        Router::new()
            .route("/", post(open_session))
            .route("/{session_id}", get(get_session).delete(close_session))
            .route("/{session_id}/edit", post(begin_edit))
            .route("/{session_id}/draft", put(update_draft))
            .route("/{session_id}/save", post(save_session))
            .route("/{session_id}/cancel", post(cancel_session)),
    )
}
