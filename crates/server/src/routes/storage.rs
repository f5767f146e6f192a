use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use services::services::storage::StoredObject;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UploadRequest {
    /// Defaults to the shared media bucket.
    pub bucket: Option<String>,
    pub filename: String,
    /// Base64-encoded file contents.
    pub data: String,
}

/// POST /api/storage/upload
pub async fn upload(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<UploadRequest>,
) -> Result<ResponseJson<ApiResponse<StoredObject>>, ApiError> {
    let bytes = STANDARD
        .decode(payload.data.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 payload: {e}")))?;

    let bucket = payload.bucket.as_deref().unwrap_or("media");
    let stored = state
        .storage()
        .store(bucket, &payload.filename, &bytes)
        .await?;

    Ok(ResponseJson(ApiResponse::success(stored)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/storage/upload", post(upload))
}
