use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use serde::{Deserialize, Serialize};
use services::services::extractor::{ExtractOptions, ExtractionOutcome};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ExtractRequest {
    pub page_path: String,
    /// Omitted options fall back to the configured extraction defaults.
    #[serde(default)]
    pub options: Option<ExtractOptions>,
}

/// POST /api/extract
pub async fn extract_page(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<ExtractRequest>,
) -> Result<ResponseJson<ApiResponse<ExtractionOutcome>>, ApiError> {
    let options = payload
        .options
        .unwrap_or_else(|| state.extractor().default_options());

    let outcome = state
        .extractor()
        .extract_page(&payload.page_path, &options)
        .await?;

    Ok(ResponseJson(ApiResponse::success(outcome)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/extract", post(extract_page))
}
