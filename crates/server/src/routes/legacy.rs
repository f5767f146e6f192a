use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use serde::{Deserialize, Serialize};
use services::services::migration::ImportReport;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ImportRequest {
    pub page_path: String,
}

/// POST /api/legacy/import
pub async fn import_page(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<ImportRequest>,
) -> Result<ResponseJson<ApiResponse<ImportReport>>, ApiError> {
    let report = state.importer().import_page(&payload.page_path).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

/// POST /api/legacy/import-all
pub async fn import_all(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<ImportReport>>>, ApiError> {
    let reports = state.importer().import_all().await?;
    Ok(ResponseJson(ApiResponse::success(reports)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/legacy",
        Router::new()
            .route("/import", post(import_page))
            .route("/import-all", post(import_all)),
    )
}
