use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::get,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{error::ApiError, state::AppState};

/// Settings the admin UI reads; the logo lives here instead of on a global.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SiteSettings {
    pub site_origin: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateSettingsRequest {
    pub logo_url: Option<String>,
}

/// GET /api/settings
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<SiteSettings>>, ApiError> {
    let config = state.config().read().await;
    Ok(ResponseJson(ApiResponse::success(SiteSettings {
        site_origin: config.site_origin.to_string(),
        logo_url: config.logo_url.clone(),
    })))
}

/// PUT /api/settings
pub async fn update_settings(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<UpdateSettingsRequest>,
) -> Result<ResponseJson<ApiResponse<SiteSettings>>, ApiError> {
    let mut config = state.config().write().await;
    config.logo_url = payload.logo_url;

    Ok(ResponseJson(ApiResponse::success(SiteSettings {
        site_origin: config.site_origin.to_string(),
        logo_url: config.logo_url.clone(),
    })))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}
