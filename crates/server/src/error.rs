use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{
    block_store::BlockStoreError, editor::EditorError, extractor::ExtractError,
    migration::ImportError, storage::StorageError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    BlockStore(#[from] BlockStoreError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BlockStore(BlockStoreError::StaleVersion { .. }) => StatusCode::CONFLICT,
            Self::BlockStore(BlockStoreError::BlockNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Editor(EditorError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Editor(EditorError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            Self::Editor(EditorError::Store(BlockStoreError::StaleVersion { .. })) => {
                StatusCode::CONFLICT
            }
            Self::Storage(StorageError::InvalidName(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Extract(ExtractError::Http { .. } | ExtractError::Fetch(_)) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}
