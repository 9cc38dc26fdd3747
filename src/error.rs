use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("{0}")]
    BadRequest(String),
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("file already exists: {base_name}")]
    Conflict { base_name: String, url: String },
    #[error("image processing failed: {0}")]
    ImageProcessing(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl MediaError {
    pub fn status(&self) -> StatusCode {
        match self {
            MediaError::BadRequest(_) => StatusCode::BAD_REQUEST,
            MediaError::Unauthorized => StatusCode::UNAUTHORIZED,
            MediaError::NotFound(_) => StatusCode::NOT_FOUND,
            MediaError::Conflict { .. } => StatusCode::CONFLICT,
            MediaError::ImageProcessing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MediaError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<image::ImageError> for MediaError {
    fn from(err: image::ImageError) -> Self {
        MediaError::ImageProcessing(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConflictResponse {
    error: String,
    base_name: String,
    url: String,
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        match self {
            MediaError::Conflict { base_name, url } => (
                status,
                Json(ConflictResponse {
                    error: "File already exists".to_string(),
                    base_name,
                    url,
                }),
            )
                .into_response(),
            other => (
                status,
                Json(ErrorResponse {
                    error: other.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
