use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Unreadable file: {0}")]
    UnreadableFile(String),
    #[error("Invalid chart request: {0}")]
    InvalidChartRequest(String),
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("DataFrame error: {0}")]
    DataFrameError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<polars::prelude::PolarsError> for AppError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        AppError::DataFrameError(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::UnreadableFile(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidChartRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ColumnNotFound(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::DatasetNotFound(_) => StatusCode::NOT_FOUND,
            AppError::DataFrameError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_pipeline_errors_to_client_statuses() {
        let cases = [
            (AppError::UnsupportedFormat("x.txt".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (AppError::UnreadableFile("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (AppError::InvalidChartRequest("y".into()), StatusCode::BAD_REQUEST),
            (AppError::DatasetNotFound("7".into()), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn message_names_the_kind() {
        let err = AppError::InvalidChartRequest("Scatter requires a Y column".into());
        assert_eq!(err.to_string(), "Invalid chart request: Scatter requires a Y column");
    }
}
