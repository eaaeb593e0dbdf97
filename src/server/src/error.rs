use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rolemap_core::CoreError;
use rolemap_crawler::CrawlError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Crawl failed: {0}")]
    CrawlError(#[from] CrawlError),

    #[error("Load failed: {0}")]
    SinkError(#[source] CoreError),

    #[error("Crawl cancelled: {0}")]
    Cancelled(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::CrawlError(CrawlError::Configuration(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Cancelled(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
