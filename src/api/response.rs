use axum::Json;
use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;

/// Envelope for every JSON answer: `data` on success, `meta.message` on error.
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub meta: ResponseMeta,
}

#[derive(Serialize)]
pub struct ResponseMeta {
    pub status: &'static str,
    pub status_code: u16,
    pub timestamp: String,
    pub message: Option<String>,
}

impl ResponseMeta {
    fn new(status: StatusCode, message: Option<String>) -> Self {
        Self {
            status: if status.is_success() { "success" } else { "error" },
            status_code: status.as_u16(),
            timestamp: Utc::now().to_rfc3339(),
            message,
        }
    }
}

pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn success<T: Serialize>(data: T) -> Reply<T> {
    success_with_message(data, None)
}

/// Success carrying the status line shown above the table.
pub fn success_with_message<T: Serialize>(data: T, message: Option<String>) -> Reply<T> {
    let meta = ResponseMeta::new(StatusCode::OK, message);
    (
        StatusCode::OK,
        Json(ApiResponse {
            data: Some(data),
            meta,
        }),
    )
}

pub fn error<T: Serialize>(status: StatusCode, message: String) -> Reply<T> {
    let meta = ResponseMeta::new(status, Some(message));
    (status, Json(ApiResponse { data: None, meta }))
}
