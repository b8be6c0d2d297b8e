use axum::{
    Router,
    extract::{Json, State},
    response::{Html, IntoResponse},
    routing::get,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::api::models::{StatusResponse, SubmitRequest};
use crate::api::response;
use crate::controller::Submission;
use crate::error::Result;

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route(
            "/api/applications",
            get(list_handler).post(submit_handler),
        )
        .route("/api/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler() -> impl IntoResponse {
    response::success(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let table = state.controller.refresh().await?;
    Ok(response::success(table))
}

async fn submit_handler(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse> {
    info!(url = %req.url, "processing submission");
    let start_time = std::time::Instant::now();

    let outcome = state
        .controller
        .submit(Submission {
            url: req.url,
            company: req.company,
        })
        .await?;

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "submission finished"
    );
    let message = Some(outcome.status_line.clone());
    Ok(response::success_with_message(outcome, message))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    response::success(StatusResponse {
        phase: state.controller.phase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::FormController;
    use crate::error::AppError;
    use crate::llm::CompletionClient;
    use crate::scraper::PageFetcher;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Page;

    #[async_trait]
    impl PageFetcher for Page {
        async fn render(&self, _url: &str, _timeout: Duration) -> Result<String> {
            Ok("Acme is hiring a Rust Engineer".to_string())
        }
    }

    struct Model;

    #[async_trait]
    impl CompletionClient for Model {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> std::result::Result<String, AppError> {
            Ok("Company Name: Acme\nJob Title: Rust Engineer".to_string())
        }
    }

    fn app() -> Router {
        let controller = FormController::new(
            Arc::new(MemoryStore::with_header()),
            Arc::new(Page),
            Arc::new(Model),
            Duration::from_secs(1),
        );
        create_router(AppState {
            controller: Arc::new(controller),
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_empty_list_is_placeholder() {
        let response = app()
            .oneshot(Request::get("/api/applications").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["kind"], "placeholder");
        assert_eq!(json["meta"]["status"], "success");
    }

    #[tokio::test]
    async fn test_submit_returns_outcome() {
        let request = Request::post("/api/applications")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"url": "https://acme.example/jobs/7"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["meta"]["message"], "Added Acme");
        assert_eq!(json["data"]["fields"]["title"], "Rust Engineer");
        assert_eq!(json["data"]["extraction"]["outcome"], "extracted");
        assert_eq!(json["data"]["table"]["kind"], "grid");
    }

    #[tokio::test]
    async fn test_submit_invalid_url_is_bad_request() {
        let request = Request::post("/api/applications")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"url": "not-a-url"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["meta"]["status"], "error");
        assert!(json["data"].is_null());
    }

    #[tokio::test]
    async fn test_status_is_idle() {
        let response = app()
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["phase"], "idle");
    }
}
