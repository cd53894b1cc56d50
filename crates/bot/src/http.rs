//! Health and metrics endpoints.

use axum::{extract::State, http::header, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use animedl_core::DownloadLifecycleManager;

use crate::metrics::encode_metrics;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_downloads: usize,
}

pub fn create_router(downloads: DownloadLifecycleManager) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(downloads)
}

async fn health(State(downloads): State<DownloadLifecycleManager>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_downloads: downloads.active_count().await,
    })
}

async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use animedl_core::testing::{ManualScheduler, MockAgent, MockMessenger};
    use animedl_core::LifecycleConfig;

    fn app() -> Router {
        let downloads = DownloadLifecycleManager::new(
            Arc::new(MockAgent::new()),
            Arc::new(MockMessenger::new()),
            Arc::new(ManualScheduler::new()),
            LifecycleConfig::default(),
        );
        create_router(downloads)
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["active_downloads"], 0);
    }

    #[tokio::test]
    async fn test_metrics_text() {
        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("animedl_active_downloads"));
    }
}
