use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::handlers::{fetch_messages, post_message};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Publish & poll
        .route("/message", post(post_message))
        .route("/fetch", post(fetch_messages))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Settings;
    use crate::server::{create_app, AppState};

    #[tokio::test]
    async fn test_health() {
        let app = create_app(AppState::new(Settings::default()));

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_stats_reports_buffers() {
        let state = AppState::new(Settings::default());
        state.relay.buffers().fetch("p1", Some(vec!["news".to_string()]));
        let app = create_app(state);

        let response = app
            .oneshot(Request::get("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["poll_buffers"]["total_buffers"], 1);
        assert_eq!(body["connections"]["total_connections"], 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = create_app(AppState::new(Settings::default()));

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let text = String::from_utf8(
            to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
        )
        .unwrap();
        assert!(text.contains("relay_connections_active"));
    }
}
