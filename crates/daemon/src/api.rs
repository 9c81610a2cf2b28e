//! HTTP status and metrics surface.
//!
//! `GET /metrics` serves the Prometheus text exposition; everything else is
//! JSON. Unknown binding names answer 404.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::supervisor::Supervisor;

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(all_health))
        .route("/health/{name}", get(binding_health))
        .route("/metrics", get(metrics_exposition))
        .route("/metrics/{name}", get(binding_metrics))
        .layer(CorsLayer::permissive())
        .with_state(supervisor)
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "name": "mq-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            {"path": "/health", "description": "Health status for all bindings"},
            {"path": "/health/{binding_name}", "description": "Health status for a specific binding"},
            {"path": "/metrics", "description": "Prometheus metrics for all bindings"},
            {"path": "/metrics/{binding_name}", "description": "Metrics for a specific binding"},
        ],
    }))
}

async fn all_health(State(supervisor): State<Arc<Supervisor>>) -> Response {
    Json(supervisor.health().await).into_response()
}

async fn binding_health(
    State(supervisor): State<Arc<Supervisor>>,
    Path(name): Path<String>,
) -> Response {
    match supervisor.find(&name) {
        Some(binding) => Json(binding.health().await).into_response(),
        None => not_found(&name),
    }
}

async fn metrics_exposition(State(supervisor): State<Arc<Supervisor>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        supervisor.render_prometheus(),
    )
        .into_response()
}

async fn binding_metrics(
    State(supervisor): State<Arc<Supervisor>>,
    Path(name): Path<String>,
) -> Response {
    match supervisor.find(&name) {
        Some(binding) => Json(binding.metrics()).into_response(),
        None => not_found(&name),
    }
}

fn not_found(name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("binding '{name}' not found")})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use bridge_core::BridgeConfig;

    use super::*;

    fn app() -> Router {
        let config = BridgeConfig::from_yaml(
            r#"
bindings:
  - name: b1
    type: kubemq_to_kubemq
    source: { address: "127.0.0.1:1", queue_name: in }
    target: { address: "127.0.0.1:1", queue_name: out }
"#,
        )
        .unwrap();
        router(Arc::new(Supervisor::init(config).unwrap()))
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_is_text_exposition() {
        let response = app()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("connection_status"));
    }

    #[tokio::test]
    async fn binding_metrics_by_name() {
        let response = app()
            .oneshot(Request::get("/metrics/b1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["name"], "b1");
        assert_eq!(parsed["messages_received_total"], 0);
    }

    #[tokio::test]
    async fn unknown_binding_is_404() {
        for path in ["/metrics/nope", "/health/nope"] {
            let response = app()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}
