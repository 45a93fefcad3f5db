//! HTTP server for the Prometheus exposition endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::exposition::SharedStore;

/// Content type of the Prometheus text format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Readiness endpoint.
pub const READY_PATH: &str = "/ready";

/// Paths the metrics endpoint must not take.
pub const RESERVED_PATHS: &[&str] = &[HEALTH_PATH, READY_PATH];

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    store: SharedStore,
}

/// Create the HTTP router.
pub fn create_router(store: SharedStore, metrics_path: &str) -> Router {
    let state = AppState { store };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route(HEALTH_PATH, get(health_handler))
        .route(READY_PATH, get(ready_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let body = state.store.snapshot();

    (
        StatusCode::OK,
        [("content-type", EXPOSITION_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Handler for the /ready endpoint.
async fn ready_handler(State(state): State<AppState>) -> Response {
    // Ready once every collector has finished its first scrape, successful or not
    if state.store.is_ready() {
        (StatusCode::OK, "ready\n").into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "not ready - collectors have not completed their first scrape\n",
        )
            .into_response()
    }
}

/// HTTP server configuration.
pub struct HttpServer {
    store: SharedStore,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(store: SharedStore, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            store,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.store, &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposition::ExpositionStore;
    use crate::incidents::IncidentCounter;
    use crate::registry::MetricFamily;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn make_store() -> (SharedStore, crate::exposition::SharedSlot) {
        let mut builder = ExpositionStore::builder();
        builder.add_families(&[MetricFamily::gauge("upsc_ups_load", "Load on UPS (percent)")]);
        let slot = builder.add_slot("main@localhost:3493");
        (Arc::new(builder.build(IncidentCounter::new())), slot)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (store, slot) = make_store();
        slot.replace("upsc_ups_load{ups=\"main\"} 14.00\n".to_string());
        let router = create_router(store, "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = body_string(response).await;
        assert!(body.contains("# TYPE upsc_ups_load gauge\n"));
        assert!(body.contains("upsc_ups_load{ups=\"main\"} 14.00\n"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (store, _) = make_store();
        let router = create_router(store, "/metrics");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let (store, slot) = make_store();
        let router = create_router(store, "/metrics");

        let response = router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        // A failed first scrape still counts as completed
        slot.replace(String::new());

        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let (store, _) = make_store();
        let router = create_router(store, "/sensors/metrics");

        let response = router
            .clone()
            .oneshot(
                Request::get("/sensors/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
