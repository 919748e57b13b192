use crate::metrics::{SnapshotStore, CONTENT_TYPE};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::error;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

/// Upper bound on handling a single request; slower requests get 408.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
struct AppState {
    store: Arc<SnapshotStore>,
    landing: Arc<str>,
}

/// Routes: `metrics_path` (exposition text), `/health` and an HTML index at `/`.
pub fn router(store: Arc<SnapshotStore>, metrics_path: &str) -> Router {
    let state = AppState {
        store,
        landing: landing_page(metrics_path).into(),
    };
    let router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route(metrics_path, get(metrics))
        .with_state(state);
    with_request_timeout(router, REQUEST_TIMEOUT)
}

fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(TimeoutLayer::new(timeout))
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        r#"<html>
<head><title>GitHub Rate Limit Exporter</title></head>
<body>
<h1>GitHub Rate Limit Exporter</h1>
<p><a href="{}">Metrics</a></p>
</body>
</html>"#,
        metrics_path
    )
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.landing.to_string())
}

async fn health() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.store.export_text() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
