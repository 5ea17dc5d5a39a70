use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::handlers::{
    auto_refresh_handler, export_handler, health_handler, options_handler, rank_handler, rank_stream,
    refresh_handler, settings_handler, update_settings_handler,
};
use crate::state::AppState;

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/rank", get(rank_handler).options(options_handler))
        .route(
            "/api/rank/settings",
            get(settings_handler)
                .post(update_settings_handler)
                .options(options_handler),
        )
        .route(
            "/api/rank/refresh",
            post(refresh_handler).options(options_handler),
        )
        .route(
            "/api/rank/auto-refresh",
            post(auto_refresh_handler).options(options_handler),
        )
        .route(
            "/api/rank/export",
            get(export_handler).options(options_handler),
        )
        .route("/api/rank-stream", get(rank_stream).options(options_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(middleware::from_fn(log_request))
}

async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req
        .uri()
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or_else(|| req.uri().path())
        .to_string();
    let remote_ip = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "-".to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    info!(
        remote_ip = %remote_ip,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "request served"
    );
    response
}
