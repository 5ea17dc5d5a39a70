use std::convert::Infallible;
use std::sync::Arc;

use async_stream::stream;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use contest_rank_sync::store::Column;
use contest_rank_sync::{ClientError, ContestStatus, ViewState};

use crate::state::{AppState, StreamEvent};

#[derive(Deserialize)]
pub(crate) struct RefreshParams {
    page: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SettingsUpdate {
    chart_visible: Option<bool>,
    menu_visible: Option<bool>,
    real_name_visible: Option<bool>,
    force_update: Option<bool>,
    rank_limit: Option<u32>,
}

#[derive(Deserialize)]
pub(crate) struct AutoRefreshParams {
    enabled: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettingsPayload {
    #[serde(flatten)]
    view: ViewState,
    contest_status: ContestStatus,
    refresh_disabled: bool,
    auto_refresh: bool,
    chart_loading: bool,
    page: u32,
    total: u64,
    columns: Vec<Column>,
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub(crate) async fn rank_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.publisher.latest() {
        Some(snapshot) => json_response(StatusCode::OK, snapshot.as_ref()),
        None => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "ranking not loaded yet; try again shortly".to_string(),
        ),
    }
}

pub(crate) async fn settings_handler(State(state): State<Arc<AppState>>) -> Response {
    json_response(StatusCode::OK, &settings_payload(&state))
}

pub(crate) async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SettingsUpdate>,
) -> Response {
    if update.rank_limit == Some(0) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "rankLimit must be positive".to_string(),
        );
    }

    let store = state.ranking.store();
    if let Some(visible) = update.chart_visible {
        store.set_chart_visible(visible);
    }
    if let Some(visible) = update.menu_visible {
        store.set_menu_visible(visible);
    }
    if let Some(visible) = update.real_name_visible {
        store.set_real_name_visible(visible);
    }
    if let Some(force) = update.force_update {
        store.set_force_update(force);
    }
    if let Some(limit) = update.rank_limit {
        if limit != store.rank_limit() {
            store.set_rank_limit(limit);
            state.ranking.change_page(1);
        }
    }

    json_response(StatusCode::OK, &settings_payload(&state))
}

pub(crate) async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> Response {
    let controller = state.ranking.controller();
    let page = match params.page.as_deref().map(str::trim) {
        None | Some("") => controller.current_page(),
        Some(value) => match value.parse::<u32>() {
            Ok(page) if page > 0 => page,
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid page {}", value),
                )
            }
        },
    };

    state.ranking.change_page(page);
    json_response(StatusCode::ACCEPTED, &serde_json::json!({ "page": page }))
}

pub(crate) async fn auto_refresh_handler(
    State(state): State<Arc<AppState>>,
    Json(params): Json<AutoRefreshParams>,
) -> Response {
    if params.enabled && state.ranking.store().is_refresh_disabled() {
        return error_response(
            StatusCode::CONFLICT,
            "contest has ended; auto refresh is disabled".to_string(),
        );
    }
    state.ranking.set_auto_refresh(params.enabled);
    info!(enabled = params.enabled, "auto refresh toggled");
    json_response(StatusCode::OK, &settings_payload(&state))
}

pub(crate) async fn export_handler(State(state): State<Arc<AppState>>) -> Response {
    let contest_id = &state.config.contest_id;
    match state.client.download_rank(contest_id).await {
        Ok(body) => {
            let mut headers = cors_headers();
            headers.insert("Content-Type", HeaderValue::from_static("application/xlsx"));
            if let Ok(disposition) = HeaderValue::from_str(&format!(
                "attachment; filename=contest-{}-rank.xlsx",
                contest_id
            )) {
                headers.insert("Content-Disposition", disposition);
            }
            (StatusCode::OK, headers, body).into_response()
        }
        Err(err) => {
            warn!(?err, contest_id = %contest_id, "rank export failed");
            let status = match &err {
                ClientError::Api(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::BAD_GATEWAY,
            };
            error_response(status, err.to_string())
        }
    }
}

pub(crate) async fn options_handler() -> impl IntoResponse {
    (StatusCode::NO_CONTENT, cors_headers())
}

pub(crate) async fn rank_stream(State(state): State<Arc<AppState>>) -> Response {
    let stream_state = Arc::clone(&state);
    let heartbeat = state.config.heartbeat;

    let stream = stream! {
        let mut rx = stream_state.publisher.sender.subscribe();

        yield Ok::<_, Infallible>(Event::default().comment("stream-open"));

        if let Some(snapshot) = stream_state.publisher.latest() {
            if let Some(event) = json_event("ranking", snapshot.as_ref()) {
                yield Ok::<_, Infallible>(event);
            }
        }

        loop {
            let event = match rx.recv().await {
                Ok(StreamEvent::Ranking(snapshot)) => json_event("ranking", snapshot.as_ref()),
                Ok(StreamEvent::Notice { kind, message }) => json_event(
                    "notice",
                    &serde_json::json!({ "kind": kind, "message": message }),
                ),
                Ok(StreamEvent::ChartLoading(loading)) => {
                    json_event("chart-loading", &serde_json::json!({ "loading": loading }))
                }
                Ok(StreamEvent::Layout(target)) => {
                    json_event("layout", &serde_json::json!({ "target": target }))
                }
                Ok(StreamEvent::Shutdown) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "rank-stream lagged; skipping messages");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if let Some(event) = event {
                yield Ok::<_, Infallible>(event);
            }
        }
    };

    let sse = Sse::new(stream).keep_alive(KeepAlive::new().interval(heartbeat).text("heartbeat"));
    let mut response = sse.into_response();
    apply_stream_headers(&mut response);
    response
}

fn settings_payload(state: &AppState) -> SettingsPayload {
    let store = state.ranking.store();
    let controller = state.ranking.controller();
    SettingsPayload {
        view: store.view_state(),
        contest_status: store.contest_status(),
        refresh_disabled: store.is_refresh_disabled(),
        auto_refresh: controller.is_auto_refreshing(),
        chart_loading: state.publisher.chart_loading(),
        page: controller.current_page(),
        total: controller.total(),
        columns: store.columns(),
    }
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Option<Event> {
    match serde_json::to_string(payload) {
        Ok(json) => Some(Event::default().event(name).data(json)),
        Err(err) => {
            warn!(?err, "failed to serialize stream event");
            None
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    let body = match serde_json::to_string(payload) {
        Ok(body) => body,
        Err(err) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    };
    let mut headers = cors_headers();
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    (status, headers, body).into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, cors_headers(), message).into_response()
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type"),
    );
    headers
}

fn apply_stream_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.extend(cors_headers());
    headers.insert(
        "Cache-Control",
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    headers.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
}
