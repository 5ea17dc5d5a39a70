use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use contest_rank_sync::models::RankUser;
use contest_rank_sync::projector::{project_chart, project_table};
use contest_rank_sync::{
    ContestStatus, HttpRankClient, MemoryPreferences, PageUpdate, RankEntry, RankingView,
    RuleType,
};

use crate::config::Config;
use crate::server::build_router;
use crate::state::AppState;

fn test_config() -> Config {
    Config {
        base_url: "http://127.0.0.1:1".to_string(),
        session_id: None,
        contest_id: "42".to_string(),
        rule_type: RuleType::Acm,
        port: 0,
        request_timeout: Duration::from_millis(200),
        refresh_interval: Duration::from_millis(10_000),
        status_poll_interval: Duration::from_millis(60_000),
        heartbeat: Duration::from_millis(1000),
        discard_stale_responses: false,
        auto_refresh: false,
        preferences_path: PathBuf::from("unused.json"),
    }
}

fn test_state_with_status(status: ContestStatus) -> Arc<AppState> {
    let config = test_config();
    let client = HttpRankClient::new(
        &config.base_url,
        config.session_id.as_deref(),
        config.request_timeout,
    )
    .expect("rank client");
    AppState::new(
        config,
        client,
        RuleType::Acm,
        status,
        Arc::new(MemoryPreferences::default()),
    )
}

fn test_state() -> Arc<AppState> {
    test_state_with_status(ContestStatus::Underway)
}

fn entry(id: u64, username: &str) -> RankEntry {
    RankEntry {
        id: Some(id),
        user: RankUser {
            id,
            username: username.to_string(),
            real_name: None,
        },
        submission_number: 3,
        accepted_number: Some(2),
        total_time: Some(4_000),
        total_score: None,
        submission_info: Default::default(),
    }
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, value)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .expect("health response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = response
        .into_body()
        .collect()
        .await
        .expect("health body")
        .to_bytes();
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn rank_endpoint_is_unavailable_before_first_page() {
    let app = build_router(test_state());
    let response = app
        .oneshot(Request::builder().uri("/api/rank").body(Body::empty()).unwrap())
        .await
        .expect("rank response");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn rank_endpoint_returns_latest_snapshot() {
    let state = test_state();
    let entries = vec![entry(1, "alice"), entry(2, "bob")];
    state.publisher.apply_page(PageUpdate {
        page: 1,
        total: 57,
        chart: Some(project_chart(&entries, RuleType::Acm)),
        table: project_table(&entries, RuleType::Acm, 0),
    });

    let (status, value) = send(
        build_router(state),
        Request::builder().uri("/api/rank").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["total"], 57);
    assert_eq!(value["page"], 1);
    assert_eq!(value["chart"]["kind"], "acceptedTimeline");
    let rows = value["table"]["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["rank"], 2);
    assert_eq!(rows[1]["username"], "bob");
    assert_eq!(rows[0]["summary"]["totalTimeDisplay"], "01:06:40");
}

#[tokio::test]
async fn real_name_toggle_inserts_and_removes_one_column() {
    let state = test_state();

    let (status, value) = send(
        build_router(Arc::clone(&state)),
        post_json("/api/rank/settings", serde_json::json!({ "realNameVisible": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["realNameVisible"], true);
    let columns = value["columns"].as_array().expect("columns");
    assert_eq!(columns.len(), 5);
    assert_eq!(columns[2]["key"], "realName");

    let (_, value) = send(
        build_router(state),
        post_json("/api/rank/settings", serde_json::json!({ "realNameVisible": false })),
    )
    .await;
    let columns = value["columns"].as_array().expect("columns");
    assert_eq!(columns.len(), 4);
    assert!(columns.iter().all(|column| column["key"] != "realName"));
}

#[tokio::test]
async fn rank_export_reports_unreachable_backend() {
    let response = build_router(test_state())
        .oneshot(
            Request::builder()
                .uri("/api/rank/export")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("export response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        response.headers().get("Access-Control-Allow-Origin").map(|value| value.as_bytes()),
        Some(b"*".as_ref())
    );
}

#[tokio::test]
async fn zero_rank_limit_is_rejected() {
    let state = test_state();
    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/rank/settings",
            serde_json::json!({ "rankLimit": 0 }),
        ))
        .await
        .expect("settings response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.ranking.store().rank_limit(), 30);
}

#[tokio::test]
async fn invalid_refresh_page_is_rejected() {
    let response = build_router(test_state())
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/rank/refresh?page=zero")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("refresh response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn auto_refresh_toggles_and_reports_state() {
    let state = test_state();

    let (status, value) = send(
        build_router(Arc::clone(&state)),
        post_json("/api/rank/auto-refresh", serde_json::json!({ "enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["autoRefresh"], true);
    assert_eq!(value["refreshDisabled"], false);

    let (_, value) = send(
        build_router(Arc::clone(&state)),
        post_json("/api/rank/auto-refresh", serde_json::json!({ "enabled": false })),
    )
    .await;
    assert_eq!(value["autoRefresh"], false);
    assert!(!state.ranking.controller().is_auto_refreshing());
}

#[tokio::test]
async fn auto_refresh_is_refused_after_contest_ends() {
    let state = test_state_with_status(ContestStatus::Ended);
    let response = build_router(Arc::clone(&state))
        .oneshot(post_json(
            "/api/rank/auto-refresh",
            serde_json::json!({ "enabled": true }),
        ))
        .await
        .expect("auto refresh response");
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(!state.ranking.controller().is_auto_refreshing());

    let (_, value) = send(
        build_router(state),
        Request::builder()
            .uri("/api/rank/settings")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(value["refreshDisabled"], true);
    assert_eq!(value["contestStatus"], "-1");
}

#[tokio::test]
async fn rank_stream_sets_event_stream_headers() {
    let app = build_router(test_state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/rank-stream")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("rank stream response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/event-stream"))
        .unwrap_or(false));
    assert_eq!(
        response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok()),
        Some("no-cache, no-transform")
    );

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_millis(200), body.frame())
        .await
        .expect("sse frame timeout")
        .expect("sse frame missing")
        .expect("sse frame error");
    let data = match frame.into_data() {
        Ok(data) => data,
        Err(_) => panic!("expected data frame"),
    };
    let text = String::from_utf8_lossy(data.as_ref());
    assert!(text.contains("stream-open"));
}
