// tests/api_http.rs
//
// HTTP-level tests for the dashboard Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use auction_monitor::api::{create_router, AppState};
use auction_monitor::types::CollectionStats;
use auction_monitor::{ChangeDetector, Dashboard, MemoryStore};

const BODY_LIMIT: usize = 1024 * 1024;

/// Dashboard with two unread new-item notifications.
fn seeded_dashboard() -> Dashboard {
    let dash = Dashboard::new(ChangeDetector::new(Arc::new(MemoryStore::new())));
    let t0 = Utc::now();
    dash.with_detector(|det| {
        for (i, total) in [10u64, 12, 20].into_iter().enumerate() {
            let stats = CollectionStats {
                total_items: total,
                ..CollectionStats::default()
            };
            det.observe_stats(&stats, t0 + Duration::seconds(i as i64));
        }
    });
    dash
}

fn test_router(dash: &Dashboard) -> Router {
    create_router(AppState {
        dashboard: dash.clone(),
    })
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

#[tokio::test]
async fn health_returns_ok() {
    let dash = seeded_dashboard();
    let (status, body) = send(test_router(&dash), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap().trim(), "OK");
}

#[tokio::test]
async fn notifications_are_listed_newest_first() {
    let dash = seeded_dashboard();
    let (status, body) = send(test_router(&dash), "GET", "/api/notifications").await;
    assert_eq!(status, StatusCode::OK);

    let v: Json = serde_json::from_slice(&body).expect("json");
    assert_eq!(v["unread_count"], 2);
    let list = v["notifications"].as_array().expect("array");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["message"], "8 new items were collected");
    assert_eq!(list[0]["kind"], "new-items");
    assert_eq!(list[1]["message"], "2 new items were collected");
}

#[tokio::test]
async fn read_endpoints_update_unread_count() {
    let dash = seeded_dashboard();
    let first = dash.notifications()[0].id.clone();

    let (status, _) = send(
        test_router(&dash),
        "POST",
        &format!("/api/notifications/{first}/read"),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(dash.unread_count(), 1);

    let (status, _) = send(test_router(&dash), "POST", "/api/notifications/missing/read").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(test_router(&dash), "POST", "/api/notifications/read-all").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(dash.unread_count(), 0);
    assert_eq!(dash.notifications().len(), 2);
}

#[tokio::test]
async fn delete_removes_single_notification() {
    let dash = seeded_dashboard();
    let id = dash.notifications()[1].id.clone();

    let uri = format!("/api/notifications/{id}");
    let (status, _) = send(test_router(&dash), "DELETE", &uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(test_router(&dash), "DELETE", &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(dash.notifications().len(), 1);
}

#[tokio::test]
async fn overview_and_metrics_render_before_first_poll() {
    let dash = seeded_dashboard();
    let (status, body) = send(test_router(&dash), "GET", "/api/overview").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("overview json");
    assert_eq!(v["connected"], false);
    assert_eq!(v["total_value"], "R$ 0,00");
    assert_eq!(v["unread_notifications"], 2);

    let (status, body) = send(test_router(&dash), "GET", "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&body).expect("metrics json");
    assert!(v["most_valuable"].is_null());
    assert_eq!(v["item_count"], 0);

    let (status, body) = send(test_router(&dash), "GET", "/api/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"[]");
}
