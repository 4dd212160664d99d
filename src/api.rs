use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;

use crate::aggregate::AggregateSnapshot;
use crate::monitor::Dashboard;
use crate::normalize::format_amount;
use crate::notify::NotificationEvent;
use crate::types::SessionRecord;

#[derive(Clone)]
pub struct AppState {
    pub dashboard: Dashboard,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/overview", get(overview))
        .route("/api/metrics", get(snapshot))
        .route("/api/sessions", get(sessions))
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/read-all", post(read_all))
        .route("/api/notifications/{id}/read", post(read_one))
        .route("/api/notifications/{id}", delete(delete_one))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct OverviewOut {
    total_items: u64,
    total_sessions: u64,
    items_by_category: HashMap<String, u64>,
    items_by_source: HashMap<String, u64>,
    total_value: String,
    mean_value: String,
    connected: bool,
    last_refresh: Option<DateTime<Utc>>,
    last_error: Option<String>,
    unread_notifications: usize,
}

async fn overview(State(state): State<AppState>) -> Json<OverviewOut> {
    let view = state.dashboard.view();
    let stats = view.stats.unwrap_or_default();
    Json(OverviewOut {
        total_items: stats.total_items,
        total_sessions: stats.total_sessions,
        items_by_category: stats.items_by_category,
        items_by_source: stats.items_by_source,
        total_value: format_amount(view.snapshot.total_value),
        mean_value: format_amount(view.snapshot.mean_value),
        connected: view.connected,
        last_refresh: view.last_refresh,
        last_error: view.last_error,
        unread_notifications: state.dashboard.unread_count(),
    })
}

async fn snapshot(State(state): State<AppState>) -> Json<AggregateSnapshot> {
    Json(state.dashboard.snapshot())
}

async fn sessions(State(state): State<AppState>) -> Json<Vec<SessionRecord>> {
    Json(state.dashboard.view().sessions)
}

#[derive(serde::Serialize)]
struct NotificationsOut {
    unread_count: usize,
    notifications: Vec<NotificationEvent>,
}

async fn list_notifications(State(state): State<AppState>) -> Json<NotificationsOut> {
    let notifications = state.dashboard.notifications();
    let unread_count = notifications.iter().filter(|n| !n.read).count();
    Json(NotificationsOut {
        unread_count,
        notifications,
    })
}

async fn read_all(State(state): State<AppState>) -> StatusCode {
    state.dashboard.mark_all_read();
    StatusCode::NO_CONTENT
}

async fn read_one(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.dashboard.mark_read(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn delete_one(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    if state.dashboard.delete_notification(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
