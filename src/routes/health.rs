use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine();
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "vision": {
            "workers": engine.size(),
            "idleWorkers": engine.available(),
            "streams": state.ws_connections(),
        }
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready while the worker pool accepts frames.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if !state.engine().is_closed() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "vision": state.engine().metrics().snapshot(),
    }))
}
