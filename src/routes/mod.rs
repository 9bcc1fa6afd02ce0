pub mod health;
pub mod vision;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};

use crate::middleware::request_id;
use crate::response::ErrorBody;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // base64 帧体积约为原图的 4/3，限制作用于整个 JSON 请求体
    let max_body = state.config().limits.max_frame_bytes;

    Router::new()
        .nest(
            "/vision",
            vision::router().layer(DefaultBodyLimit::max(max_body)),
        )
        .nest("/health", health::router())
        .fallback(fallback_404)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            code: "NOT_FOUND".to_string(),
            message: "Not found".to_string(),
            trace_id: None,
        }),
    )
}
