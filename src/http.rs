use crate::collectors::Scanner;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Json, Router};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct HttpAppState {
    /// Locked for the whole scan so requests never overlap.
    pub scanner: Arc<Mutex<Scanner>>,
}

pub fn build_router(scanner: Arc<Mutex<Scanner>>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/snapshot", get(snapshot_handler))
        .with_state(HttpAppState { scanner })
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn snapshot_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let scanner = state.scanner.lock().await;
    Json(scanner.scan().await)
}
