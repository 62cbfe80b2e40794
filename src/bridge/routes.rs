use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use crate::supervisor::RestartOutcome;

use super::BridgeState;

#[derive(Debug, Serialize)]
pub struct PortResponse {
    pub port: u16,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

pub fn api_router(state: BridgeState) -> Router {
    Router::new()
        .route("/api/service/port", get(get_port))
        .route("/api/service/restart", post(restart_service))
        .route("/api/window/minimize", post(window_minimize))
        .route("/api/window/maximize", post(window_maximize))
        .route("/api/window/close", post(window_close))
        .route("/api/config", get(get_all_config))
        .route(
            "/api/config/{key}",
            get(get_config).put(set_config).delete(delete_config),
        )
        .with_state(state)
}

/// 0 means the backend is not ready; the UI treats that as "retry".
async fn get_port(State(state): State<BridgeState>) -> Json<PortResponse> {
    Json(PortResponse {
        port: state.supervisor.current_port(),
    })
}

async fn restart_service(State(state): State<BridgeState>) -> Json<RestartOutcome> {
    Json(state.supervisor.restart().await)
}

async fn window_minimize(State(state): State<BridgeState>) -> StatusCode {
    state.window.minimize();
    StatusCode::NO_CONTENT
}

async fn window_maximize(State(state): State<BridgeState>) -> StatusCode {
    state.window.maximize();
    StatusCode::NO_CONTENT
}

async fn window_close(State(state): State<BridgeState>) -> StatusCode {
    state.window.close();
    StatusCode::NO_CONTENT
}

async fn get_all_config(State(state): State<BridgeState>) -> Json<Value> {
    Json(Value::Object(state.store.load().into_iter().collect()))
}

/// Missing keys serialize as JSON null, mirroring an absent entry.
async fn get_config(State(state): State<BridgeState>, Path(key): Path<String>) -> Json<Value> {
    Json(state.store.get(&key).unwrap_or(Value::Null))
}

async fn set_config(
    State(state): State<BridgeState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Json<SuccessResponse> {
    Json(SuccessResponse {
        success: state.store.set(&key, value),
    })
}

async fn delete_config(
    State(state): State<BridgeState>,
    Path(key): Path<String>,
) -> Json<SuccessResponse> {
    Json(SuccessResponse {
        success: state.store.delete(&key),
    })
}
