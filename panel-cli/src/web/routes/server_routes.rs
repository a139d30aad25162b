use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use panel_core::{
    models::{NewServer, ServerRecord},
    panel::BackupSettings,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::web::{ApiResponse, ApiResult, AppError, AppState, ok};

// --- Request/Response Structs ---

#[derive(Serialize)]
pub struct ServerStatus {
    #[serde(flatten)]
    server: ServerRecord,
    running: bool,
}

#[derive(Deserialize)]
pub struct BackupSettingsRequest {
    backup_path: String,
    max_backups: u32,
}

#[derive(Deserialize)]
pub struct CommandRequest {
    command: String,
}

// --- Route Handlers ---

async fn list_servers_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<ServerRecord>> {
    Ok(ok(state.panel.list_servers().await?))
}

async fn create_server_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewServer>,
) -> Result<(StatusCode, Json<ApiResponse<ServerRecord>>), AppError> {
    let server = state.panel.create_server(payload).await?;
    Ok((StatusCode::CREATED, ok(server)))
}

async fn get_server_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<ServerStatus> {
    let server = state.panel.get_server(&name).await?;
    let running = state.panel.is_server_running(&name).await?;
    Ok(ok(ServerStatus { server, running }))
}

async fn get_backup_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<BackupSettings> {
    Ok(ok(state.panel.backup_settings(&name).await?))
}

async fn update_backup_settings_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<BackupSettingsRequest>,
) -> ApiResult<ServerRecord> {
    let server = state
        .panel
        .update_backup_settings(&name, &payload.backup_path, payload.max_backups)
        .await?;
    Ok(ok(server))
}

async fn start_server_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<()> {
    state.panel.start_server(&name).await?;
    Ok(ok(()))
}

async fn stop_server_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<()> {
    state.panel.stop_server(&name).await?;
    Ok(ok(()))
}

async fn restart_server_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<()> {
    state.panel.restart_server(&name).await?;
    Ok(ok(()))
}

async fn send_command_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<CommandRequest>,
) -> ApiResult<()> {
    if payload.command.trim().is_empty() {
        return Err(AppError::InvalidInput("命令不能为空".to_string()));
    }
    state.panel.send_command(&name, &payload.command).await?;
    Ok(ok(()))
}

pub fn create_servers_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/servers",
            get(list_servers_handler).post(create_server_handler),
        )
        .route("/servers/{name}", get(get_server_handler))
        .route(
            "/servers/{name}/backups/settings",
            get(get_backup_settings_handler).post(update_backup_settings_handler),
        )
        .route("/servers/{name}/start", post(start_server_handler))
        .route("/servers/{name}/stop", post(stop_server_handler))
        .route("/servers/{name}/restart", post(restart_server_handler))
        .route("/servers/{name}/command", post(send_command_handler))
}
