use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use panel_core::models::BackupRecord;
use serde::Serialize;
use std::sync::Arc;

use crate::web::{ApiResponse, ApiResult, AppError, AppState, ok};

#[derive(Serialize)]
pub struct VerifyResult {
    valid: bool,
}

async fn list_backups_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Vec<BackupRecord>> {
    Ok(ok(state.panel.list_backups(&name).await?))
}

async fn create_backup_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<BackupRecord>>), AppError> {
    let backup = state.panel.create_backup(&name).await?;
    Ok((StatusCode::CREATED, ok(backup)))
}

async fn delete_backup_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<BackupRecord> {
    Ok(ok(state.panel.delete_backup(&name, id).await?))
}

/// 服务器运行中时返回 409
async fn restore_backup_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<BackupRecord> {
    Ok(ok(state.panel.restore_backup(&name, id).await?))
}

async fn verify_backup_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<VerifyResult> {
    let valid = state.panel.verify_backup(&name, id).await?;
    Ok(ok(VerifyResult { valid }))
}

pub fn create_backups_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/servers/{name}/backups",
            get(list_backups_handler).post(create_backup_handler),
        )
        .route("/servers/{name}/backups/{id}", delete(delete_backup_handler))
        .route(
            "/servers/{name}/backups/{id}/restore",
            post(restore_backup_handler),
        )
        .route(
            "/servers/{name}/backups/{id}/verify",
            get(verify_backup_handler),
        )
}
