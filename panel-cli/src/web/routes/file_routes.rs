use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::web::{ApiResult, AppState, ok};

#[derive(Deserialize)]
pub struct ExtractRequest {
    /// 相对于服务器目录的归档路径
    archive: String,
    /// 相对于服务器目录的目标目录，省略时解压到服务器目录
    #[serde(default)]
    dest: String,
}

#[derive(Serialize)]
pub struct ExtractResult {
    dest: String,
}

async fn extract_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<ExtractRequest>,
) -> ApiResult<ExtractResult> {
    let dest = state
        .panel
        .extract_in_server(&name, &payload.archive, &payload.dest)
        .await?;
    Ok(ok(ExtractResult {
        dest: dest.to_string_lossy().to_string(),
    }))
}

pub fn create_files_router() -> Router<Arc<AppState>> {
    Router::new().route("/servers/{name}/files/extract", post(extract_handler))
}
