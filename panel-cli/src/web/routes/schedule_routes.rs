use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use panel_core::{
    models::{ScheduleInput, ScheduleRecord},
    panel::ScheduleChange,
    scheduler::ActionOutcome,
};
use std::sync::Arc;

use crate::web::{ApiResponse, ApiResult, AppError, AppState, ok};

async fn list_schedules_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Vec<ScheduleRecord>> {
    Ok(ok(state.panel.list_schedules(&name).await?))
}

async fn create_schedule_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(payload): Json<ScheduleInput>,
) -> Result<(StatusCode, Json<ApiResponse<ScheduleChange>>), AppError> {
    let change = state.panel.create_schedule(&name, payload).await?;
    Ok((StatusCode::CREATED, ok(change)))
}

async fn get_schedule_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<ScheduleRecord> {
    Ok(ok(state.panel.get_schedule(&name, id).await?))
}

async fn update_schedule_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
    Json(payload): Json<ScheduleInput>,
) -> ApiResult<ScheduleChange> {
    Ok(ok(state.panel.update_schedule(&name, id, payload).await?))
}

async fn delete_schedule_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<ScheduleRecord> {
    Ok(ok(state.panel.delete_schedule(&name, id).await?))
}

async fn toggle_schedule_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<ScheduleChange> {
    Ok(ok(state.panel.toggle_schedule(&name, id).await?))
}

/// 手动执行，跳过和失败都以 200 返回，具体结果见 status 字段
async fn execute_schedule_handler(
    State(state): State<Arc<AppState>>,
    Path((name, id)): Path<(String, i64)>,
) -> ApiResult<ActionOutcome> {
    Ok(ok(state.panel.execute_schedule(&name, id).await?))
}

pub fn create_schedules_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/servers/{name}/schedules",
            get(list_schedules_handler).post(create_schedule_handler),
        )
        .route(
            "/servers/{name}/schedules/{id}",
            get(get_schedule_handler)
                .put(update_schedule_handler)
                .delete(delete_schedule_handler),
        )
        .route(
            "/servers/{name}/schedules/{id}/toggle",
            post(toggle_schedule_handler),
        )
        .route(
            "/servers/{name}/schedules/{id}/execute",
            post(execute_schedule_handler),
        )
}
