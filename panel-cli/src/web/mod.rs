use axum::{Json, Router, http::Method};
use panel_core::{PanelService, constants::http::API_PREFIX};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;

pub use error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub panel: PanelService,
}

impl AppState {
    pub fn new(panel: PanelService) -> Self {
        Self { panel }
    }
}

/// 成功响应: `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    let api = Router::new()
        .merge(routes::server_routes::create_servers_router())
        .merge(routes::schedule_routes::create_schedules_router())
        .merge(routes::backup_routes::create_backups_router())
        .merge(routes::file_routes::create_files_router());

    Router::new()
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
