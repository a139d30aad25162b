use crate::app::CliApp;
use crate::web::{self, AppState};
use panel_core::{constants::http::API_PREFIX, error::Result};
use std::sync::Arc;
use tracing::{error, info};

/// 启动 HTTP API 并运行定时任务调度器，Ctrl-C 后优雅退出
pub async fn run_serve(app: &CliApp, bind: Option<String>) -> Result<()> {
    let panel = app.panel.clone();

    let loaded = panel.load_schedules().await?;
    info!("⏰ 调度器已启动，{} 个定时任务生效", loaded);

    let addr = bind.unwrap_or_else(|| app.config.http.bind.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 HTTP API 已启动: http://{}{}", addr, API_PREFIX);

    let router = web::create_router(Arc::new(AppState::new(panel.clone())));
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("⏹️  正在停止调度器和受管进程...");
    panel.shutdown().await;
    served?;

    info!("👋 已退出");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("❌ 监听退出信号失败: {}", e);
    }
}
