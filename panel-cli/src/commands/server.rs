use crate::app::CliApp;
use crate::utils::format_time;
use panel_core::{error::Result, models::NewServer};
use std::path::PathBuf;
use tracing::{info, warn};

/// 添加受管服务器
pub async fn run_server_add(
    app: &CliApp,
    name: String,
    folder: PathBuf,
    start_command: String,
    stop_command: Option<String>,
) -> Result<()> {
    // 数据库中保存绝对路径，避免工作目录不同导致找不到服务器目录
    let folder = std::path::absolute(&folder).unwrap_or(folder);

    let server = app
        .panel
        .create_server(NewServer {
            name,
            folder_path: folder.to_string_lossy().to_string(),
            start_command,
            stop_command,
        })
        .await?;

    info!("✅ 服务器已添加: {} (ID: {})", server.name, server.id);
    info!("   目录: {}", server.folder_path);
    info!(
        "💡 设置备份目录: panel-cli server backup-settings {} --path <目录>",
        server.name
    );
    Ok(())
}

/// 列出所有服务器
pub async fn run_server_list(app: &CliApp) -> Result<()> {
    let servers = app.panel.list_servers().await?;

    if servers.is_empty() {
        info!("📝 暂无服务器");
        info!("💡 添加服务器: panel-cli server add <名称> --folder <目录> --start-command <命令>");
        return Ok(());
    }

    info!("🖥️  服务器列表 ({} 个)", servers.len());
    for server in &servers {
        info!(
            "   [{}] {}  目录: {}  启动命令: {}",
            server.id, server.name, server.folder_path, server.start_command
        );
        match server.backup_dir() {
            Some(dir) => info!(
                "        备份: {} (最多 {} 个)  创建于 {}",
                dir.display(),
                server.max_backups,
                format_time(&server.created_at)
            ),
            None => info!(
                "        备份: 未配置  创建于 {}",
                format_time(&server.created_at)
            ),
        }
    }
    Ok(())
}

/// 查看或修改备份设置
pub async fn run_backup_settings(
    app: &CliApp,
    name: &str,
    path: Option<String>,
    max_backups: Option<u32>,
) -> Result<()> {
    let settings = app.panel.backup_settings(name).await?;

    if path.is_none() && max_backups.is_none() {
        info!("💾 服务器 {} 的备份设置", name);
        info!(
            "   备份目录: {}",
            settings.backup_path.as_deref().unwrap_or("未配置")
        );
        info!(
            "   最多保留: {} 个 (上限 {})",
            settings.max_backups, settings.max_backups_limit
        );
        return Ok(());
    }

    let Some(path) = path.or(settings.backup_path) else {
        warn!("⚠️  服务器 {} 尚未配置备份目录，请通过 --path 指定", name);
        return Ok(());
    };
    let max_backups = max_backups.unwrap_or(settings.max_backups);

    let server = app
        .panel
        .update_backup_settings(name, &path, max_backups)
        .await?;
    info!(
        "✅ 备份设置已更新: {} -> {} (最多 {} 个)",
        server.name,
        server.backup_path.as_deref().unwrap_or_default(),
        server.max_backups
    );
    Ok(())
}
