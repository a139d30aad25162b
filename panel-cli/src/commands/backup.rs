use crate::app::CliApp;
use crate::utils::format_time;
use panel_core::{backup::format_file_size, error::Result};
use tracing::{error, info, warn};

/// 立即创建备份
pub async fn run_backup_create(app: &CliApp, server: &str) -> Result<()> {
    let backup = app.panel.create_backup(server).await?;
    info!("✅ 备份完成: {}", backup.file_name);
    info!("   路径: {}", backup.file_path);
    info!("   大小: {}", format_file_size(backup.file_size));
    Ok(())
}

/// 列出备份（新的在前）
pub async fn run_backup_list(app: &CliApp, server: &str) -> Result<()> {
    let backups = app.panel.list_backups(server).await?;

    if backups.is_empty() {
        info!("📝 服务器 {} 暂无备份", server);
        return Ok(());
    }

    info!("📦 服务器 {} 的备份 ({} 个)", server, backups.len());
    for backup in &backups {
        let exists = backup.path().is_file();
        info!(
            "   [{}] {}  {}  {}{}",
            backup.id,
            backup.file_name,
            format_file_size(backup.file_size),
            format_time(&backup.created_at),
            if exists { "" } else { "  ⚠️ 文件缺失" }
        );
    }
    Ok(())
}

pub async fn run_backup_delete(app: &CliApp, server: &str, id: i64) -> Result<()> {
    let backup = app.panel.delete_backup(server, id).await?;
    info!("🗑️  备份已删除: {}", backup.file_name);
    Ok(())
}

/// 从备份恢复服务器目录
pub async fn run_backup_restore(app: &CliApp, server: &str, id: i64) -> Result<()> {
    warn!("⚠️  恢复会替换服务器目录中的全部内容");
    let backup = app.panel.restore_backup(server, id).await?;
    info!("✅ 服务器 {} 已从 {} 恢复", server, backup.file_name);
    Ok(())
}

pub async fn run_backup_verify(app: &CliApp, server: &str, id: i64) -> Result<()> {
    if app.panel.verify_backup(server, id).await? {
        info!("✅ 备份 {} 完整可读", id);
    } else {
        error!("❌ 备份 {} 文件缺失或已损坏", id);
    }
    Ok(())
}
