use panel_core::{
    config::AppConfig, constants::config::DEFAULT_CONFIG_FILE, database::Database, error::Result,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 运行独立的初始化流程：写入默认配置并创建数据库
pub async fn run_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    info!("🛠️  Server Panel 初始化");
    info!("======================");

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let config = if config_path.exists() && !force {
        warn!("⚠️  配置文件已存在: {}", config_path.display());
        info!("如果要覆盖配置文件，请使用 --force 参数");
        AppConfig::load_from_file(&config_path)?
    } else {
        info!("📋 步骤 1: 创建配置文件");
        let config = AppConfig::default();
        config.save_to_file(&config_path)?;
        info!("   ✅ 创建配置文件: {}", config_path.display());
        config
    };

    info!("📋 步骤 2: 初始化数据库");
    config.ensure_data_dirs()?;
    let db_path = config.get_database_path();
    Database::connect(&db_path).await?;
    info!("   ✅ DuckDB数据库: {}", db_path.display());

    info!("🎉 初始化完成！");
    info!("");
    info!("📝 接下来的步骤:");
    info!("   1️⃣  运行 'panel-cli server add <名称> --folder <目录> --start-command <命令>' 添加服务器");
    info!("   2️⃣  运行 'panel-cli server backup-settings <名称> --path <目录>' 配置备份");
    info!("   3️⃣  运行 'panel-cli serve' 启动 HTTP API 和定时任务调度器");
    info!("");
    info!("💡 提示:");
    info!("   - 配置文件: {} (可手动编辑修改配置)", config_path.display());
    info!("   - 数据库同一时间只允许一个进程写入，serve 运行时请通过 HTTP API 操作");
    info!("   - 使用 'panel-cli --help' 查看所有可用命令");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_init_writes_config_and_database() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("panel.toml");

        let mut config = AppConfig::default();
        config.database.path = dir
            .path()
            .join("data")
            .join("panel.db")
            .to_string_lossy()
            .to_string();
        config.save_to_file(&config_path).unwrap();

        // 已存在时不覆盖，只创建数据库
        run_init(Some(&config_path), false).await.unwrap();
        assert!(dir.path().join("data").join("panel.db").exists());

        let loaded = AppConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.database.path, config.database.path);
    }
}
