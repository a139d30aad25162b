use crate::constants::{backup, config, http, supervisor};
use crate::error::{PanelError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 应用配置结构
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub backup: BackupConfig,
    pub supervisor: SupervisorConfig,
}

/// 数据库相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

/// HTTP服务配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind: String,
}

/// 备份相关配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupConfig {
    pub max_backups_limit: u32,
    pub default_max_backups: u32,
}

/// 进程管理配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SupervisorConfig {
    pub stop_timeout_secs: u64,
    pub shell: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: config::get_default_database_path()
                    .to_string_lossy()
                    .to_string(),
            },
            http: HttpConfig {
                bind: http::DEFAULT_BIND.to_string(),
            },
            backup: BackupConfig {
                max_backups_limit: backup::DEFAULT_MAX_BACKUPS_LIMIT,
                default_max_backups: backup::DEFAULT_MAX_BACKUPS,
            },
            supervisor: SupervisorConfig {
                stop_timeout_secs: supervisor::DEFAULT_STOP_TIMEOUT_SECS,
                shell: supervisor::DEFAULT_SHELL.to_string(),
            },
        }
    }
}

impl AppConfig {
    /// 智能查找并加载配置文件
    /// 按优先级查找：panel.toml -> config.toml -> .panel.toml
    pub fn find_and_load_config() -> Result<Self> {
        for config_file in &config::CONFIG_FILE_CANDIDATES {
            if Path::new(config_file).exists() {
                tracing::info!("找到配置文件: {}", config_file);
                return Self::load_from_file(config_file);
            }
        }

        // 如果没找到配置文件，创建默认配置
        tracing::warn!("未找到配置文件，创建默认配置: {}", config::DEFAULT_CONFIG_FILE);
        let default_config = Self::default();
        default_config.save_to_file(config::DEFAULT_CONFIG_FILE)?;
        Ok(default_config)
    }

    /// 从指定文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_with_comments();
        fs::write(&path, content)?;
        Ok(())
    }

    /// 生成带注释的TOML配置
    fn to_toml_with_comments(&self) -> String {
        const TEMPLATE: &str = include_str!("../templates/config.toml.template");

        TEMPLATE
            .replace("{database_path}", &self.database.path)
            .replace("{http_bind}", &self.http.bind)
            .replace(
                "{max_backups_limit}",
                &self.backup.max_backups_limit.to_string(),
            )
            .replace(
                "{default_max_backups}",
                &self.backup.default_max_backups.to_string(),
            )
            .replace(
                "{stop_timeout_secs}",
                &self.supervisor.stop_timeout_secs.to_string(),
            )
            .replace("{shell}", &self.supervisor.shell)
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        if self.backup.max_backups_limit == 0 {
            return Err(PanelError::validation("backup.max_backups_limit 必须大于 0"));
        }
        if self.backup.default_max_backups == 0
            || self.backup.default_max_backups > self.backup.max_backups_limit
        {
            return Err(PanelError::validation(format!(
                "backup.default_max_backups 必须在 1-{} 之间",
                self.backup.max_backups_limit
            )));
        }
        if self.supervisor.shell.trim().is_empty() {
            return Err(PanelError::validation("supervisor.shell 不能为空"));
        }
        Ok(())
    }

    /// 确保数据目录存在
    pub fn ensure_data_dirs(&self) -> Result<()> {
        if let Some(parent) = self.get_database_path().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// 获取数据库文件路径
    pub fn get_database_path(&self) -> PathBuf {
        PathBuf::from(&self.database.path)
    }
}
