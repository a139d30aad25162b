use crate::cron::CronSpec;
use crate::error::{PanelError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 受管服务器
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerRecord {
    pub id: i64,
    pub name: String,
    pub folder_path: String,
    pub start_command: String,
    pub stop_command: Option<String>,
    pub backup_path: Option<String>,
    pub max_backups: u32,
    pub created_at: DateTime<Utc>,
}

impl ServerRecord {
    pub fn folder(&self) -> PathBuf {
        PathBuf::from(&self.folder_path)
    }

    /// 已配置的备份目录（空字符串视为未配置）
    pub fn backup_dir(&self) -> Option<PathBuf> {
        self.backup_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

/// 新建服务器参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewServer {
    pub name: String,
    pub folder_path: String,
    pub start_command: String,
    #[serde(default)]
    pub stop_command: Option<String>,
}

/// 定时任务动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleAction {
    SendCommand,
    StartServer,
    RestartServer,
    StopServer,
    Backup,
}

impl ScheduleAction {
    pub const ALL: [ScheduleAction; 5] = [
        ScheduleAction::SendCommand,
        ScheduleAction::StartServer,
        ScheduleAction::RestartServer,
        ScheduleAction::StopServer,
        ScheduleAction::Backup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleAction::SendCommand => "send_command",
            ScheduleAction::StartServer => "start_server",
            ScheduleAction::RestartServer => "restart_server",
            ScheduleAction::StopServer => "stop_server",
            ScheduleAction::Backup => "backup",
        }
    }

    pub fn requires_command(&self) -> bool {
        matches!(self, ScheduleAction::SendCommand)
    }
}

impl fmt::Display for ScheduleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleAction {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self> {
        ScheduleAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| {
                PanelError::validation(format!(
                    "无效的动作 '{s}'，可选值: send_command, start_server, restart_server, stop_server, backup"
                ))
            })
    }
}

/// 定时任务记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRecord {
    pub id: i64,
    pub server_id: i64,
    pub name: String,
    #[serde(flatten)]
    pub cron: CronSpec,
    pub action: ScheduleAction,
    pub command: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleRecord {
    pub fn cron_expression(&self) -> String {
        self.cron.expression()
    }
}

fn default_enabled() -> bool {
    true
}

/// 创建/更新定时任务的原始输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub name: String,
    #[serde(flatten)]
    pub cron: CronSpec,
    pub action: String,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// 校验通过的定时任务字段
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSchedule {
    pub name: String,
    pub cron: CronSpec,
    pub action: ScheduleAction,
    pub command: Option<String>,
    pub enabled: bool,
}

impl ScheduleInput {
    /// 校验全部字段，任何状态变更之前调用
    ///
    /// 非 send_command 动作的命令文本会被清空。
    pub fn validate(self) -> Result<ValidSchedule> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(PanelError::validation("定时任务名称不能为空"));
        }

        let action = self.action.trim().parse::<ScheduleAction>()?;
        self.cron.validate()?;

        let command = if action.requires_command() {
            let command = self
                .command
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .ok_or_else(|| PanelError::validation("send_command 动作必须提供命令"))?;
            Some(command)
        } else {
            None
        };

        Ok(ValidSchedule {
            name,
            cron: self.cron,
            action,
            command,
            enabled: self.enabled,
        })
    }
}

/// 备份记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupRecord {
    pub id: i64,
    pub server_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl BackupRecord {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.file_path)
    }
}
