use crate::backup::BackupManager;
use crate::database::Database;
use crate::models::{ScheduleAction, ScheduleRecord, ServerRecord};
use crate::supervisor::ProcessSupervisor;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 一次执行的结果
///
/// 前置条件不满足属于跳过而不是错误；失败只记录日志，不会重试。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Executed { message: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl ActionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, ActionOutcome::Executed { .. })
    }
}

/// 定时任务动作执行器
#[derive(Clone)]
pub struct ActionDispatcher {
    database: Database,
    supervisor: Arc<dyn ProcessSupervisor>,
    backups: BackupManager,
}

impl ActionDispatcher {
    pub fn new(
        database: Database,
        supervisor: Arc<dyn ProcessSupervisor>,
        backups: BackupManager,
    ) -> Self {
        Self {
            database,
            supervisor,
            backups,
        }
    }

    /// 执行定时任务的动作
    pub async fn dispatch(&self, schedule: &ScheduleRecord) -> ActionOutcome {
        info!(
            "⏰ 执行定时任务: {} (ID: {}, 动作: {})",
            schedule.name, schedule.id, schedule.action
        );

        let server = match self.database.require_server(schedule.server_id).await {
            Ok(server) => server,
            Err(e) => {
                error!("❌ 定时任务 {}: 获取服务器失败: {}", schedule.id, e);
                return ActionOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let outcome = match schedule.action {
            ScheduleAction::SendCommand => self.send_command(&server, schedule).await,
            ScheduleAction::StartServer => self.start_server(&server).await,
            ScheduleAction::RestartServer => self.restart_server(&server).await,
            ScheduleAction::StopServer => self.stop_server(&server).await,
            ScheduleAction::Backup => self.backup(&server).await,
        };

        match &outcome {
            ActionOutcome::Executed { message } => {
                info!("✅ 定时任务 {}: {}", schedule.id, message)
            }
            ActionOutcome::Skipped { reason } => {
                warn!("⚠️  定时任务 {}: {}", schedule.id, reason)
            }
            ActionOutcome::Failed { error } => {
                error!("❌ 定时任务 {}: {}", schedule.id, error)
            }
        }
        outcome
    }

    async fn send_command(&self, server: &ServerRecord, schedule: &ScheduleRecord) -> ActionOutcome {
        if !self.supervisor.is_server_running(server).await {
            return ActionOutcome::Skipped {
                reason: format!("服务器 {} 未运行，跳过命令", server.name),
            };
        }

        let Some(command) = schedule.command.as_deref() else {
            return ActionOutcome::Failed {
                error: "send_command 动作缺少命令".to_string(),
            };
        };

        match self.supervisor.send_command(server, command).await {
            Ok(()) => ActionOutcome::Executed {
                message: format!("已向 {} 发送命令: {}", server.name, command),
            },
            Err(e) => ActionOutcome::Failed {
                error: format!("向 {} 发送命令失败: {}", server.name, e),
            },
        }
    }

    async fn start_server(&self, server: &ServerRecord) -> ActionOutcome {
        if self.supervisor.is_server_running(server).await {
            return ActionOutcome::Skipped {
                reason: format!("服务器 {} 已在运行，跳过启动", server.name),
            };
        }

        match self.supervisor.start_server(server).await {
            Ok(()) => ActionOutcome::Executed {
                message: format!("服务器 {} 已启动", server.name),
            },
            Err(e) => ActionOutcome::Failed {
                error: format!("启动服务器 {} 失败: {}", server.name, e),
            },
        }
    }

    async fn restart_server(&self, server: &ServerRecord) -> ActionOutcome {
        if !self.supervisor.is_server_running(server).await {
            return ActionOutcome::Skipped {
                reason: format!("服务器 {} 未运行，跳过重启", server.name),
            };
        }

        match self.supervisor.restart_server(server).await {
            Ok(()) => ActionOutcome::Executed {
                message: format!("服务器 {} 已重启", server.name),
            },
            Err(e) => ActionOutcome::Failed {
                error: format!("重启服务器 {} 失败: {}", server.name, e),
            },
        }
    }

    async fn stop_server(&self, server: &ServerRecord) -> ActionOutcome {
        if !self.supervisor.is_server_running(server).await {
            return ActionOutcome::Skipped {
                reason: format!("服务器 {} 已停止，跳过停止", server.name),
            };
        }

        match self.supervisor.stop_server(server).await {
            Ok(()) => ActionOutcome::Executed {
                message: format!("服务器 {} 已停止", server.name),
            },
            Err(e) => ActionOutcome::Failed {
                error: format!("停止服务器 {} 失败: {}", server.name, e),
            },
        }
    }

    async fn backup(&self, server: &ServerRecord) -> ActionOutcome {
        if server.backup_dir().is_none() {
            return ActionOutcome::Skipped {
                reason: format!("服务器 {} 未配置备份目录，跳过备份", server.name),
            };
        }

        match self.backups.create_backup(server).await {
            Ok(record) => ActionOutcome::Executed {
                message: format!("服务器 {} 备份完成: {}", server.name, record.file_name),
            },
            Err(e) => ActionOutcome::Failed {
                error: format!("服务器 {} 备份失败: {}", server.name, e),
            },
        }
    }
}
