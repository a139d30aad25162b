use crate::models::{BackupRecord, NewServer, ScheduleRecord, ServerRecord, ValidSchedule};
use crate::{PanelError, Result};
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

use super::actor::DuckDbActor;
use super::messages::DbMessage;

/// DuckDB数据库管理器
#[derive(Debug, Clone)]
pub struct DuckDbManager {
    sender: mpsc::Sender<DbMessage>,
}

impl DuckDbManager {
    /// 创建新的DuckDB管理器
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // 确保数据库文件的父目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let (sender, receiver) = mpsc::channel(100);

        // 启动DuckDB Actor
        let actor = DuckDbActor::new(db_path)?;
        tokio::spawn(actor.run(receiver));

        let manager = Self { sender };

        // 初始化数据库表
        manager.init_tables().await?;

        Ok(manager)
    }

    /// 创建内存数据库管理器
    pub async fn new_memory() -> Result<Self> {
        let (sender, receiver) = mpsc::channel(100);

        // 启动DuckDB Actor（内存模式）
        let actor = DuckDbActor::new_memory()?;
        tokio::spawn(actor.run(receiver));

        let manager = Self { sender };

        // 初始化数据库表
        manager.init_tables().await?;

        Ok(manager)
    }

    /// 发送消息并等待Actor响应
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> DbMessage,
    ) -> Result<T> {
        let (respond_to, receiver) = oneshot::channel();

        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| PanelError::custom("数据库Actor已关闭"))?;

        receiver
            .await
            .map_err(|_| PanelError::custom("等待数据库响应超时"))?
    }

    /// 初始化数据库表
    async fn init_tables(&self) -> Result<()> {
        self.call(|respond_to| DbMessage::InitTables { respond_to })
            .await
    }

    // ========== 服务器 ==========

    pub async fn create_server(&self, server: NewServer, max_backups: u32) -> Result<i64> {
        self.call(|respond_to| DbMessage::CreateServer {
            server,
            max_backups,
            respond_to,
        })
        .await
    }

    pub async fn get_server(&self, id: i64) -> Result<Option<ServerRecord>> {
        self.call(|respond_to| DbMessage::GetServer { id, respond_to })
            .await
    }

    pub async fn get_server_by_name(&self, name: &str) -> Result<Option<ServerRecord>> {
        self.call(|respond_to| DbMessage::GetServerByName {
            name: name.to_string(),
            respond_to,
        })
        .await
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>> {
        self.call(|respond_to| DbMessage::ListServers { respond_to })
            .await
    }

    pub async fn update_backup_settings(
        &self,
        server_id: i64,
        backup_path: &str,
        max_backups: u32,
    ) -> Result<()> {
        self.call(|respond_to| DbMessage::UpdateBackupSettings {
            server_id,
            backup_path: backup_path.to_string(),
            max_backups,
            respond_to,
        })
        .await
    }

    // ========== 定时任务 ==========

    pub async fn create_schedule(&self, server_id: i64, schedule: ValidSchedule) -> Result<i64> {
        self.call(|respond_to| DbMessage::CreateSchedule {
            server_id,
            schedule,
            respond_to,
        })
        .await
    }

    pub async fn get_schedule(&self, id: i64) -> Result<Option<ScheduleRecord>> {
        self.call(|respond_to| DbMessage::GetSchedule { id, respond_to })
            .await
    }

    pub async fn list_schedules(&self, server_id: i64) -> Result<Vec<ScheduleRecord>> {
        self.call(|respond_to| DbMessage::ListSchedules {
            server_id,
            respond_to,
        })
        .await
    }

    pub async fn list_enabled_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        self.call(|respond_to| DbMessage::ListEnabledSchedules { respond_to })
            .await
    }

    pub async fn save_schedule(&self, id: i64, schedule: ValidSchedule) -> Result<bool> {
        self.call(|respond_to| DbMessage::SaveSchedule {
            id,
            schedule,
            respond_to,
        })
        .await
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<bool> {
        self.call(|respond_to| DbMessage::DeleteSchedule { id, respond_to })
            .await
    }

    // ========== 备份 ==========

    pub async fn create_backup_record(
        &self,
        server_id: i64,
        file_name: &str,
        file_path: &str,
        file_size: u64,
    ) -> Result<i64> {
        self.call(|respond_to| DbMessage::CreateBackupRecord {
            server_id,
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            file_size,
            respond_to,
        })
        .await
    }

    pub async fn get_backup(&self, id: i64) -> Result<Option<BackupRecord>> {
        self.call(|respond_to| DbMessage::GetBackup { id, respond_to })
            .await
    }

    pub async fn list_backups(&self, server_id: i64) -> Result<Vec<BackupRecord>> {
        self.call(|respond_to| DbMessage::ListBackups {
            server_id,
            respond_to,
        })
        .await
    }

    pub async fn count_backups(&self, server_id: i64) -> Result<u64> {
        self.call(|respond_to| DbMessage::CountBackups {
            server_id,
            respond_to,
        })
        .await
    }

    pub async fn oldest_backup(&self, server_id: i64) -> Result<Option<BackupRecord>> {
        self.call(|respond_to| DbMessage::OldestBackup {
            server_id,
            respond_to,
        })
        .await
    }

    pub async fn delete_backup_record(&self, id: i64) -> Result<bool> {
        self.call(|respond_to| DbMessage::DeleteBackupRecord { id, respond_to })
            .await
    }
}
