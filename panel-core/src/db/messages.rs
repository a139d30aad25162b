use crate::Result;
use crate::models::{BackupRecord, NewServer, ScheduleRecord, ServerRecord, ValidSchedule};
use tokio::sync::oneshot;

/// DuckDB数据库操作消息
#[derive(Debug)]
pub enum DbMessage {
    /// 初始化数据库表
    InitTables {
        respond_to: oneshot::Sender<Result<()>>,
    },

    // ========== 服务器 ==========
    /// 创建服务器
    CreateServer {
        server: NewServer,
        max_backups: u32,
        respond_to: oneshot::Sender<Result<i64>>,
    },
    /// 按ID获取服务器
    GetServer {
        id: i64,
        respond_to: oneshot::Sender<Result<Option<ServerRecord>>>,
    },
    /// 按名称获取服务器
    GetServerByName {
        name: String,
        respond_to: oneshot::Sender<Result<Option<ServerRecord>>>,
    },
    /// 列出全部服务器
    ListServers {
        respond_to: oneshot::Sender<Result<Vec<ServerRecord>>>,
    },
    /// 更新备份设置
    UpdateBackupSettings {
        server_id: i64,
        backup_path: String,
        max_backups: u32,
        respond_to: oneshot::Sender<Result<()>>,
    },

    // ========== 定时任务 ==========
    /// 创建定时任务
    CreateSchedule {
        server_id: i64,
        schedule: ValidSchedule,
        respond_to: oneshot::Sender<Result<i64>>,
    },
    /// 按ID获取定时任务
    GetSchedule {
        id: i64,
        respond_to: oneshot::Sender<Result<Option<ScheduleRecord>>>,
    },
    /// 列出服务器的定时任务
    ListSchedules {
        server_id: i64,
        respond_to: oneshot::Sender<Result<Vec<ScheduleRecord>>>,
    },
    /// 列出所有启用的定时任务
    ListEnabledSchedules {
        respond_to: oneshot::Sender<Result<Vec<ScheduleRecord>>>,
    },
    /// 保存定时任务（整行更新）
    SaveSchedule {
        id: i64,
        schedule: ValidSchedule,
        respond_to: oneshot::Sender<Result<bool>>,
    },
    /// 删除定时任务
    DeleteSchedule {
        id: i64,
        respond_to: oneshot::Sender<Result<bool>>,
    },

    // ========== 备份 ==========
    /// 创建备份记录
    CreateBackupRecord {
        server_id: i64,
        file_name: String,
        file_path: String,
        file_size: u64,
        respond_to: oneshot::Sender<Result<i64>>,
    },
    /// 按ID获取备份
    GetBackup {
        id: i64,
        respond_to: oneshot::Sender<Result<Option<BackupRecord>>>,
    },
    /// 列出服务器的备份
    ListBackups {
        server_id: i64,
        respond_to: oneshot::Sender<Result<Vec<BackupRecord>>>,
    },
    /// 统计服务器的备份数量
    CountBackups {
        server_id: i64,
        respond_to: oneshot::Sender<Result<u64>>,
    },
    /// 获取服务器最早的备份
    OldestBackup {
        server_id: i64,
        respond_to: oneshot::Sender<Result<Option<BackupRecord>>>,
    },
    /// 删除备份记录
    DeleteBackupRecord {
        id: i64,
        respond_to: oneshot::Sender<Result<bool>>,
    },
}
