//! 面板服务：对外暴露服务器、定时任务、备份和归档操作
//!
//! HTTP 接口和命令行都只通过这里访问核心功能。

use crate::archive;
use crate::backup::{self, BackupManager};
use crate::config::AppConfig;
use crate::database::Database;
use crate::error::{PanelError, Result};
use crate::models::{
    BackupRecord, NewServer, ScheduleInput, ScheduleRecord, ServerRecord, ValidSchedule,
};
use crate::scheduler::{ActionDispatcher, ActionOutcome, ScheduleService};
use crate::supervisor::{LocalSupervisor, ProcessSupervisor};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// 创建、更新或切换定时任务后的结果
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleChange {
    pub schedule: ScheduleRecord,
    /// 调度器中是否存在对应条目
    pub registered: bool,
}

/// 服务器备份设置
#[derive(Debug, Clone, Serialize)]
pub struct BackupSettings {
    pub backup_path: Option<String>,
    pub max_backups: u32,
    pub max_backups_limit: u32,
}

#[derive(Clone)]
pub struct PanelService {
    database: Database,
    config: AppConfig,
    supervisor: Arc<dyn ProcessSupervisor>,
    backups: BackupManager,
    scheduler: Arc<ScheduleService>,
}

impl PanelService {
    pub fn new(
        database: Database,
        config: AppConfig,
        supervisor: Arc<dyn ProcessSupervisor>,
    ) -> Self {
        let backups = BackupManager::new(database.clone());
        let dispatcher =
            ActionDispatcher::new(database.clone(), supervisor.clone(), backups.clone());
        let scheduler = Arc::new(ScheduleService::new(database.clone(), dispatcher));

        Self {
            database,
            config,
            supervisor,
            backups,
            scheduler,
        }
    }

    /// 按配置打开数据库并使用本机进程管理
    pub async fn open(config: AppConfig) -> Result<Self> {
        config.ensure_data_dirs()?;
        let database = Database::connect(config.get_database_path()).await?;
        let supervisor = Arc::new(LocalSupervisor::new(&config.supervisor));
        Ok(Self::new(database, config, supervisor))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn scheduler(&self) -> &Arc<ScheduleService> {
        &self.scheduler
    }

    /// 启动时注册全部启用的定时任务
    pub async fn load_schedules(&self) -> Result<usize> {
        self.scheduler.load_all().await
    }

    /// 停止调度器和全部受管进程
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        self.supervisor.stop_all().await;
    }

    // ========== 服务器 ==========

    pub async fn create_server(&self, server: NewServer) -> Result<ServerRecord> {
        let name = server.name.trim().to_string();
        if name.is_empty() {
            return Err(PanelError::validation("服务器名称不能为空"));
        }
        if name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(PanelError::validation(format!("服务器名称无效: {name}")));
        }
        if server.start_command.trim().is_empty() {
            return Err(PanelError::validation("启动命令不能为空"));
        }
        if !Path::new(&server.folder_path).is_dir() {
            return Err(PanelError::validation(format!(
                "服务器目录不存在: {}",
                server.folder_path
            )));
        }
        if self.database.get_server_by_name(&name).await?.is_some() {
            return Err(PanelError::conflict(format!("服务器 {name} 已存在")));
        }

        let stop_command = server
            .stop_command
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let record = self
            .database
            .create_server(
                NewServer {
                    name,
                    folder_path: server.folder_path,
                    start_command: server.start_command.trim().to_string(),
                    stop_command,
                },
                self.config.backup.default_max_backups,
            )
            .await?;

        info!("服务器已创建: {} (ID: {})", record.name, record.id);
        Ok(record)
    }

    pub async fn get_server(&self, name: &str) -> Result<ServerRecord> {
        self.database.require_server_by_name(name).await
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>> {
        self.database.list_servers().await
    }

    pub async fn backup_settings(&self, name: &str) -> Result<BackupSettings> {
        let server = self.get_server(name).await?;
        Ok(BackupSettings {
            backup_path: server.backup_path,
            max_backups: server.max_backups,
            max_backups_limit: self.config.backup.max_backups_limit,
        })
    }

    /// 更新备份目录和保留数量，目录不存在时会被创建
    pub async fn update_backup_settings(
        &self,
        name: &str,
        backup_path: &str,
        max_backups: u32,
    ) -> Result<ServerRecord> {
        let server = self.get_server(name).await?;

        let backup_path = backup_path.trim();
        if backup_path.is_empty() {
            return Err(PanelError::validation("备份目录不能为空"));
        }
        let limit = self.config.backup.max_backups_limit;
        if max_backups == 0 || max_backups > limit {
            return Err(PanelError::validation(format!(
                "最大备份数必须在 1-{limit} 之间"
            )));
        }

        let path = backup::validate_backup_path(Path::new(backup_path)).await?;
        if backup::is_inside(&path, &server.folder()) {
            return Err(PanelError::validation(format!(
                "备份目录不能位于服务器目录内: {backup_path}"
            )));
        }
        let record = self
            .database
            .update_backup_settings(server.id, &path.to_string_lossy(), max_backups)
            .await?;

        info!(
            "服务器 {} 备份设置已更新: {} (最多 {} 个)",
            record.name, backup_path, max_backups
        );
        Ok(record)
    }

    pub async fn is_server_running(&self, name: &str) -> Result<bool> {
        let server = self.get_server(name).await?;
        Ok(self.supervisor.is_server_running(&server).await)
    }

    pub async fn start_server(&self, name: &str) -> Result<()> {
        let server = self.get_server(name).await?;
        self.supervisor.start_server(&server).await
    }

    pub async fn stop_server(&self, name: &str) -> Result<()> {
        let server = self.get_server(name).await?;
        self.supervisor.stop_server(&server).await
    }

    pub async fn restart_server(&self, name: &str) -> Result<()> {
        let server = self.get_server(name).await?;
        self.supervisor.restart_server(&server).await
    }

    pub async fn send_command(&self, name: &str, command: &str) -> Result<()> {
        let command = command.trim();
        if command.is_empty() {
            return Err(PanelError::validation("命令不能为空"));
        }
        let server = self.get_server(name).await?;
        self.supervisor.send_command(&server, command).await
    }

    // ========== 定时任务 ==========

    pub async fn list_schedules(&self, name: &str) -> Result<Vec<ScheduleRecord>> {
        let server = self.get_server(name).await?;
        self.database.list_schedules(server.id).await
    }

    /// 获取属于该服务器的定时任务
    pub async fn get_schedule(&self, name: &str, schedule_id: i64) -> Result<ScheduleRecord> {
        let server = self.get_server(name).await?;
        self.owned_schedule(&server, schedule_id).await
    }

    /// 先校验再持久化，最后注册到调度器
    ///
    /// 注册失败只记录日志，记录保留，结果中 registered 为 false。
    pub async fn create_schedule(&self, name: &str, input: ScheduleInput) -> Result<ScheduleChange> {
        let schedule = input.validate()?;
        let server = self.get_server(name).await?;

        let record = self.database.create_schedule(server.id, schedule).await?;
        info!("定时任务已创建: {} (ID: {})", record.name, record.id);

        if let Err(e) = self.scheduler.add(&record).await {
            error!("定时任务 {} 已创建，但注册到调度器失败: {}", record.id, e);
        }
        self.change(record).await
    }

    pub async fn update_schedule(
        &self,
        name: &str,
        schedule_id: i64,
        input: ScheduleInput,
    ) -> Result<ScheduleChange> {
        let schedule = input.validate()?;
        let server = self.get_server(name).await?;
        self.owned_schedule(&server, schedule_id).await?;

        let record = self.database.save_schedule(schedule_id, schedule).await?;
        info!("定时任务已更新: {} (ID: {})", record.name, record.id);
        self.sync_scheduler(record).await
    }

    /// 切换启用状态
    pub async fn toggle_schedule(&self, name: &str, schedule_id: i64) -> Result<ScheduleChange> {
        let server = self.get_server(name).await?;
        let current = self.owned_schedule(&server, schedule_id).await?;

        let schedule = ValidSchedule {
            name: current.name,
            cron: current.cron,
            action: current.action,
            command: current.command,
            enabled: !current.enabled,
        };
        let record = self.database.save_schedule(schedule_id, schedule).await?;
        info!(
            "定时任务 {} 已{}",
            record.id,
            if record.enabled { "启用" } else { "禁用" }
        );
        self.sync_scheduler(record).await
    }

    /// 先从调度器注销，再删除记录
    pub async fn delete_schedule(&self, name: &str, schedule_id: i64) -> Result<ScheduleRecord> {
        let server = self.get_server(name).await?;
        let record = self.owned_schedule(&server, schedule_id).await?;

        self.scheduler.remove(record.id).await?;
        if !self.database.delete_schedule(record.id).await? {
            warn!("定时任务记录 {} 已被删除", record.id);
        }
        info!("定时任务已删除: {} (ID: {})", record.name, record.id);
        Ok(record)
    }

    /// 立即执行一次，不受启用状态影响
    pub async fn execute_schedule(&self, name: &str, schedule_id: i64) -> Result<ActionOutcome> {
        let server = self.get_server(name).await?;
        let record = self.owned_schedule(&server, schedule_id).await?;
        Ok(self.scheduler.execute_manually(&record).await)
    }

    async fn owned_schedule(
        &self,
        server: &ServerRecord,
        schedule_id: i64,
    ) -> Result<ScheduleRecord> {
        let record = self.database.require_schedule(schedule_id).await?;
        if record.server_id != server.id {
            return Err(PanelError::not_found(format!(
                "定时任务 {schedule_id} 不属于服务器 {}",
                server.name
            )));
        }
        Ok(record)
    }

    async fn sync_scheduler(&self, record: ScheduleRecord) -> Result<ScheduleChange> {
        if let Err(e) = self.scheduler.update(&record).await {
            error!("定时任务 {} 已保存，但更新调度器失败: {}", record.id, e);
        }
        self.change(record).await
    }

    async fn change(&self, schedule: ScheduleRecord) -> Result<ScheduleChange> {
        let registered = self.scheduler.is_registered(schedule.id).await;
        Ok(ScheduleChange {
            schedule,
            registered,
        })
    }

    // ========== 备份 ==========

    pub async fn list_backups(&self, name: &str) -> Result<Vec<BackupRecord>> {
        let server = self.get_server(name).await?;
        self.backups.list_backups(&server).await
    }

    pub async fn create_backup(&self, name: &str) -> Result<BackupRecord> {
        let server = self.get_server(name).await?;
        self.backups.create_backup(&server).await
    }

    /// 按当前上限手动执行一次轮换
    pub async fn rotate_backups(&self, name: &str) -> Result<Option<BackupRecord>> {
        let server = self.get_server(name).await?;
        self.backups
            .rotate_backups(server.id, server.max_backups)
            .await
    }

    pub async fn delete_backup(&self, name: &str, backup_id: i64) -> Result<BackupRecord> {
        let server = self.get_server(name).await?;
        self.backups.delete_backup(&server, backup_id).await
    }

    pub async fn verify_backup(&self, name: &str, backup_id: i64) -> Result<bool> {
        let server = self.get_server(name).await?;
        self.backups.verify_backup(&server, backup_id).await
    }

    /// 恢复备份，服务器运行中时拒绝执行
    pub async fn restore_backup(&self, name: &str, backup_id: i64) -> Result<BackupRecord> {
        let server = self.get_server(name).await?;
        if self.supervisor.is_server_running(&server).await {
            return Err(PanelError::conflict(format!(
                "服务器 {} 正在运行，请先停止再恢复备份",
                server.name
            )));
        }

        let backup = self.backups.restore_backup(&server, backup_id).await?;
        info!("服务器 {} 已从备份 {} 恢复", server.name, backup.file_name);
        Ok(backup)
    }

    // ========== 归档 ==========

    /// 解压归档到目标目录
    pub async fn extract_archive(&self, archive_path: PathBuf, dest: PathBuf) -> Result<()> {
        info!("解压 {} -> {}", archive_path.display(), dest.display());
        tokio::task::spawn_blocking(move || archive::extract_archive(&archive_path, &dest))
            .await?
    }

    /// 在服务器目录内解压，两个路径都相对于服务器目录且不能越界
    pub async fn extract_in_server(
        &self,
        name: &str,
        archive_rel: &str,
        dest_rel: &str,
    ) -> Result<PathBuf> {
        let server = self.get_server(name).await?;
        let folder = server.folder();

        let archive_path = archive::resolve_contained(&folder, Path::new(archive_rel))?
            .ok_or_else(|| PanelError::validation("归档路径不能为空"))?;
        let dest = archive::resolve_contained(&folder, Path::new(dest_rel))?
            .unwrap_or_else(|| folder.clone());

        self.extract_archive(archive_path, dest.clone()).await?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronSpec;
    use crate::error::ErrorKind;
    use crate::supervisor::ProcessSupervisor;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::{TempDir, tempdir};

    /// 运行状态可手动切换的进程管理器
    #[derive(Default)]
    struct FlagSupervisor {
        running: AtomicBool,
    }

    #[async_trait]
    impl ProcessSupervisor for FlagSupervisor {
        async fn is_server_running(&self, _server: &ServerRecord) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        async fn start_server(&self, _server: &ServerRecord) -> Result<()> {
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_server(&self, _server: &ServerRecord) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn restart_server(&self, _server: &ServerRecord) -> Result<()> {
            Ok(())
        }

        async fn send_command(&self, _server: &ServerRecord, _command: &str) -> Result<()> {
            Ok(())
        }
    }

    async fn setup() -> (TempDir, PanelService, Arc<FlagSupervisor>) {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("survival");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("server.properties"), "motd=hi").unwrap();

        let database = Database::connect_memory().await.unwrap();
        let supervisor = Arc::new(FlagSupervisor::default());
        let panel = PanelService::new(database, AppConfig::default(), supervisor.clone());

        panel
            .create_server(NewServer {
                name: "survival".into(),
                folder_path: folder.to_string_lossy().to_string(),
                start_command: "./start.sh".into(),
                stop_command: None,
            })
            .await
            .unwrap();

        (dir, panel, supervisor)
    }

    fn input(action: &str, minute: &str) -> ScheduleInput {
        ScheduleInput {
            name: "nightly".into(),
            cron: CronSpec {
                minute: minute.into(),
                hour: "3".into(),
                ..CronSpec::default()
            },
            action: action.into(),
            command: None,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_create_server_validation() {
        let (dir, panel, _) = setup().await;
        let folder = dir.path().join("survival").to_string_lossy().to_string();

        let new = |name: &str, folder: &str| NewServer {
            name: name.into(),
            folder_path: folder.into(),
            start_command: "./start.sh".into(),
            stop_command: None,
        };

        let dup = panel.create_server(new("survival", &folder)).await;
        assert_eq!(dup.unwrap_err().kind(), ErrorKind::Conflict);

        let blank = panel.create_server(new("  ", &folder)).await;
        assert_eq!(blank.unwrap_err().kind(), ErrorKind::Validation);

        let slash = panel.create_server(new("a/b", &folder)).await;
        assert_eq!(slash.unwrap_err().kind(), ErrorKind::Validation);

        let missing = panel.create_server(new("other", "/nonexistent/folder")).await;
        assert_eq!(missing.unwrap_err().kind(), ErrorKind::Validation);

        let server = panel.get_server("survival").await.unwrap();
        assert_eq!(server.max_backups, panel.config().backup.default_max_backups);
        assert_eq!(panel.list_servers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_backup_settings_bounds() {
        let (dir, panel, _) = setup().await;
        let backups = dir.path().join("backups").join("survival");
        let path = backups.to_string_lossy().to_string();
        let limit = panel.config().backup.max_backups_limit;

        for bad in [0, limit + 1] {
            let err = panel
                .update_backup_settings("survival", &path, bad)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        let err = panel
            .update_backup_settings("survival", "  ", 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let server = panel
            .update_backup_settings("survival", &path, limit)
            .await
            .unwrap();
        assert_eq!(server.max_backups, limit);
        assert!(backups.is_dir());

        let settings = panel.backup_settings("survival").await.unwrap();
        assert_eq!(settings.backup_path.as_deref(), Some(path.as_str()));
        assert_eq!(settings.max_backups_limit, limit);
    }

    #[tokio::test]
    async fn test_schedule_lifecycle() {
        let (_dir, panel, _) = setup().await;

        // 校验失败不产生任何记录
        let err = panel
            .create_schedule("survival", input("backup", "60"))
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::InvalidCronField { .. }));
        let err = panel
            .create_schedule("survival", input("explode", "0"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(panel.list_schedules("survival").await.unwrap().is_empty());

        let created = panel
            .create_schedule("survival", input("backup", "0"))
            .await
            .unwrap();
        assert!(created.registered);
        let id = created.schedule.id;

        let toggled = panel.toggle_schedule("survival", id).await.unwrap();
        assert!(!toggled.schedule.enabled);
        assert!(!toggled.registered);
        assert!(!panel.scheduler().is_registered(id).await);

        let mut update = input("stop_server", "*/15");
        update.enabled = true;
        let updated = panel.update_schedule("survival", id, update).await.unwrap();
        assert!(updated.registered);
        assert_eq!(updated.schedule.cron_expression(), "*/15 3 * * *");

        let deleted = panel.delete_schedule("survival", id).await.unwrap();
        assert_eq!(deleted.id, id);
        assert!(!panel.scheduler().is_registered(id).await);
        let err = panel.get_schedule("survival", id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_schedule_ownership() {
        let (dir, panel, _) = setup().await;
        let other = dir.path().join("creative");
        fs::create_dir_all(&other).unwrap();
        panel
            .create_server(NewServer {
                name: "creative".into(),
                folder_path: other.to_string_lossy().to_string(),
                start_command: "./start.sh".into(),
                stop_command: None,
            })
            .await
            .unwrap();

        let created = panel
            .create_schedule("survival", input("backup", "0"))
            .await
            .unwrap();
        let err = panel
            .delete_schedule("creative", created.schedule.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(panel.scheduler().is_registered(created.schedule.id).await);
    }

    #[tokio::test]
    async fn test_restore_refused_while_running() {
        let (dir, panel, supervisor) = setup().await;
        let backups = dir.path().join("backups");
        panel
            .update_backup_settings("survival", &backups.to_string_lossy(), 2)
            .await
            .unwrap();

        let backup = panel.create_backup("survival").await.unwrap();
        assert!(panel.verify_backup("survival", backup.id).await.unwrap());

        panel.start_server("survival").await.unwrap();
        assert!(panel.is_server_running("survival").await.unwrap());
        let err = panel
            .restore_backup("survival", backup.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        supervisor.running.store(false, Ordering::SeqCst);
        let folder = dir.path().join("survival");
        fs::write(folder.join("server.properties"), "motd=broken").unwrap();
        panel.restore_backup("survival", backup.id).await.unwrap();
        assert_eq!(
            fs::read_to_string(folder.join("server.properties")).unwrap(),
            "motd=hi"
        );
    }

    #[tokio::test]
    async fn test_extract_in_server_rejects_escape() {
        let (dir, panel, _) = setup().await;
        let folder = dir.path().join("survival");

        let err = panel
            .extract_in_server("survival", "../outside.zip", "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);

        let err = panel
            .extract_in_server("survival", "missing.zip", "plugins")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = panel
            .extract_in_server("survival", "", "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(folder.join("server.properties").is_file());
    }

    #[tokio::test]
    async fn test_backup_dir_inside_server_folder_rejected() {
        let (dir, panel, _) = setup().await;
        let folder = dir.path().join("survival");

        for inner in [folder.join("backups"), folder.clone(), folder.join("a").join("..")] {
            let err = panel
                .update_backup_settings("survival", &inner.to_string_lossy(), 2)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", inner.display());
        }
        assert!(panel.backup_settings("survival").await.unwrap().backup_path.is_none());

        // 目录外的备份目录不受影响，恢复后备份文件仍然存在
        let outside = dir.path().join("backups");
        panel
            .update_backup_settings("survival", &outside.to_string_lossy(), 2)
            .await
            .unwrap();
        let first = panel.create_backup("survival").await.unwrap();
        let second = panel.create_backup("survival").await.unwrap();
        panel.restore_backup("survival", first.id).await.unwrap();
        assert!(first.path().is_file());
        assert!(second.path().is_file());
        assert_eq!(panel.list_backups("survival").await.unwrap().len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extract_in_server_refuses_symlinked_dest() {
        let (dir, panel, _) = setup().await;
        let folder = dir.path().join("survival");
        let outside = dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, folder.join("plugins")).unwrap();

        let archive_path = folder.join("pack.tar");
        {
            let mut builder = tar::Builder::new(fs::File::create(&archive_path).unwrap());
            let mut header = tar::Header::new_gnu();
            header.set_size(5);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "plugins/pwn.txt", &b"pwned"[..])
                .unwrap();
            builder.finish().unwrap();
        }

        let err = panel
            .extract_in_server("survival", "pack.tar", "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);

        let err = panel
            .extract_in_server("survival", "pack.tar", "plugins")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Security);
        assert!(!outside.join("pwn.txt").exists());
    }

    #[tokio::test]
    async fn test_send_command_requires_text() {
        let (_dir, panel, _) = setup().await;
        let err = panel.send_command("survival", "   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = panel.start_server("ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
