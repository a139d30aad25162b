use crate::models::{BackupRecord, NewServer, ScheduleRecord, ServerRecord, ValidSchedule};
use crate::{PanelError, Result, db::DuckDbManager};
use std::path::Path;

/// 数据库管理器 - DuckDB适配器
#[derive(Debug, Clone)]
pub struct Database {
    manager: DuckDbManager,
}

impl Database {
    /// 连接到数据库
    pub async fn connect<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let manager = DuckDbManager::new(db_path).await?;
        Ok(Database { manager })
    }

    /// 连接到内存数据库 (主要用于测试，生产环境建议使用connect()以确保数据持久化)
    pub async fn connect_memory() -> Result<Self> {
        let manager = DuckDbManager::new_memory().await?;
        Ok(Database { manager })
    }

    // ========== 服务器 ==========

    /// 创建服务器记录
    pub async fn create_server(&self, server: NewServer, max_backups: u32) -> Result<ServerRecord> {
        let id = self.manager.create_server(server, max_backups).await?;
        self.require_server(id).await
    }

    pub async fn get_server(&self, id: i64) -> Result<Option<ServerRecord>> {
        self.manager.get_server(id).await
    }

    /// 获取服务器，不存在时返回 NotFound
    pub async fn require_server(&self, id: i64) -> Result<ServerRecord> {
        self.get_server(id)
            .await?
            .ok_or_else(|| PanelError::not_found(format!("服务器 {id} 不存在")))
    }

    pub async fn get_server_by_name(&self, name: &str) -> Result<Option<ServerRecord>> {
        self.manager.get_server_by_name(name).await
    }

    pub async fn require_server_by_name(&self, name: &str) -> Result<ServerRecord> {
        self.get_server_by_name(name)
            .await?
            .ok_or_else(|| PanelError::not_found(format!("服务器 '{name}' 不存在")))
    }

    pub async fn list_servers(&self) -> Result<Vec<ServerRecord>> {
        self.manager.list_servers().await
    }

    pub async fn update_backup_settings(
        &self,
        server_id: i64,
        backup_path: &str,
        max_backups: u32,
    ) -> Result<ServerRecord> {
        self.manager
            .update_backup_settings(server_id, backup_path, max_backups)
            .await?;
        self.require_server(server_id).await
    }

    // ========== 定时任务 ==========

    /// 创建定时任务记录
    pub async fn create_schedule(
        &self,
        server_id: i64,
        schedule: ValidSchedule,
    ) -> Result<ScheduleRecord> {
        let id = self.manager.create_schedule(server_id, schedule).await?;
        self.require_schedule(id).await
    }

    pub async fn get_schedule(&self, id: i64) -> Result<Option<ScheduleRecord>> {
        self.manager.get_schedule(id).await
    }

    /// 获取定时任务，不存在时返回 NotFound
    pub async fn require_schedule(&self, id: i64) -> Result<ScheduleRecord> {
        self.get_schedule(id)
            .await?
            .ok_or_else(|| PanelError::not_found(format!("定时任务 {id} 不存在")))
    }

    /// 列出服务器的定时任务（新的在前）
    pub async fn list_schedules(&self, server_id: i64) -> Result<Vec<ScheduleRecord>> {
        self.manager.list_schedules(server_id).await
    }

    pub async fn list_enabled_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        self.manager.list_enabled_schedules().await
    }

    /// 保存定时任务并返回最新记录
    pub async fn save_schedule(&self, id: i64, schedule: ValidSchedule) -> Result<ScheduleRecord> {
        if !self.manager.save_schedule(id, schedule).await? {
            return Err(PanelError::not_found(format!("定时任务 {id} 不存在")));
        }
        self.require_schedule(id).await
    }

    /// 删除定时任务记录，返回是否确实删除了记录
    pub async fn delete_schedule(&self, id: i64) -> Result<bool> {
        self.manager.delete_schedule(id).await
    }

    // ========== 备份 ==========

    /// 创建备份记录
    pub async fn create_backup_record(
        &self,
        server_id: i64,
        file_name: &str,
        file_path: &str,
        file_size: u64,
    ) -> Result<BackupRecord> {
        let id = self
            .manager
            .create_backup_record(server_id, file_name, file_path, file_size)
            .await?;
        self.require_backup(id).await
    }

    pub async fn get_backup(&self, id: i64) -> Result<Option<BackupRecord>> {
        self.manager.get_backup(id).await
    }

    /// 获取备份，不存在时返回 NotFound
    pub async fn require_backup(&self, id: i64) -> Result<BackupRecord> {
        self.get_backup(id)
            .await?
            .ok_or_else(|| PanelError::not_found(format!("备份 {id} 不存在")))
    }

    /// 列出服务器的备份（新的在前）
    pub async fn list_backups(&self, server_id: i64) -> Result<Vec<BackupRecord>> {
        self.manager.list_backups(server_id).await
    }

    pub async fn count_backups(&self, server_id: i64) -> Result<u64> {
        self.manager.count_backups(server_id).await
    }

    /// 服务器最早创建的备份
    pub async fn oldest_backup(&self, server_id: i64) -> Result<Option<BackupRecord>> {
        self.manager.oldest_backup(server_id).await
    }

    /// 删除备份记录，返回是否确实删除了记录
    pub async fn delete_backup_record(&self, id: i64) -> Result<bool> {
        self.manager.delete_backup_record(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::CronSpec;
    use crate::models::ScheduleAction;
    use tempfile::tempdir;

    fn new_server(name: &str) -> NewServer {
        NewServer {
            name: name.to_string(),
            folder_path: "/srv/test".to_string(),
            start_command: "./run.sh".to_string(),
            stop_command: Some("stop".to_string()),
        }
    }

    fn schedule(name: &str, enabled: bool) -> ValidSchedule {
        ValidSchedule {
            name: name.to_string(),
            cron: CronSpec {
                minute: "0".into(),
                hour: "*/2".into(),
                ..CronSpec::default()
            },
            action: ScheduleAction::Backup,
            command: None,
            enabled,
        }
    }

    #[tokio::test]
    async fn test_server_crud() {
        let db = Database::connect_memory().await.unwrap();

        let server = db.create_server(new_server("alpha"), 3).await.unwrap();
        assert_eq!(server.name, "alpha");
        assert_eq!(server.max_backups, 3);
        assert_eq!(server.backup_path, None);

        let by_name = db.require_server_by_name("alpha").await.unwrap();
        assert_eq!(by_name.id, server.id);

        let updated = db
            .update_backup_settings(server.id, "/backups/alpha", 2)
            .await
            .unwrap();
        assert_eq!(updated.backup_path.as_deref(), Some("/backups/alpha"));
        assert_eq!(updated.max_backups, 2);

        assert!(matches!(
            db.require_server(999).await,
            Err(PanelError::NotFound(_))
        ));
        assert_eq!(db.list_servers().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_crud() {
        let db = Database::connect_memory().await.unwrap();
        let server = db.create_server(new_server("alpha"), 3).await.unwrap();

        let enabled = db
            .create_schedule(server.id, schedule("on", true))
            .await
            .unwrap();
        let disabled = db
            .create_schedule(server.id, schedule("off", false))
            .await
            .unwrap();
        assert_eq!(enabled.cron_expression(), "0 */2 * * *");
        assert_eq!(enabled.action, ScheduleAction::Backup);

        let listed = db.list_schedules(server.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, disabled.id, "新的在前");

        let enabled_only = db.list_enabled_schedules().await.unwrap();
        assert_eq!(enabled_only.len(), 1);
        assert_eq!(enabled_only[0].id, enabled.id);

        let mut changed = schedule("renamed", false);
        changed.action = ScheduleAction::SendCommand;
        changed.command = Some("say hi".into());
        let saved = db.save_schedule(enabled.id, changed).await.unwrap();
        assert_eq!(saved.name, "renamed");
        assert!(!saved.enabled);
        assert_eq!(saved.command.as_deref(), Some("say hi"));

        assert!(db.delete_schedule(enabled.id).await.unwrap());
        assert!(!db.delete_schedule(enabled.id).await.unwrap());
        assert!(matches!(
            db.save_schedule(enabled.id, schedule("x", true)).await,
            Err(PanelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_backup_queries() {
        let db = Database::connect_memory().await.unwrap();
        let a = db.create_server(new_server("a"), 3).await.unwrap();
        let b = db.create_server(new_server("b"), 3).await.unwrap();

        let first = db
            .create_backup_record(a.id, "a_1.tar.gz", "/b/a_1.tar.gz", 10)
            .await
            .unwrap();
        let second = db
            .create_backup_record(a.id, "a_2.tar.gz", "/b/a_2.tar.gz", 20)
            .await
            .unwrap();
        db.create_backup_record(b.id, "b_1.tar.gz", "/b/b_1.tar.gz", 30)
            .await
            .unwrap();

        assert_eq!(db.count_backups(a.id).await.unwrap(), 2);
        assert_eq!(db.count_backups(b.id).await.unwrap(), 1);
        assert_eq!(
            db.oldest_backup(a.id).await.unwrap().map(|r| r.id),
            Some(first.id)
        );

        let listed = db.list_backups(a.id).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].file_size, 10);

        assert!(db.delete_backup_record(first.id).await.unwrap());
        assert_eq!(
            db.oldest_backup(a.id).await.unwrap().map(|r| r.id),
            Some(second.id)
        );
        assert!(db.get_backup(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("panel.db");

        {
            let db = Database::connect(&path).await.unwrap();
            db.create_server(new_server("persisted"), 2).await.unwrap();
        }

        assert!(path.exists());
    }
}
