use crate::Result;
use crate::cron::CronSpec;
use crate::models::{
    BackupRecord, NewServer, ScheduleAction, ScheduleRecord, ServerRecord, ValidSchedule,
};
use chrono::{DateTime, Utc};
use duckdb::{Connection, Row, params};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::messages::DbMessage;

const SERVER_COLUMNS: &str =
    "id, name, folder_path, start_command, stop_command, backup_path, max_backups, created_at";

const SCHEDULE_COLUMNS: &str = "id, server_id, name, minute, hour, day_of_month, month, day_of_week, action, command, enabled, created_at, updated_at";

const BACKUP_COLUMNS: &str = "id, server_id, file_name, file_path, file_size, created_at";

/// 定时任务行（action 以字符串形式读出，再转换为枚举）
struct ScheduleRow {
    id: i64,
    server_id: i64,
    name: String,
    cron: CronSpec,
    action: String,
    command: Option<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ScheduleRow {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            server_id: row.get(1)?,
            name: row.get(2)?,
            cron: CronSpec {
                minute: row.get(3)?,
                hour: row.get(4)?,
                day_of_month: row.get(5)?,
                month: row.get(6)?,
                day_of_week: row.get(7)?,
            },
            action: row.get(8)?,
            command: row.get(9)?,
            enabled: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<ScheduleRecord> {
        Ok(ScheduleRecord {
            id: self.id,
            server_id: self.server_id,
            name: self.name,
            cron: self.cron,
            action: self.action.parse::<ScheduleAction>()?,
            command: self.command,
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn server_from_row(row: &Row<'_>) -> duckdb::Result<ServerRecord> {
    let max_backups: i64 = row.get(6)?;
    Ok(ServerRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        folder_path: row.get(2)?,
        start_command: row.get(3)?,
        stop_command: row.get(4)?,
        backup_path: row.get(5)?,
        max_backups: u32::try_from(max_backups).unwrap_or_default(),
        created_at: row.get(7)?,
    })
}

fn backup_from_row(row: &Row<'_>) -> duckdb::Result<BackupRecord> {
    let file_size: i64 = row.get(4)?;
    Ok(BackupRecord {
        id: row.get(0)?,
        server_id: row.get(1)?,
        file_name: row.get(2)?,
        file_path: row.get(3)?,
        file_size: u64::try_from(file_size).unwrap_or_default(),
        created_at: row.get(5)?,
    })
}

/// DuckDB Actor - 确保单线程访问DuckDB
pub struct DuckDbActor {
    connection: Connection,
}

impl DuckDbActor {
    /// 创建新的DuckDB Actor
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let connection = Connection::open(db_path)?;
        Ok(Self { connection })
    }

    /// 创建内存DuckDB Actor
    pub fn new_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        Ok(Self { connection })
    }

    /// 运行Actor消息循环
    pub async fn run(mut self, mut receiver: mpsc::Receiver<DbMessage>) {
        info!("DuckDB Actor 已启动");

        while let Some(message) = receiver.recv().await {
            self.handle_message(message);
        }

        info!("DuckDB Actor 已关闭");
    }

    /// 处理数据库消息
    fn handle_message(&mut self, message: DbMessage) {
        match message {
            DbMessage::InitTables { respond_to } => {
                let _ = respond_to.send(self.init_tables());
            }
            DbMessage::CreateServer {
                server,
                max_backups,
                respond_to,
            } => {
                let _ = respond_to.send(self.create_server(&server, max_backups));
            }
            DbMessage::GetServer { id, respond_to } => {
                let _ = respond_to.send(self.get_server(id));
            }
            DbMessage::GetServerByName { name, respond_to } => {
                let _ = respond_to.send(self.get_server_by_name(&name));
            }
            DbMessage::ListServers { respond_to } => {
                let _ = respond_to.send(self.list_servers());
            }
            DbMessage::UpdateBackupSettings {
                server_id,
                backup_path,
                max_backups,
                respond_to,
            } => {
                let result = self.update_backup_settings(server_id, &backup_path, max_backups);
                let _ = respond_to.send(result);
            }
            DbMessage::CreateSchedule {
                server_id,
                schedule,
                respond_to,
            } => {
                let _ = respond_to.send(self.create_schedule(server_id, &schedule));
            }
            DbMessage::GetSchedule { id, respond_to } => {
                let _ = respond_to.send(self.get_schedule(id));
            }
            DbMessage::ListSchedules {
                server_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.list_schedules(server_id));
            }
            DbMessage::ListEnabledSchedules { respond_to } => {
                let _ = respond_to.send(self.list_enabled_schedules());
            }
            DbMessage::SaveSchedule {
                id,
                schedule,
                respond_to,
            } => {
                let _ = respond_to.send(self.save_schedule(id, &schedule));
            }
            DbMessage::DeleteSchedule { id, respond_to } => {
                let _ = respond_to.send(self.delete_schedule(id));
            }
            DbMessage::CreateBackupRecord {
                server_id,
                file_name,
                file_path,
                file_size,
                respond_to,
            } => {
                let result =
                    self.create_backup_record(server_id, &file_name, &file_path, file_size);
                let _ = respond_to.send(result);
            }
            DbMessage::GetBackup { id, respond_to } => {
                let _ = respond_to.send(self.get_backup(id));
            }
            DbMessage::ListBackups {
                server_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.list_backups(server_id));
            }
            DbMessage::CountBackups {
                server_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.count_backups(server_id));
            }
            DbMessage::OldestBackup {
                server_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.oldest_backup(server_id));
            }
            DbMessage::DeleteBackupRecord { id, respond_to } => {
                let _ = respond_to.send(self.delete_backup_record(id));
            }
        }
    }

    /// 初始化数据库表
    fn init_tables(&mut self) -> Result<()> {
        debug!("正在初始化DuckDB表...");

        // 读取并执行SQL初始化脚本
        let sql_content = include_str!("../../migrations/init_duckdb.sql");

        // 按分号分割SQL语句并执行
        for statement in sql_content.split(';') {
            let trimmed = statement.trim();
            let is_comment_only = trimmed
                .lines()
                .all(|line| line.trim().is_empty() || line.trim().starts_with("--"));
            if !is_comment_only {
                self.connection.execute(trimmed, [])?;
            }
        }

        info!("DuckDB表初始化完成");
        Ok(())
    }

    // ========== 服务器 ==========

    fn create_server(&mut self, server: &NewServer, max_backups: u32) -> Result<i64> {
        let now = Utc::now().naive_utc();
        self.connection.execute(
            "INSERT INTO servers (name, folder_path, start_command, stop_command, max_backups, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                server.name,
                server.folder_path,
                server.start_command,
                server.stop_command,
                max_backups as i64,
                now
            ],
        )?;

        let id: i64 = self
            .connection
            .query_row("SELECT currval('server_id_seq')", [], |row| row.get(0))?;
        Ok(id)
    }

    fn get_server(&mut self, id: i64) -> Result<Option<ServerRecord>> {
        let sql = format!("SELECT {SERVER_COLUMNS} FROM servers WHERE id = ?");
        let mut stmt = self.connection.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], server_from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn get_server_by_name(&mut self, name: &str) -> Result<Option<ServerRecord>> {
        let sql = format!("SELECT {SERVER_COLUMNS} FROM servers WHERE name = ?");
        let mut stmt = self.connection.prepare(&sql)?;
        let mut rows = stmt.query_map(params![name], server_from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn list_servers(&mut self) -> Result<Vec<ServerRecord>> {
        let sql = format!("SELECT {SERVER_COLUMNS} FROM servers ORDER BY name");
        let mut stmt = self.connection.prepare(&sql)?;
        let servers = stmt
            .query_map([], server_from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(servers)
    }

    fn update_backup_settings(
        &mut self,
        server_id: i64,
        backup_path: &str,
        max_backups: u32,
    ) -> Result<()> {
        self.connection.execute(
            "UPDATE servers SET backup_path = ?, max_backups = ? WHERE id = ?",
            params![backup_path, max_backups as i64, server_id],
        )?;
        Ok(())
    }

    // ========== 定时任务 ==========

    fn create_schedule(&mut self, server_id: i64, schedule: &ValidSchedule) -> Result<i64> {
        let now = Utc::now().naive_utc();
        self.connection.execute(
            "INSERT INTO schedules (server_id, name, minute, hour, day_of_month, month, day_of_week, action, command, enabled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                server_id,
                schedule.name,
                schedule.cron.minute,
                schedule.cron.hour,
                schedule.cron.day_of_month,
                schedule.cron.month,
                schedule.cron.day_of_week,
                schedule.action.as_str(),
                schedule.command,
                schedule.enabled,
                now,
                now
            ],
        )?;

        let id: i64 = self
            .connection
            .query_row("SELECT currval('schedule_id_seq')", [], |row| row.get(0))?;
        Ok(id)
    }

    fn query_schedules(
        &mut self,
        sql: &str,
        params: &[&dyn duckdb::ToSql],
    ) -> Result<Vec<ScheduleRecord>> {
        let mut stmt = self.connection.prepare(sql)?;
        let rows = stmt
            .query_map(params, ScheduleRow::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(ScheduleRow::into_record).collect()
    }

    fn get_schedule(&mut self, id: i64) -> Result<Option<ScheduleRecord>> {
        let sql = format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?");
        Ok(self.query_schedules(&sql, params![id])?.into_iter().next())
    }

    fn list_schedules(&mut self, server_id: i64) -> Result<Vec<ScheduleRecord>> {
        let sql = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE server_id = ? ORDER BY created_at DESC, id DESC"
        );
        self.query_schedules(&sql, params![server_id])
    }

    fn list_enabled_schedules(&mut self) -> Result<Vec<ScheduleRecord>> {
        let sql =
            format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE enabled = TRUE ORDER BY id");
        self.query_schedules(&sql, params![])
    }

    fn save_schedule(&mut self, id: i64, schedule: &ValidSchedule) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let updated = self.connection.execute(
            "UPDATE schedules SET name = ?, minute = ?, hour = ?, day_of_month = ?, month = ?, day_of_week = ?,
                 action = ?, command = ?, enabled = ?, updated_at = ?
             WHERE id = ?",
            params![
                schedule.name,
                schedule.cron.minute,
                schedule.cron.hour,
                schedule.cron.day_of_month,
                schedule.cron.month,
                schedule.cron.day_of_week,
                schedule.action.as_str(),
                schedule.command,
                schedule.enabled,
                now,
                id
            ],
        )?;
        Ok(updated > 0)
    }

    fn delete_schedule(&mut self, id: i64) -> Result<bool> {
        let deleted = self
            .connection
            .execute("DELETE FROM schedules WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }

    // ========== 备份 ==========

    fn create_backup_record(
        &mut self,
        server_id: i64,
        file_name: &str,
        file_path: &str,
        file_size: u64,
    ) -> Result<i64> {
        // 插入记录，让数据库自动生成ID
        let now = Utc::now().naive_utc();
        self.connection.execute(
            "INSERT INTO backups (server_id, file_name, file_path, file_size, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![server_id, file_name, file_path, file_size as i64, now],
        )?;

        // 获取最后插入的ID
        let id: i64 = self
            .connection
            .query_row("SELECT currval('backup_id_seq')", [], |row| row.get(0))?;

        Ok(id)
    }

    fn get_backup(&mut self, id: i64) -> Result<Option<BackupRecord>> {
        let sql = format!("SELECT {BACKUP_COLUMNS} FROM backups WHERE id = ?");
        let mut stmt = self.connection.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], backup_from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn list_backups(&mut self, server_id: i64) -> Result<Vec<BackupRecord>> {
        let sql = format!(
            "SELECT {BACKUP_COLUMNS} FROM backups WHERE server_id = ? ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let backups = stmt
            .query_map(params![server_id], backup_from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(backups)
    }

    fn count_backups(&mut self, server_id: i64) -> Result<u64> {
        let count: i64 = self.connection.query_row(
            "SELECT COUNT(*) FROM backups WHERE server_id = ?",
            params![server_id],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn oldest_backup(&mut self, server_id: i64) -> Result<Option<BackupRecord>> {
        let sql = format!(
            "SELECT {BACKUP_COLUMNS} FROM backups WHERE server_id = ? ORDER BY created_at ASC, id ASC LIMIT 1"
        );
        let mut stmt = self.connection.prepare(&sql)?;
        let mut rows = stmt.query_map(params![server_id], backup_from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn delete_backup_record(&mut self, id: i64) -> Result<bool> {
        let deleted = self
            .connection
            .execute("DELETE FROM backups WHERE id = ?", params![id])?;
        Ok(deleted > 0)
    }
}
