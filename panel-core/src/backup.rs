use crate::archive;
use crate::constants::backup::{FILE_NAME_ATTEMPTS, WRITE_PROBE_FILE};
use crate::database::Database;
use crate::error::{PanelError, Result};
use crate::models::{BackupRecord, ServerRecord};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 备份管理器
#[derive(Debug, Clone)]
pub struct BackupManager {
    database: Database,
}

impl BackupManager {
    /// 创建新的备份管理器
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// 备份数量达到上限时删除最早的一个（文件尽力删除，随后删除记录）
    ///
    /// 每次最多删除一个。上限被调低到当前数量以下时，多出的备份会在后续创建时逐个淘汰。
    pub async fn rotate_backups(
        &self,
        server_id: i64,
        max_backups: u32,
    ) -> Result<Option<BackupRecord>> {
        let count = self.database.count_backups(server_id).await?;
        if count < u64::from(max_backups) {
            return Ok(None);
        }

        let Some(oldest) = self.database.oldest_backup(server_id).await? else {
            return Ok(None);
        };

        remove_backup_file(&oldest.path()).await;

        if !self.database.delete_backup_record(oldest.id).await? {
            debug!("备份记录 {} 已被删除", oldest.id);
        }

        info!(
            "备份轮换: 服务器 {} 已有 {} 个备份（上限 {}），删除最早的 {}",
            server_id, count, max_backups, oldest.file_name
        );
        Ok(Some(oldest))
    }

    /// 创建备份：轮换 -> 打包 -> 写入记录
    ///
    /// 记录写入失败时删除刚生成的文件。
    pub async fn create_backup(&self, server: &ServerRecord) -> Result<BackupRecord> {
        let backup_dir = server.backup_dir().ok_or_else(|| {
            PanelError::validation(format!("服务器 {} 未配置备份目录", server.name))
        })?;

        let source = server.folder();
        if is_inside(&backup_dir, &source) {
            return Err(PanelError::validation(format!(
                "备份目录 {} 位于服务器目录内",
                backup_dir.display()
            )));
        }

        self.rotate_backups(server.id, server.max_backups).await?;

        info!("开始创建备份: {} -> {}", source.display(), backup_dir.display());
        let mut attempt = 1;
        let (file_name, archive_path, size) = loop {
            let file_name = archive::generate_backup_file_name(&server.name);

            // 在后台线程中执行压缩操作，避免阻塞异步运行时
            let (name, src, dir) = (file_name.clone(), source.clone(), backup_dir.clone());
            let created =
                tokio::task::spawn_blocking(move || archive::create_archive(&src, &dir, &name))
                    .await?;

            match created {
                Ok((path, size)) => break (file_name, path, size),
                Err(PanelError::Io(e))
                    if e.kind() == ErrorKind::AlreadyExists && attempt < FILE_NAME_ATTEMPTS =>
                {
                    debug!("备份文件名 {} 已存在，重新生成", file_name);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let record = self
            .database
            .create_backup_record(
                server.id,
                &file_name,
                &archive_path.to_string_lossy(),
                size,
            )
            .await;

        match record {
            Ok(record) => {
                info!(
                    "备份创建成功: {} ({})",
                    record.file_name,
                    format_file_size(record.file_size)
                );
                Ok(record)
            }
            Err(e) => {
                warn!("备份记录写入失败，删除备份文件: {}", archive_path.display());
                remove_backup_file(&archive_path).await;
                Err(e)
            }
        }
    }

    /// 列出服务器的备份（新的在前）
    pub async fn list_backups(&self, server: &ServerRecord) -> Result<Vec<BackupRecord>> {
        self.database.list_backups(server.id).await
    }

    /// 获取属于该服务器的备份
    pub async fn get_backup(&self, server: &ServerRecord, backup_id: i64) -> Result<BackupRecord> {
        let backup = self.database.require_backup(backup_id).await?;
        if backup.server_id != server.id {
            return Err(PanelError::not_found(format!(
                "备份 {backup_id} 不属于服务器 {}",
                server.name
            )));
        }
        Ok(backup)
    }

    /// 删除备份：删除记录，文件尽力删除
    pub async fn delete_backup(&self, server: &ServerRecord, backup_id: i64) -> Result<BackupRecord> {
        let backup = self.get_backup(server, backup_id).await?;
        self.database.delete_backup_record(backup.id).await?;
        remove_backup_file(&backup.path()).await;
        info!("备份已删除: {}", backup.file_name);
        Ok(backup)
    }

    /// 从备份恢复服务器目录（调用方负责保证服务器已停止）
    pub async fn restore_backup(&self, server: &ServerRecord, backup_id: i64) -> Result<BackupRecord> {
        let backup = self.get_backup(server, backup_id).await?;
        let archive_path = backup.path();
        let target = server.folder();

        info!("开始恢复备份 {} -> {}", backup.file_name, target.display());
        tokio::task::spawn_blocking(move || archive::restore_directory(&archive_path, &target))
            .await??;

        Ok(backup)
    }

    /// 校验备份文件是否完整可读
    pub async fn verify_backup(&self, server: &ServerRecord, backup_id: i64) -> Result<bool> {
        let backup = self.get_backup(server, backup_id).await?;
        let path = backup.path();
        tokio::task::spawn_blocking(move || archive::verify_archive(&path)).await?
    }
}

/// 删除备份文件，文件不存在不视为错误
async fn remove_backup_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("已删除备份文件: {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("备份文件已不存在: {}", path.display())
        }
        Err(e) => warn!("删除备份文件失败 {}: {}", path.display(), e),
    }
}

/// path 是否等于 root 或位于 root 之内（按规范化后的路径比较）
pub fn is_inside(path: &Path, root: &Path) -> bool {
    match (path.canonicalize(), root.canonicalize()) {
        (Ok(path), Ok(root)) => path.starts_with(root),
        _ => false,
    }
}

/// 校验备份目录：不存在则创建，并写入探测文件确认可写
pub async fn validate_backup_path(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(PanelError::validation("备份目录不能为空"));
    }

    tokio::fs::create_dir_all(path).await.map_err(|e| {
        PanelError::validation(format!("备份目录不存在且无法创建 {}: {e}", path.display()))
    })?;

    let probe = path.join(WRITE_PROBE_FILE);
    tokio::fs::write(&probe, b"test").await.map_err(|e| {
        PanelError::validation(format!("备份目录不可写 {}: {e}", path.display()))
    })?;
    let _ = tokio::fs::remove_file(&probe).await;

    Ok(path.to_path_buf())
}

/// 以 1024 为基数格式化文件大小
pub fn format_file_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const SUFFIXES: [char; 6] = ['K', 'M', 'G', 'T', 'P', 'E'];

    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    format!("{:.1} {}B", bytes as f64 / div as f64, SUFFIXES[exp])
}
