//! 归档编解码：tar.gz 备份创建、多格式解压与目录恢复
//!
//! 解压时任何条目解析后落在目标目录之外，整个操作都会在写入任何文件之前中止。

use crate::constants::backup::{BACKUP_FILE_SUFFIX, COMPRESSION_LEVEL, RANDOM_SUFFIX_UPPER};
use crate::error::{PanelError, Result};
use chrono::Local;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rand::Rng;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 支持的归档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
    Gz,
}

impl ArchiveFormat {
    /// 根据文件名后缀判断格式
    pub fn detect(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if name.ends_with(".tar") {
            Ok(Self::Tar)
        } else if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else if name.ends_with(".gz") {
            Ok(Self::Gz)
        } else {
            Err(PanelError::UnsupportedArchive(format!(
                "{} (支持: .tar.gz, .tgz, .tar, .zip, .gz)",
                path.display()
            )))
        }
    }
}

/// 生成备份文件名: {server}_{YYYYMMDD}_{NNNN}.tar.gz
pub fn generate_backup_file_name(server_name: &str) -> String {
    let date = Local::now().format("%Y%m%d");
    let suffix = rand::thread_rng().gen_range(0..RANDOM_SUFFIX_UPPER);
    format!("{server_name}_{date}_{suffix:04}{BACKUP_FILE_SUFFIX}")
}

/// 将 source_dir 打包为 dest_dir/file_name（tar + gzip），返回文件路径和大小
///
/// 根目录本身不写入归档，条目名使用 `/` 分隔的相对路径，保留权限与类型。
/// 同名文件已存在时返回 `AlreadyExists` 的 IO 错误，不会覆盖。
pub fn create_archive(source_dir: &Path, dest_dir: &Path, file_name: &str) -> Result<(PathBuf, u64)> {
    if !source_dir.is_dir() {
        return Err(PanelError::not_found(format!(
            "源目录不存在: {}",
            source_dir.display()
        )));
    }

    fs::create_dir_all(dest_dir)?;
    let archive_path = dest_dir.join(file_name);
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&archive_path)?;

    if let Err(e) = write_tar_gz(source_dir, file, &archive_path) {
        // 不留下半成品
        let _ = fs::remove_file(&archive_path);
        return Err(e);
    }

    let size = fs::metadata(&archive_path)?.len();
    info!(
        "归档创建完成: {} ({} 字节)",
        archive_path.display(),
        size
    );
    Ok((archive_path, size))
}

fn write_tar_gz(source_dir: &Path, file: File, archive_path: &Path) -> Result<()> {
    let encoder = GzEncoder::new(file, Compression::new(COMPRESSION_LEVEL));
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in WalkDir::new(source_dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        // 备份目录位于源目录内时跳过正在写入的归档本身
        if entry.path() == archive_path {
            continue;
        }
        let relative = entry.path().strip_prefix(source_dir)?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        builder
            .append_path_with_name(entry.path(), &name)
            .map_err(|e| PanelError::backup(format!("添加 {name} 到归档失败: {e}")))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| PanelError::backup(format!("完成归档失败: {e}")))?;
    let file = encoder.finish()?;
    file.sync_all()?;
    Ok(())
}

/// 计算条目在目标目录下的落地路径
///
/// 只做词法解析：`..` 越过根目录、绝对路径均视为越界；解析结果等于根目录时返回 None。
pub fn resolve_entry_path(dest: &Path, entry_name: &Path) -> Result<Option<PathBuf>> {
    let mut relative = PathBuf::new();

    for component in entry_name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !relative.pop() {
                    return Err(PanelError::PathTraversal(entry_name.display().to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PanelError::PathTraversal(entry_name.display().to_string()));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(dest.join(relative)))
    }
}

/// 在 resolve_entry_path 的基础上检查 dest 内已存在的路径组件
///
/// 任何一级是符号链接都视为越界，避免通过已有链接写到 dest 之外。
pub fn resolve_contained(dest: &Path, entry_name: &Path) -> Result<Option<PathBuf>> {
    let Some(target) = resolve_entry_path(dest, entry_name)? else {
        return Ok(None);
    };
    let relative = target.strip_prefix(dest)?;

    let mut current = dest.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(PanelError::PathTraversal(format!(
                    "{} (经过符号链接 {})",
                    entry_name.display(),
                    current.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(target))
}

/// 按后缀识别格式并解压到 dest
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(PanelError::not_found(format!(
            "归档文件不存在: {}",
            archive_path.display()
        )));
    }

    let format = ArchiveFormat::detect(archive_path)?;
    fs::create_dir_all(dest)?;
    info!(
        "开始解压 {} -> {} ({:?})",
        archive_path.display(),
        dest.display(),
        format
    );

    match format {
        ArchiveFormat::TarGz => {
            let open = || -> Result<Box<dyn Read>> {
                let file = File::open(archive_path)?;
                Ok(Box::new(GzDecoder::new(BufReader::new(file))))
            };
            check_tar_entries(open()?, dest)?;
            unpack_tar(open()?, dest)
        }
        ArchiveFormat::Tar => {
            let open = || -> Result<Box<dyn Read>> {
                Ok(Box::new(BufReader::new(File::open(archive_path)?)))
            };
            check_tar_entries(open()?, dest)?;
            unpack_tar(open()?, dest)
        }
        ArchiveFormat::Zip => extract_zip(archive_path, dest),
        ArchiveFormat::Gz => extract_gz(archive_path, dest),
    }
}

/// 预先扫描全部条目名，发现越界立即失败
fn check_tar_entries(reader: Box<dyn Read>, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let entry = entry?;
        resolve_contained(dest, &entry.path()?)?;
    }
    Ok(())
}

fn unpack_tar(reader: Box<dyn Read>, dest: &Path) -> Result<()> {
    let mut archive = tar::Archive::new(reader);
    let mut dir_modes = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.into_owned();
        let Some(target) = resolve_contained(dest, &name)? else {
            continue;
        };
        let mode = entry.header().mode().ok();
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(&target)?;
            if let Some(mode) = mode {
                dir_modes.push((target, mode));
            }
        } else if entry_type.is_file() {
            write_entry(&mut entry, &target, mode)?;
        } else {
            debug!("跳过非普通文件条目: {} ({:?})", name.display(), entry_type);
        }
    }

    apply_dir_modes(dir_modes)
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(BufReader::new(File::open(archive_path)?))?;

    for i in 0..zip.len() {
        let entry = zip.by_index(i)?;
        resolve_contained(dest, Path::new(entry.name()))?;
    }

    let mut dir_modes = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let name = PathBuf::from(entry.name());
        let Some(target) = resolve_contained(dest, &name)? else {
            continue;
        };
        let mode = entry.unix_mode();

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            if let Some(mode) = mode {
                dir_modes.push((target, mode));
            }
        } else {
            write_entry(&mut entry, &target, mode)?;
        }
    }

    apply_dir_modes(dir_modes)
}

/// 单文件 gzip：输出名为归档名去掉 .gz
fn extract_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let output_name = &file_name[..file_name.len().saturating_sub(3)];
    if output_name.is_empty() {
        return Err(PanelError::validation(format!(
            "无法从 {file_name} 推导输出文件名"
        )));
    }

    let target = resolve_contained(dest, Path::new(output_name))?
        .ok_or_else(|| PanelError::PathTraversal(output_name.to_string()))?;

    let mut decoder = GzDecoder::new(BufReader::new(File::open(archive_path)?));
    write_entry(&mut decoder, &target, None)
}

fn write_entry(reader: &mut dyn Read, target: &Path, mode: Option<u32>) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut out = File::create(target)?;
    io::copy(reader, &mut out)?;
    drop(out);

    if let Some(mode) = mode {
        set_mode(target, mode)?;
    }
    Ok(())
}

/// 目录权限在全部内容写入后再设置（由深到浅），避免只读目录阻止写入
fn apply_dir_modes(mut dir_modes: Vec<(PathBuf, u32)>) -> Result<()> {
    dir_modes.sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
    for (dir, mode) in dir_modes {
        set_mode(&dir, mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// 检查 tar.gz 是否可完整读取；文件不存在返回 false
pub fn verify_archive(archive_path: &Path) -> Result<bool> {
    if !archive_path.is_file() {
        return Ok(false);
    }

    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    let result = (|| -> io::Result<usize> {
        let mut count = 0;
        for entry in archive.entries()? {
            let mut entry = entry?;
            io::copy(&mut entry, &mut io::sink())?;
            count += 1;
        }
        Ok(count)
    })();

    match result {
        Ok(count) => {
            debug!("归档校验通过: {} ({} 个条目)", archive_path.display(), count);
            Ok(true)
        }
        Err(e) => {
            warn!("归档校验失败: {}: {}", archive_path.display(), e);
            Ok(false)
        }
    }
}

/// 用归档内容替换 target 目录的内容
///
/// 先校验归档和目标目录都存在，再解压到同级临时目录；全部成功后才交换目录，
/// 解压失败时 target 保持原样。
pub fn restore_directory(archive_path: &Path, target: &Path) -> Result<()> {
    if !archive_path.is_file() {
        return Err(PanelError::not_found(format!(
            "备份文件不存在: {}",
            archive_path.display()
        )));
    }
    if !target.is_dir() {
        return Err(PanelError::not_found(format!(
            "服务器目录不存在: {}",
            target.display()
        )));
    }

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| PanelError::validation(format!("无法恢复到 {}", target.display())))?;
    let dir_name = target
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| PanelError::validation(format!("无法恢复到 {}", target.display())))?;

    let staging = tempfile::Builder::new()
        .prefix(&format!(".{dir_name}.restore-"))
        .tempdir_in(parent)?;
    extract_archive(archive_path, staging.path())?;

    fs::set_permissions(staging.path(), fs::metadata(target)?.permissions())?;
    let staging_path = staging.keep();

    let old_path = parent.join(format!(
        ".{dir_name}.old-{}",
        Local::now().format("%Y%m%d%H%M%S%f")
    ));

    if let Err(e) = fs::rename(target, &old_path) {
        let _ = fs::remove_dir_all(&staging_path);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&staging_path, target) {
        // 放回原目录
        if let Err(back) = fs::rename(&old_path, target) {
            warn!(
                "恢复失败且无法还原原目录，原内容保留在 {}: {}",
                old_path.display(),
                back
            );
        }
        let _ = fs::remove_dir_all(&staging_path);
        return Err(e.into());
    }

    if let Err(e) = fs::remove_dir_all(&old_path) {
        warn!("清理旧目录失败 {}: {}", old_path.display(), e);
    }

    info!(
        "目录已从备份恢复: {} <- {}",
        target.display(),
        archive_path.display()
    );
    Ok(())
}
