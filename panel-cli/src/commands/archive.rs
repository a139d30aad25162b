use crate::app::CliApp;
use panel_core::error::Result;
use std::path::PathBuf;
use tracing::info;

/// 解压归档到目标目录，任何条目越界都会中止整个操作
pub async fn run_extract(app: &CliApp, archive: PathBuf, dest: PathBuf) -> Result<()> {
    app.panel.extract_archive(archive.clone(), dest.clone()).await?;
    info!("✅ 已解压 {} -> {}", archive.display(), dest.display());
    Ok(())
}
