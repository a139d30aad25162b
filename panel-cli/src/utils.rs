use chrono::{DateTime, Local, Utc};
use panel_core::constants::logging::LOG_FILE_ENV;
use tracing_appender::non_blocking::WorkerGuard;

/// # Panel CLI 日志
///
/// - 库代码只使用 `tracing` 宏，入口处调用 `setup_logging()` 完成配置
/// - `-v, --verbose` 打开 DEBUG 级别，`RUST_LOG` 优先
/// - 设置 `PANEL_LOG_FILE` 后日志写入该文件（包含模块路径和行号），否则输出到终端
///
/// ```bash
/// PANEL_LOG_FILE=panel.log panel-cli serve
/// RUST_LOG=panel_core::scheduler=debug panel-cli serve
/// ```
///
/// 返回的 guard 需要保持到进程退出，否则文件日志可能丢失尾部。
pub fn setup_logging(verbose: bool) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = std::env::var(LOG_FILE_ENV).ok();
    let file = log_file.as_ref().map(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
    });

    match file {
        Some(Ok(file)) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            fmt()
                .with_env_filter(env_filter)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_line_number(true)
                .init();
            Some(guard)
        }
        other => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_thread_names(false)
                .with_line_number(false)
                .without_time()
                .compact()
                .init();

            if let Some(Err(e)) = other {
                tracing::warn!(
                    "⚠️  无法打开日志文件 {}: {}，改为输出到终端",
                    log_file.unwrap_or_default(),
                    e
                );
            }
            None
        }
    }
}

/// 本地时间显示
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time_shape() {
        let time = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let text = format_time(&time);
        assert_eq!(text.len(), "2024-01-02 03:04:05".len());
        assert!(text.starts_with("2024-01-0"));
    }
}
