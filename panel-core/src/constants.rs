/// 配置文件相关常量
pub mod config {
    use std::path::PathBuf;

    /// 按优先级查找的配置文件名
    pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["panel.toml", "config.toml", ".panel.toml"];

    /// 默认配置文件名（未找到时创建）
    pub const DEFAULT_CONFIG_FILE: &str = "panel.toml";

    /// 数据目录名
    pub const DATA_DIR_NAME: &str = "data";

    /// 数据库文件名
    pub const DATABASE_FILE_NAME: &str = "panel.db";

    /// 获取默认数据库路径
    pub fn get_default_database_path() -> PathBuf {
        PathBuf::from(".").join(DATA_DIR_NAME).join(DATABASE_FILE_NAME)
    }
}

/// HTTP服务相关常量
pub mod http {
    /// 默认监听地址
    pub const DEFAULT_BIND: &str = "127.0.0.1:6767";

    /// API路由前缀
    pub const API_PREFIX: &str = "/api";
}

/// 备份相关常量
pub mod backup {
    /// 允许配置的最大备份数量上限
    pub const DEFAULT_MAX_BACKUPS_LIMIT: u32 = 3;

    /// 新建服务器默认保留备份数
    pub const DEFAULT_MAX_BACKUPS: u32 = 3;

    /// 备份文件后缀
    pub const BACKUP_FILE_SUFFIX: &str = ".tar.gz";

    /// 文件名随机后缀上限（不含）
    pub const RANDOM_SUFFIX_UPPER: u32 = 9999;

    /// 备份文件重名时重新生成文件名的最多次数
    pub const FILE_NAME_ATTEMPTS: u32 = 5;

    /// 备份路径可写性探测文件
    pub const WRITE_PROBE_FILE: &str = ".write_test";

    /// gzip 压缩级别
    pub const COMPRESSION_LEVEL: u32 = 6;
}

/// 定时任务相关常量
pub mod scheduler {
    /// 计算下次触发时间时最多向后搜索的年数
    pub const MAX_SEARCH_YEARS: i32 = 5;
}

/// 进程管理相关常量
pub mod supervisor {
    /// 停止服务器的默认等待秒数
    pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 30;

    /// 默认 shell
    #[cfg(unix)]
    pub const DEFAULT_SHELL: &str = "sh";

    #[cfg(windows)]
    pub const DEFAULT_SHELL: &str = "cmd";

    /// shell 执行命令的参数
    #[cfg(unix)]
    pub const SHELL_COMMAND_FLAG: &str = "-c";

    #[cfg(windows)]
    pub const SHELL_COMMAND_FLAG: &str = "/C";
}

/// 日志相关常量
pub mod logging {
    /// 日志文件环境变量
    pub const LOG_FILE_ENV: &str = "PANEL_LOG_FILE";
}
