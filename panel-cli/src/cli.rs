use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// 服务器管理相关命令
#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// 添加受管服务器
    Add {
        /// 服务器名称（唯一，不能包含路径分隔符）
        name: String,
        /// 服务器目录
        #[arg(long)]
        folder: PathBuf,
        /// 启动命令，在服务器目录中通过 shell 执行
        #[arg(long)]
        start_command: String,
        /// 停止命令，停止时写入控制台
        #[arg(long)]
        stop_command: Option<String>,
    },
    /// 列出所有服务器
    List,
    /// 查看或修改备份设置
    BackupSettings {
        /// 服务器名称
        name: String,
        /// 备份目录（不存在时自动创建）
        #[arg(long)]
        path: Option<String>,
        /// 最多保留的备份数量
        #[arg(long)]
        max_backups: Option<u32>,
    },
}

/// 定时任务字段
#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    /// 定时任务名称
    #[arg(long)]
    pub name: String,
    /// 分钟 (0-59)
    #[arg(long, default_value = "*")]
    pub minute: String,
    /// 小时 (0-23)
    #[arg(long, default_value = "*")]
    pub hour: String,
    /// 日 (1-31)
    #[arg(long, default_value = "*")]
    pub day_of_month: String,
    /// 月 (1-12)
    #[arg(long, default_value = "*")]
    pub month: String,
    /// 星期 (0-6，0 为周日)
    #[arg(long, default_value = "*")]
    pub day_of_week: String,
    /// 动作: send_command, start_server, restart_server, stop_server, backup
    #[arg(long)]
    pub action: String,
    /// send_command 动作要发送的命令
    #[arg(long)]
    pub command: Option<String>,
    /// 创建为禁用状态
    #[arg(long)]
    pub disabled: bool,
}

/// 定时任务相关命令
#[derive(Subcommand, Debug)]
pub enum ScheduleCommand {
    /// 创建定时任务
    Create {
        /// 服务器名称
        server: String,
        #[command(flatten)]
        args: ScheduleArgs,
    },
    /// 列出服务器的定时任务
    List {
        /// 服务器名称
        server: String,
    },
    /// 更新定时任务
    Update {
        /// 服务器名称
        server: String,
        /// 定时任务 ID
        id: i64,
        #[command(flatten)]
        args: ScheduleArgs,
    },
    /// 删除定时任务
    Delete {
        /// 服务器名称
        server: String,
        /// 定时任务 ID
        id: i64,
    },
    /// 切换启用状态
    Toggle {
        /// 服务器名称
        server: String,
        /// 定时任务 ID
        id: i64,
    },
    /// 立即执行一次（不受启用状态影响）
    Run {
        /// 服务器名称
        server: String,
        /// 定时任务 ID
        id: i64,
    },
}

/// 备份相关命令
#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// 立即创建备份
    Create {
        /// 服务器名称
        server: String,
    },
    /// 列出服务器的备份
    List {
        /// 服务器名称
        server: String,
    },
    /// 删除备份
    Delete {
        /// 服务器名称
        server: String,
        /// 备份 ID
        id: i64,
    },
    /// 从备份恢复服务器目录（服务器必须已停止）
    Restore {
        /// 服务器名称
        server: String,
        /// 备份 ID
        id: i64,
    },
    /// 校验备份文件是否完整
    Verify {
        /// 服务器名称
        server: String,
        /// 备份 ID
        id: i64,
    },
}

/// Server Panel CLI - 定时任务调度、备份与归档管理
#[derive(Parser)]
#[command(name = "panel-cli")]
#[command(about = "服务器面板：定时任务调度、备份轮换与归档恢复")]
#[command(version)]
pub struct Cli {
    /// 配置文件路径（不指定时依次查找 panel.toml、config.toml、.panel.toml）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 详细输出
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 创建配置文件和数据库
    Init {
        /// 如果配置文件已存在，强制覆盖
        #[arg(long)]
        force: bool,
    },
    /// 启动 HTTP API 和定时任务调度器
    Serve {
        /// 监听地址，覆盖配置文件中的 http.bind
        #[arg(long)]
        bind: Option<String>,
    },
    /// 服务器管理
    #[command(subcommand)]
    Server(ServerCommand),
    /// 定时任务管理
    #[command(subcommand)]
    Schedule(ScheduleCommand),
    /// 备份管理
    #[command(subcommand)]
    Backup(BackupCommand),
    /// 解压归档（.tar.gz, .tgz, .tar, .zip, .gz）
    Extract {
        /// 归档文件路径
        archive: PathBuf,
        /// 解压目标目录
        dest: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_schedule_create() {
        let cli = Cli::try_parse_from([
            "panel-cli",
            "schedule",
            "create",
            "survival",
            "--name",
            "nightly",
            "--minute",
            "0",
            "--hour",
            "3",
            "--action",
            "backup",
        ])
        .unwrap();

        match cli.command {
            Commands::Schedule(ScheduleCommand::Create { server, args }) => {
                assert_eq!(server, "survival");
                assert_eq!(args.minute, "0");
                assert_eq!(args.day_of_week, "*");
                assert!(!args.disabled);
            }
            _ => panic!("unexpected command"),
        }
    }
}
