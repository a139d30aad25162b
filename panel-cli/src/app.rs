use panel_core::{PanelError, PanelService, config::AppConfig, error::Result};
use std::path::Path;
use tracing::{debug, info};

use crate::cli::{BackupCommand, Commands, ScheduleCommand, ServerCommand};
use crate::commands;

#[derive(Clone)]
pub struct CliApp {
    pub config: AppConfig,
    pub panel: PanelService,
}

impl CliApp {
    /// 加载配置并打开数据库
    ///
    /// 指定了配置文件时必须存在；否则按候选文件名查找，找不到则写入默认配置。
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(PanelError::not_found(format!(
                        "配置文件 '{}' 未找到，请先运行 'panel-cli init'",
                        path.display()
                    )));
                }
                AppConfig::load_from_file(path)?
            }
            None => AppConfig::find_and_load_config()?,
        };
        debug!("使用数据库: {}", config.database.path);

        let panel = PanelService::open(config.clone()).await?;
        Ok(Self { config, panel })
    }

    /// 运行应用命令
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Init { .. } => Err(PanelError::custom("init 命令应在加载配置之前处理")),
            Commands::Serve { bind } => commands::run_serve(self, bind).await,
            Commands::Server(cmd) => self.run_server_command(cmd).await,
            Commands::Schedule(cmd) => self.run_schedule_command(cmd).await,
            Commands::Backup(cmd) => self.run_backup_command(cmd).await,
            Commands::Extract { archive, dest } => {
                info!("📦 解压归档...");
                commands::run_extract(self, archive, dest).await
            }
        }
    }

    async fn run_server_command(&self, cmd: ServerCommand) -> Result<()> {
        match cmd {
            ServerCommand::Add {
                name,
                folder,
                start_command,
                stop_command,
            } => commands::run_server_add(self, name, folder, start_command, stop_command).await,
            ServerCommand::List => commands::run_server_list(self).await,
            ServerCommand::BackupSettings {
                name,
                path,
                max_backups,
            } => commands::run_backup_settings(self, &name, path, max_backups).await,
        }
    }

    async fn run_schedule_command(&self, cmd: ScheduleCommand) -> Result<()> {
        match cmd {
            ScheduleCommand::Create { server, args } => {
                commands::run_schedule_create(self, &server, args).await
            }
            ScheduleCommand::List { server } => commands::run_schedule_list(self, &server).await,
            ScheduleCommand::Update { server, id, args } => {
                commands::run_schedule_update(self, &server, id, args).await
            }
            ScheduleCommand::Delete { server, id } => {
                commands::run_schedule_delete(self, &server, id).await
            }
            ScheduleCommand::Toggle { server, id } => {
                commands::run_schedule_toggle(self, &server, id).await
            }
            ScheduleCommand::Run { server, id } => {
                info!("🎯 手动执行定时任务 {}...", id);
                commands::run_schedule_now(self, &server, id).await
            }
        }
    }

    async fn run_backup_command(&self, cmd: BackupCommand) -> Result<()> {
        match cmd {
            BackupCommand::Create { server } => {
                info!("💾 创建备份...");
                commands::run_backup_create(self, &server).await
            }
            BackupCommand::List { server } => commands::run_backup_list(self, &server).await,
            BackupCommand::Delete { server, id } => {
                commands::run_backup_delete(self, &server, id).await
            }
            BackupCommand::Restore { server, id } => {
                info!("🔄 从备份恢复...");
                commands::run_backup_restore(self, &server, id).await
            }
            BackupCommand::Verify { server, id } => {
                commands::run_backup_verify(self, &server, id).await
            }
        }
    }
}
