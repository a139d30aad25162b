use crate::app::CliApp;
use crate::cli::ScheduleArgs;
use crate::utils::format_time;
use panel_core::{
    cron::CronSpec,
    error::Result,
    models::ScheduleInput,
    panel::ScheduleChange,
    scheduler::ActionOutcome,
};
use tracing::{error, info, warn};

impl From<ScheduleArgs> for ScheduleInput {
    fn from(args: ScheduleArgs) -> Self {
        ScheduleInput {
            name: args.name,
            cron: CronSpec {
                minute: args.minute,
                hour: args.hour,
                day_of_month: args.day_of_month,
                month: args.month,
                day_of_week: args.day_of_week,
            },
            action: args.action,
            command: args.command,
            enabled: !args.disabled,
        }
    }
}

fn report_change(verb: &str, change: &ScheduleChange) {
    let schedule = &change.schedule;
    info!(
        "✅ 定时任务已{}: {} (ID: {}, 表达式: {}, 动作: {})",
        verb,
        schedule.name,
        schedule.id,
        schedule.cron_expression(),
        schedule.action
    );
    if schedule.enabled && !change.registered {
        warn!("⚠️  定时任务已保存，但未能注册到调度器，请查看日志");
    }
    // 离线命令不会常驻，调度只在 serve 进程中生效
    info!("💡 新的调度在下次启动 'panel-cli serve' 时生效");
}

pub async fn run_schedule_create(app: &CliApp, server: &str, args: ScheduleArgs) -> Result<()> {
    let change = app.panel.create_schedule(server, args.into()).await?;
    report_change("创建", &change);
    Ok(())
}

pub async fn run_schedule_update(
    app: &CliApp,
    server: &str,
    id: i64,
    args: ScheduleArgs,
) -> Result<()> {
    let change = app.panel.update_schedule(server, id, args.into()).await?;
    report_change("更新", &change);
    Ok(())
}

pub async fn run_schedule_toggle(app: &CliApp, server: &str, id: i64) -> Result<()> {
    let change = app.panel.toggle_schedule(server, id).await?;
    let verb = if change.schedule.enabled { "启用" } else { "禁用" };
    report_change(verb, &change);
    Ok(())
}

pub async fn run_schedule_delete(app: &CliApp, server: &str, id: i64) -> Result<()> {
    let schedule = app.panel.delete_schedule(server, id).await?;
    info!("🗑️  定时任务已删除: {} (ID: {})", schedule.name, schedule.id);
    Ok(())
}

pub async fn run_schedule_list(app: &CliApp, server: &str) -> Result<()> {
    let schedules = app.panel.list_schedules(server).await?;

    if schedules.is_empty() {
        info!("📝 服务器 {} 暂无定时任务", server);
        return Ok(());
    }

    info!("⏰ 服务器 {} 的定时任务 ({} 个)", server, schedules.len());
    for schedule in &schedules {
        let status = if schedule.enabled { "✅" } else { "⏸️ " };
        info!(
            "   {} [{}] {}  {}  {}{}",
            status,
            schedule.id,
            schedule.name,
            schedule.cron_expression(),
            schedule.action,
            schedule
                .command
                .as_deref()
                .map(|c| format!(" \"{c}\""))
                .unwrap_or_default()
        );
        info!("        更新于 {}", format_time(&schedule.updated_at));
    }
    Ok(())
}

/// 立即执行一次
pub async fn run_schedule_now(app: &CliApp, server: &str, id: i64) -> Result<()> {
    match app.panel.execute_schedule(server, id).await? {
        ActionOutcome::Executed { message } => info!("✅ {}", message),
        ActionOutcome::Skipped { reason } => warn!("⚠️  已跳过: {}", reason),
        ActionOutcome::Failed { error } => error!("❌ 执行失败: {}", error),
    }
    Ok(())
}
