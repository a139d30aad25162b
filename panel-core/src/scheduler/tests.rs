use super::*;
use crate::backup::BackupManager;
use crate::cron::CronSpec;
use crate::database::Database;
use crate::error::{PanelError, Result};
use crate::models::{NewServer, ScheduleAction, ScheduleRecord, ServerRecord, ValidSchedule};
use crate::supervisor::ProcessSupervisor;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use tokio::sync::Mutex;

/// 记录调用并按脚本返回运行状态的进程管理器
#[derive(Default)]
struct MockSupervisor {
    running: Mutex<HashSet<i64>>,
    calls: Mutex<Vec<String>>,
}

impl MockSupervisor {
    async fn set_running(&self, server_id: i64, running: bool) {
        let mut set = self.running.lock().await;
        if running {
            set.insert(server_id);
        } else {
            set.remove(&server_id);
        }
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ProcessSupervisor for MockSupervisor {
    async fn is_server_running(&self, server: &ServerRecord) -> bool {
        self.running.lock().await.contains(&server.id)
    }

    async fn start_server(&self, server: &ServerRecord) -> Result<()> {
        self.calls.lock().await.push(format!("start:{}", server.name));
        self.set_running(server.id, true).await;
        Ok(())
    }

    async fn stop_server(&self, server: &ServerRecord) -> Result<()> {
        self.calls.lock().await.push(format!("stop:{}", server.name));
        self.set_running(server.id, false).await;
        Ok(())
    }

    async fn restart_server(&self, server: &ServerRecord) -> Result<()> {
        self.calls.lock().await.push(format!("restart:{}", server.name));
        Ok(())
    }

    async fn send_command(&self, server: &ServerRecord, command: &str) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(format!("command:{}:{}", server.name, command));
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    db: Database,
    supervisor: Arc<MockSupervisor>,
    dispatcher: ActionDispatcher,
    service: Arc<ScheduleService>,
    server: ServerRecord,
}

async fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let folder = dir.path().join("server");
    std::fs::create_dir_all(&folder).unwrap();
    std::fs::write(folder.join("eula.txt"), "eula=true").unwrap();

    let db = Database::connect_memory().await.unwrap();
    let server = db
        .create_server(
            NewServer {
                name: "lobby".into(),
                folder_path: folder.to_string_lossy().to_string(),
                start_command: "./start.sh".into(),
                stop_command: Some("stop".into()),
            },
            2,
        )
        .await
        .unwrap();

    let supervisor = Arc::new(MockSupervisor::default());
    let dispatcher = ActionDispatcher::new(
        db.clone(),
        supervisor.clone(),
        BackupManager::new(db.clone()),
    );
    let service = Arc::new(ScheduleService::new(db.clone(), dispatcher.clone()));

    Fixture {
        dir,
        db,
        supervisor,
        dispatcher,
        service,
        server,
    }
}

fn valid(action: ScheduleAction, enabled: bool) -> ValidSchedule {
    ValidSchedule {
        name: format!("{action} job"),
        cron: CronSpec {
            minute: "0".into(),
            hour: "*/2".into(),
            ..CronSpec::default()
        },
        action,
        command: action.requires_command().then(|| "say hi".to_string()),
        enabled,
    }
}

async fn create(fx: &Fixture, action: ScheduleAction, enabled: bool) -> ScheduleRecord {
    fx.db
        .create_schedule(fx.server.id, valid(action, enabled))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_duplicate_add_fails_and_remove_is_idempotent() {
    let fx = fixture().await;
    let schedule = create(&fx, ScheduleAction::Backup, true).await;

    fx.service.add(&schedule).await.unwrap();
    assert!(fx.service.is_registered(schedule.id).await);
    assert!(matches!(
        fx.service.add(&schedule).await,
        Err(PanelError::AlreadyScheduled(id)) if id == schedule.id
    ));
    assert_eq!(fx.service.registered_count().await, 1);

    fx.service.remove(schedule.id).await.unwrap();
    assert!(!fx.service.is_registered(schedule.id).await);
    fx.service.remove(schedule.id).await.unwrap();
    fx.service.remove(424242).await.unwrap();
}

#[tokio::test]
async fn test_disabled_schedule_never_registered() {
    let fx = fixture().await;
    let schedule = create(&fx, ScheduleAction::Backup, false).await;

    fx.service.add(&schedule).await.unwrap();
    assert!(!fx.service.is_registered(schedule.id).await);

    fx.service.update(&schedule).await.unwrap();
    assert!(!fx.service.is_registered(schedule.id).await);
}

#[tokio::test]
async fn test_update_follows_enabled_flag() {
    let fx = fixture().await;
    let mut schedule = create(&fx, ScheduleAction::Backup, true).await;

    // 未注册时更新即注册
    fx.service.update(&schedule).await.unwrap();
    assert!(fx.service.is_registered(schedule.id).await);

    // 重复更新仍只有一个条目
    fx.service.update(&schedule).await.unwrap();
    assert_eq!(fx.service.registered_count().await, 1);

    schedule.enabled = false;
    fx.service.update(&schedule).await.unwrap();
    assert!(!fx.service.is_registered(schedule.id).await);

    schedule.enabled = true;
    fx.service.update(&schedule).await.unwrap();
    assert!(fx.service.is_registered(schedule.id).await);
}

#[tokio::test]
async fn test_load_all_skips_disabled_and_logs_bad_entries() {
    let fx = fixture().await;
    let a = create(&fx, ScheduleAction::Backup, true).await;
    let b = create(&fx, ScheduleAction::StopServer, true).await;
    let off = create(&fx, ScheduleAction::StartServer, false).await;

    // 绕过校验写入一个无法解析的表达式
    let mut broken = valid(ScheduleAction::Backup, true);
    broken.cron.minute = "99".into();
    let broken = fx.db.create_schedule(fx.server.id, broken).await.unwrap();

    let loaded = fx.service.load_all().await.unwrap();
    assert_eq!(loaded, 2);
    assert!(fx.service.is_registered(a.id).await);
    assert!(fx.service.is_registered(b.id).await);
    assert!(!fx.service.is_registered(off.id).await);
    assert!(!fx.service.is_registered(broken.id).await);
}

#[tokio::test]
async fn test_execute_manually_ignores_enabled_flag() {
    let fx = fixture().await;
    let schedule = create(&fx, ScheduleAction::SendCommand, false).await;
    fx.supervisor.set_running(fx.server.id, true).await;

    let outcome = fx.service.execute_manually(&schedule).await;
    assert!(outcome.is_executed(), "{outcome:?}");
    assert_eq!(fx.supervisor.calls().await, vec!["command:lobby:say hi"]);
    assert!(!fx.service.is_registered(schedule.id).await);
}

#[tokio::test]
async fn test_guards_skip_without_side_effects() {
    let fx = fixture().await;

    for action in [
        ScheduleAction::SendCommand,
        ScheduleAction::RestartServer,
        ScheduleAction::StopServer,
    ] {
        let schedule = create(&fx, action, true).await;
        let outcome = fx.dispatcher.dispatch(&schedule).await;
        assert!(
            matches!(outcome, ActionOutcome::Skipped { .. }),
            "{action}: {outcome:?}"
        );
    }
    assert!(fx.supervisor.calls().await.is_empty());

    fx.supervisor.set_running(fx.server.id, true).await;
    let start = create(&fx, ScheduleAction::StartServer, true).await;
    assert!(matches!(
        fx.dispatcher.dispatch(&start).await,
        ActionOutcome::Skipped { .. }
    ));
    assert!(fx.supervisor.calls().await.is_empty());

    // 未配置备份目录
    let backup = create(&fx, ScheduleAction::Backup, true).await;
    assert!(matches!(
        fx.dispatcher.dispatch(&backup).await,
        ActionOutcome::Skipped { .. }
    ));
    assert_eq!(fx.db.count_backups(fx.server.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_actions_execute_when_guard_passes() {
    let fx = fixture().await;

    let start = create(&fx, ScheduleAction::StartServer, true).await;
    assert!(fx.dispatcher.dispatch(&start).await.is_executed());

    let restart = create(&fx, ScheduleAction::RestartServer, true).await;
    assert!(fx.dispatcher.dispatch(&restart).await.is_executed());

    let stop = create(&fx, ScheduleAction::StopServer, true).await;
    assert!(fx.dispatcher.dispatch(&stop).await.is_executed());

    assert_eq!(
        fx.supervisor.calls().await,
        vec!["start:lobby", "restart:lobby", "stop:lobby"]
    );
}

#[tokio::test]
async fn test_backup_action_rotates() {
    let fx = fixture().await;
    let backup_dir = fx.dir.path().join("backups");
    fx.db
        .update_backup_settings(fx.server.id, &backup_dir.to_string_lossy(), 2)
        .await
        .unwrap();

    let schedule = create(&fx, ScheduleAction::Backup, true).await;
    for _ in 0..3 {
        assert!(fx.dispatcher.dispatch(&schedule).await.is_executed());
    }

    let backups = fx.db.list_backups(fx.server.id).await.unwrap();
    assert_eq!(backups.len(), 2);
    for backup in &backups {
        assert!(backup.path().is_file());
        assert!(backup.file_name.starts_with("lobby_"));
    }
}

#[tokio::test]
async fn test_missing_server_fails() {
    let fx = fixture().await;
    let mut schedule = create(&fx, ScheduleAction::StartServer, true).await;
    schedule.server_id = 9999;

    assert!(matches!(
        fx.dispatcher.dispatch(&schedule).await,
        ActionOutcome::Failed { .. }
    ));
}

#[tokio::test]
async fn test_concurrent_updates_keep_single_entry() {
    let fx = fixture().await;
    let schedule = create(&fx, ScheduleAction::Backup, true).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let service = Arc::clone(&fx.service);
        let mut schedule = schedule.clone();
        schedule.enabled = i % 2 == 0;
        handles.push(tokio::spawn(async move {
            service.update(&schedule).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // 最终状态为 0 或 1 个条目，不会出现重复注册
    assert!(fx.service.registered_count().await <= 1);

    let mut last = schedule.clone();
    last.enabled = true;
    fx.service.update(&last).await.unwrap();
    assert_eq!(fx.service.registered_count().await, 1);

    fx.service.shutdown().await;
    assert_eq!(fx.service.registered_count().await, 0);
}
