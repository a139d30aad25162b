use crate::cron::CronExpr;
use crate::database::Database;
use crate::error::{PanelError, Result};
use crate::models::ScheduleRecord;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use super::dispatch::{ActionDispatcher, ActionOutcome};
use super::engine::{CronEngine, EntryId, Job};

/// 调度核心
///
/// 启用的定时任务在引擎中恰好有一个条目，禁用的没有。
/// 增、删、改都在同一把锁内完成映射的修改，动作执行不持有这把锁。
pub struct ScheduleService {
    database: Database,
    dispatcher: ActionDispatcher,
    engine: CronEngine,
    registry: Mutex<HashMap<i64, EntryId>>,
}

impl ScheduleService {
    pub fn new(database: Database, dispatcher: ActionDispatcher) -> Self {
        Self {
            database,
            dispatcher,
            engine: CronEngine::new(),
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// 启动时加载全部启用的定时任务，单个任务注册失败只记录日志
    pub async fn load_all(&self) -> Result<usize> {
        let schedules = self.database.list_enabled_schedules().await?;
        let total = schedules.len();
        let mut loaded = 0;

        for schedule in &schedules {
            match self.add(schedule).await {
                Ok(()) => loaded += 1,
                Err(e) => error!("加载定时任务 {} ({}) 失败: {}", schedule.id, schedule.name, e),
            }
        }

        info!("已加载 {}/{} 个定时任务", loaded, total);
        Ok(loaded)
    }

    /// 注册定时任务；禁用的任务直接忽略，重复注册返回错误
    pub async fn add(&self, schedule: &ScheduleRecord) -> Result<()> {
        if !schedule.enabled {
            return Ok(());
        }
        let mut registry = self.registry.lock().await;
        self.add_locked(&mut registry, schedule).await
    }

    /// 注销定时任务，未注册时什么也不做
    pub async fn remove(&self, schedule_id: i64) -> Result<()> {
        let mut registry = self.registry.lock().await;
        self.remove_locked(&mut registry, schedule_id).await;
        Ok(())
    }

    /// 先注销再按启用状态重新注册，整个过程持有同一把锁
    pub async fn update(&self, schedule: &ScheduleRecord) -> Result<()> {
        let mut registry = self.registry.lock().await;
        self.remove_locked(&mut registry, schedule.id).await;
        if schedule.enabled {
            self.add_locked(&mut registry, schedule).await?;
        }
        Ok(())
    }

    /// 立即执行，不检查启用状态，也不涉及引擎条目
    pub async fn execute_manually(&self, schedule: &ScheduleRecord) -> ActionOutcome {
        info!("🎯 手动触发定时任务: {} (ID: {})", schedule.name, schedule.id);
        self.dispatcher.dispatch(schedule).await
    }

    pub async fn is_registered(&self, schedule_id: i64) -> bool {
        self.registry.lock().await.contains_key(&schedule_id)
    }

    pub async fn registered_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// 停止引擎并清空映射
    pub async fn shutdown(&self) {
        let mut registry = self.registry.lock().await;
        self.engine.stop().await;
        registry.clear();
        info!("调度器已停止");
    }

    async fn add_locked(
        &self,
        registry: &mut HashMap<i64, EntryId>,
        schedule: &ScheduleRecord,
    ) -> Result<()> {
        if registry.contains_key(&schedule.id) {
            return Err(PanelError::AlreadyScheduled(schedule.id));
        }

        let expression = schedule.cron_expression();
        let expr = CronExpr::parse(&expression)?;
        let entry_id = self.engine.add(expr, self.job_for(schedule)).await;
        registry.insert(schedule.id, entry_id);

        info!(
            "定时任务已注册: {} (ID: {}, 表达式: {})",
            schedule.name, schedule.id, expression
        );
        Ok(())
    }

    async fn remove_locked(&self, registry: &mut HashMap<i64, EntryId>, schedule_id: i64) {
        if let Some(entry_id) = registry.remove(&schedule_id) {
            self.engine.remove(entry_id).await;
            info!("定时任务已注销: {}", schedule_id);
        }
    }

    /// 触发回调捕获定时任务快照，注销后仍在执行的任务不受影响
    fn job_for(&self, schedule: &ScheduleRecord) -> Job {
        let dispatcher = self.dispatcher.clone();
        let schedule = Arc::new(schedule.clone());
        Arc::new(move || {
            let dispatcher = dispatcher.clone();
            let schedule = Arc::clone(&schedule);
            async move {
                dispatcher.dispatch(&schedule).await;
            }
            .boxed()
        })
    }
}
