use crate::cron::CronExpr;
use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 引擎内部条目ID
pub type EntryId = u64;

/// 到点执行的回调，每次触发生成一个新的 future
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// 周期任务引擎
///
/// 每个条目由一个定时协程驱动，触发时把任务放到独立的 tokio 任务中执行，
/// 因此不同条目、同一条目的多次触发之间都可能并发。
#[derive(Default)]
pub struct CronEngine {
    next_id: AtomicU64,
    entries: Mutex<HashMap<EntryId, JoinHandle<()>>>,
}

impl CronEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册条目并立即开始计时
    pub async fn add(&self, expr: CronExpr, job: Job) -> EntryId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("注册引擎条目 {}: {}", id, expr);
        let handle = tokio::spawn(run_entry(id, expr, job));
        self.entries.lock().await.insert(id, handle);
        id
    }

    /// 移除条目，只停止计时，已经在执行的任务不受影响
    pub async fn remove(&self, id: EntryId) -> bool {
        match self.entries.lock().await.remove(&id) {
            Some(handle) => {
                handle.abort();
                debug!("移除引擎条目 {}", id);
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, id: EntryId) -> bool {
        self.entries.lock().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// 停止全部条目
    pub async fn stop(&self) {
        for (_, handle) in self.entries.lock().await.drain() {
            handle.abort();
        }
    }
}

async fn run_entry(id: EntryId, expr: CronExpr, job: Job) {
    let mut last_fired: Option<NaiveDateTime> = None;

    loop {
        let now = Local::now();
        let after = match last_fired {
            Some(last) if last > now.naive_local() => last,
            _ => now.naive_local(),
        };

        let Some(next) = next_fire_time(&expr, after) else {
            warn!("引擎条目 {} ({}) 没有可用的下次触发时间，停止计时", id, expr);
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        debug!("引擎条目 {} 下次触发: {}", id, next);
        tokio::time::sleep(wait).await;

        last_fired = Some(next.naive_local());
        tokio::spawn((job)());
    }
}

/// 将本地时间的下一个匹配点转换为带时区时间，跳过夏令时空档
fn next_fire_time(expr: &CronExpr, mut after: NaiveDateTime) -> Option<DateTime<Local>> {
    loop {
        let next = expr.next_after(after)?;
        match Local.from_local_datetime(&next) {
            LocalResult::Single(time) => return Some(time),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => after = next,
        }
    }
}
