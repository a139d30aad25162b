// 定时任务调度模块
//
// 主要组件：
// - CronEngine: 周期任务引擎，每个条目一个定时协程，到点后在独立任务中执行
// - ActionDispatcher: 按动作类型执行并检查服务器状态前置条件
// - ScheduleService: 维护 定时任务ID -> 引擎条目ID 的映射，串行化增删改

mod dispatch;
mod engine;
mod service;

#[cfg(test)]
mod tests;

pub use dispatch::{ActionDispatcher, ActionOutcome};
pub use engine::{CronEngine, EntryId, Job};
pub use service::ScheduleService;
