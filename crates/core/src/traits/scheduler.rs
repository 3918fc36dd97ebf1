use async_trait::async_trait;
use chrono_tz::Tz;

use crate::{
    models::{Task, TaskList},
    SchedulerResult,
};

/// 调度服务接口
///
/// Worker 通过该接口获取到期任务并回写任务状态，
/// 中间件通过它完成单次任务的取消调度。
#[async_trait]
pub trait SchedulerService: Send + Sync {
    /// 调度任务
    async fn schedule(&self, task: Task) -> SchedulerResult<()>;

    /// 取消调度任务
    async fn unschedule(&self, name: &str) -> SchedulerResult<()>;

    /// 更新任务
    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    /// 暂停任务
    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    /// 恢复任务
    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    /// 获取全部任务
    async fn get_tasks(&self) -> SchedulerResult<TaskList>;

    /// 获取当前到期的任务，按调度策略排好序
    async fn get_due_tasks(&self) -> SchedulerResult<TaskList>;

    /// 重新调度任务：先取消再重新加入
    async fn yield_task(&self, name: &str) -> SchedulerResult<()>;

    /// 只保留 `@reboot` 任务并重新调度
    async fn reboot(&self) -> SchedulerResult<()>;

    /// 调度器使用的时区
    fn timezone(&self) -> Tz;
}
