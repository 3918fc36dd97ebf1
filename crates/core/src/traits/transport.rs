//! 任务存储传输层接口
//!
//! 调度核心只通过这一组窄接口访问任务存储，数据库、Redis
//! 和内存等具体后端都在核心之外实现。后端不可用时实现方应返回
//! [`SchedulerError::Transport`](crate::SchedulerError::Transport)，
//! 核心在当前调度周期内不会重试。

use async_trait::async_trait;

use crate::{
    models::{Task, TaskList},
    SchedulerResult,
};

#[async_trait]
pub trait Transport: Send + Sync {
    /// 列出全部任务
    async fn list(&self) -> SchedulerResult<TaskList>;

    /// 按名称获取任务，不存在时返回 `TaskNotFound`
    async fn get(&self, name: &str) -> SchedulerResult<Task>;

    /// 创建任务，同名任务已存在时返回 `AlreadyScheduled`
    async fn create(&self, task: Task) -> SchedulerResult<()>;

    /// 以新任务替换同名任务
    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;

    async fn delete(&self, name: &str) -> SchedulerResult<()>;

    async fn pause(&self, name: &str) -> SchedulerResult<()>;

    async fn resume(&self, name: &str) -> SchedulerResult<()>;

    /// 清空全部任务
    async fn clear(&self) -> SchedulerResult<()>;
}
