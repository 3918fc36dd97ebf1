//! 调度端
//!
//! 负责表达式解析、任务构建、到期判断和调度策略排序。
//! Worker 只通过 [`scheduler_core::SchedulerService`] 使用这里的 [`Scheduler`]。

pub mod cron_utils;
pub mod expression_builder;
pub mod middleware;
pub mod policies;
pub mod scheduler;
pub mod task_builder;

pub use cron_utils::CronScheduler;
pub use expression_builder::{
    ComputedExpressionBuilder, CronExpressionBuilder, ExpressionBuilder, ExpressionBuilderChain,
    FluentExpressionBuilder,
};
pub use middleware::{SchedulerMiddleware, SchedulerMiddlewareStack};
pub use policies::{SchedulePolicy, SchedulePolicyOrchestrator};
pub use scheduler::Scheduler;
pub use task_builder::{KindBuilder, TaskBuilder};
