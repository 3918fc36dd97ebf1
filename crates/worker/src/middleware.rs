//! 执行阶段中间件
//!
//! 执行前中间件失败会中止当前任务；执行后中间件中只有必需中间件的错误
//! 会把任务记为失败，可选中间件的错误只记录日志。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use scheduler_core::{
    middleware::{order_middleware, Middleware},
    models::{ExecutionState, Task},
    SchedulerError, SchedulerEvent, SchedulerResult, SchedulerService,
};
use scheduler_dispatcher::SchedulerMiddleware;

use crate::worker::Worker;

#[async_trait]
pub trait WorkerMiddleware: Middleware {
    async fn pre_execution(&self, _task: &mut Task, _worker: &Worker) -> SchedulerResult<()> {
        Ok(())
    }

    async fn post_execution(&self, _task: &mut Task, _worker: &Worker) -> SchedulerResult<()> {
        Ok(())
    }
}

/// 执行中间件栈
#[derive(Default)]
pub struct WorkerMiddlewareStack {
    middleware: Vec<Arc<dyn WorkerMiddleware>>,
}

impl WorkerMiddlewareStack {
    pub fn new(middleware: Vec<Arc<dyn WorkerMiddleware>>) -> Self {
        Self {
            middleware: order_middleware(&middleware),
        }
    }

    /// 内置中间件：回调、状态回写、单次任务和最大执行次数
    pub fn with_default_middleware() -> Self {
        Self::new(vec![
            Arc::new(TaskCallbackMiddleware),
            Arc::new(TaskUpdateMiddleware),
            Arc::new(SingleRunTaskMiddleware),
            Arc::new(MaxExecutionMiddleware),
        ])
    }

    pub fn add(&mut self, middleware: Arc<dyn WorkerMiddleware>) {
        self.middleware.push(middleware);
        self.middleware = order_middleware(&self.middleware);
    }

    pub fn names(&self) -> Vec<String> {
        self.middleware
            .iter()
            .map(|middleware| middleware.name().to_string())
            .collect()
    }

    pub async fn run_pre_execution(&self, task: &mut Task, worker: &Worker) -> SchedulerResult<()> {
        for (index, middleware) in self.middleware.iter().enumerate() {
            if let Err(e) = middleware.pre_execution(task, worker).await {
                error!("执行前中间件 {} 失败 (任务: {}): {}", middleware.name(), task.name, e);
                let remaining = self
                    .middleware
                    .iter()
                    .skip(index + 1)
                    .filter(|middleware| middleware.is_required());
                for required in remaining {
                    if let Err(e) = required.pre_execution(task, worker).await {
                        error!("必需中间件 {} 失败: {}", required.name(), e);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// 全部执行后中间件都会运行，返回第一个必需中间件的错误
    pub async fn run_post_execution(&self, task: &mut Task, worker: &Worker) -> SchedulerResult<()> {
        let mut first_error = None;

        for middleware in &self.middleware {
            match middleware.post_execution(task, worker).await {
                Ok(()) => {}
                Err(e) if middleware.is_required() => {
                    error!("必需中间件 {} 失败 (任务: {}): {}", middleware.name(), task.name, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    warn!("执行后中间件 {} 失败 (任务: {}): {}", middleware.name(), task.name, e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

/// 调用任务上注册的调度和执行钩子，钩子返回 false 视为失败
///
/// 调度后钩子失败时任务会被取消调度。
pub struct TaskCallbackMiddleware;

impl Middleware for TaskCallbackMiddleware {
    fn name(&self) -> &str {
        "task_callback"
    }

    fn priority(&self) -> Option<i32> {
        Some(1)
    }
}

#[async_trait]
impl SchedulerMiddleware for TaskCallbackMiddleware {
    async fn pre_scheduling(
        &self,
        task: &mut Task,
        _scheduler: &dyn SchedulerService,
    ) -> SchedulerResult<()> {
        match &task.callbacks.before_scheduling {
            Some(hook) if !hook.call(task) => Err(SchedulerError::Middleware(format!(
                "任务 {} 的调度前回调失败",
                task.name
            ))),
            _ => Ok(()),
        }
    }

    async fn post_scheduling(
        &self,
        task: &Task,
        scheduler: &dyn SchedulerService,
    ) -> SchedulerResult<()> {
        match &task.callbacks.after_scheduling {
            Some(hook) if !hook.call(task) => {
                scheduler.unschedule(&task.name).await?;
                Err(SchedulerError::Middleware(format!(
                    "任务 {} 的调度后回调失败，已取消调度",
                    task.name
                )))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl WorkerMiddleware for TaskCallbackMiddleware {
    async fn pre_execution(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<()> {
        match &task.callbacks.before_executing {
            Some(hook) if !hook.call(task) => Err(SchedulerError::Middleware(format!(
                "任务 {} 的执行前回调失败",
                task.name
            ))),
            _ => Ok(()),
        }
    }

    async fn post_execution(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<()> {
        match &task.callbacks.after_executing {
            Some(hook) if !hook.call(task) => Err(SchedulerError::Middleware(format!(
                "任务 {} 的执行后回调失败",
                task.name
            ))),
            _ => Ok(()),
        }
    }
}

/// 把执行记录回写到调度器
pub struct TaskUpdateMiddleware;

impl Middleware for TaskUpdateMiddleware {
    fn name(&self) -> &str {
        "task_update"
    }

    fn priority(&self) -> Option<i32> {
        Some(5)
    }

    fn is_required(&self) -> bool {
        true
    }
}

#[async_trait]
impl WorkerMiddleware for TaskUpdateMiddleware {
    async fn post_execution(&self, task: &mut Task, worker: &Worker) -> SchedulerResult<()> {
        match worker.scheduler().update(&task.name, task.clone()).await {
            Err(SchedulerError::TaskNotFound { .. }) => {
                debug!("任务 {} 不在调度器中，跳过回写", task.name);
                Ok(())
            }
            result => result,
        }
    }
}

/// 单次任务执行成功后取消调度
pub struct SingleRunTaskMiddleware;

impl Middleware for SingleRunTaskMiddleware {
    fn name(&self) -> &str {
        "single_run"
    }

    fn priority(&self) -> Option<i32> {
        Some(15)
    }

    fn is_required(&self) -> bool {
        true
    }
}

#[async_trait]
impl WorkerMiddleware for SingleRunTaskMiddleware {
    async fn post_execution(&self, task: &mut Task, worker: &Worker) -> SchedulerResult<()> {
        if !task.single_run || task.execution_state != Some(ExecutionState::Succeed) {
            return Ok(());
        }

        match worker.scheduler().unschedule(&task.name).await {
            Ok(()) => info!("单次任务 {} 执行成功，已取消调度", task.name),
            Err(SchedulerError::TaskNotFound { .. }) => {
                debug!("单次任务 {} 不在调度器中", task.name);
            }
            Err(e) => return Err(e),
        }

        worker.dispatch(SchedulerEvent::SingleRunTaskExecuted {
            task: Box::new(task.clone()),
        });
        Ok(())
    }
}

/// 拒绝执行次数已达到上限的任务
pub struct MaxExecutionMiddleware;

impl Middleware for MaxExecutionMiddleware {
    fn name(&self) -> &str {
        "max_execution"
    }
}

#[async_trait]
impl WorkerMiddleware for MaxExecutionMiddleware {
    async fn pre_execution(&self, task: &mut Task, _worker: &Worker) -> SchedulerResult<()> {
        match task.max_executions {
            Some(max) if task.execution_count >= max => Err(SchedulerError::Middleware(format!(
                "任务 {} 已达到最大执行次数 {}",
                task.name, max
            ))),
            _ => Ok(()),
        }
    }
}
