use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error};

use scheduler_core::{
    middleware::{order_middleware, Middleware},
    models::Task,
    SchedulerResult, SchedulerService,
};

/// 调度阶段的中间件
///
/// `pre_scheduling` 可以修改任务，返回错误会中止本次调度；
/// `post_scheduling` 在任务写入传输层并发出事件之后执行。
#[async_trait]
pub trait SchedulerMiddleware: Middleware {
    async fn pre_scheduling(
        &self,
        _task: &mut Task,
        _scheduler: &dyn SchedulerService,
    ) -> SchedulerResult<()> {
        Ok(())
    }

    async fn post_scheduling(
        &self,
        _task: &Task,
        _scheduler: &dyn SchedulerService,
    ) -> SchedulerResult<()> {
        Ok(())
    }
}

/// 调度中间件栈
#[derive(Default)]
pub struct SchedulerMiddlewareStack {
    middleware: Vec<Arc<dyn SchedulerMiddleware>>,
}

impl SchedulerMiddlewareStack {
    pub fn new(middleware: Vec<Arc<dyn SchedulerMiddleware>>) -> Self {
        Self {
            middleware: order_middleware(&middleware),
        }
    }

    pub fn add(&mut self, middleware: Arc<dyn SchedulerMiddleware>) {
        self.middleware.push(middleware);
        self.middleware = order_middleware(&self.middleware);
    }

    pub fn names(&self) -> Vec<String> {
        self.middleware
            .iter()
            .map(|middleware| middleware.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub async fn run_pre_scheduling(
        &self,
        task: &mut Task,
        scheduler: &dyn SchedulerService,
    ) -> SchedulerResult<()> {
        for (index, middleware) in self.middleware.iter().enumerate() {
            debug!("执行调度前中间件 {} (任务: {})", middleware.name(), task.name);
            if let Err(e) = middleware.pre_scheduling(task, scheduler).await {
                error!("调度前中间件 {} 执行失败: {}", middleware.name(), e);
                for required in self.required_after(index) {
                    if let Err(e) = required.pre_scheduling(task, scheduler).await {
                        error!("必需中间件 {} 执行失败: {}", required.name(), e);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn run_post_scheduling(
        &self,
        task: &Task,
        scheduler: &dyn SchedulerService,
    ) -> SchedulerResult<()> {
        for (index, middleware) in self.middleware.iter().enumerate() {
            debug!("执行调度后中间件 {} (任务: {})", middleware.name(), task.name);
            if let Err(e) = middleware.post_scheduling(task, scheduler).await {
                error!("调度后中间件 {} 执行失败: {}", middleware.name(), e);
                for required in self.required_after(index) {
                    if let Err(e) = required.post_scheduling(task, scheduler).await {
                        error!("必需中间件 {} 执行失败: {}", required.name(), e);
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn required_after(&self, index: usize) -> impl Iterator<Item = &Arc<dyn SchedulerMiddleware>> {
        self.middleware
            .iter()
            .skip(index + 1)
            .filter(|middleware| middleware.is_required())
    }
}
