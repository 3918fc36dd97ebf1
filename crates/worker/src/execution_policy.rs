//! 执行策略
//!
//! 决定一轮到期任务如何交给 [`Worker::handle_task`]：顺序执行、
//! 在同一个 tokio 任务内并发执行，或分发给 Worker 池。

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use scheduler_core::{models::TaskList, SchedulerError, SchedulerResult};

use crate::pool::WorkerPool;
use crate::worker::Worker;

#[async_trait]
pub trait ExecutionPolicy: Send + Sync {
    fn support(&self, policy: &str) -> bool;

    fn name(&self) -> &str;

    async fn execute(&self, worker: &Worker, tasks: &TaskList) -> SchedulerResult<()>;

    /// Worker 退出执行循环时调用
    async fn stop(&self) -> SchedulerResult<()> {
        Ok(())
    }
}

/// 按顺序逐个执行，每个任务之前检查停止标记
pub struct DefaultPolicy;

#[async_trait]
impl ExecutionPolicy for DefaultPolicy {
    fn support(&self, policy: &str) -> bool {
        policy == "default"
    }

    fn name(&self) -> &str {
        "default"
    }

    async fn execute(&self, worker: &Worker, tasks: &TaskList) -> SchedulerResult<()> {
        for task in tasks.iter() {
            if worker.should_stop() {
                debug!("Worker {} 收到停止请求，跳过剩余任务", worker.id());
                break;
            }
            worker.handle_task(task.clone()).await;
        }
        Ok(())
    }
}

/// 在当前 tokio 任务内并发执行全部任务
pub struct FiberPolicy;

#[async_trait]
impl ExecutionPolicy for FiberPolicy {
    fn support(&self, policy: &str) -> bool {
        policy == "fiber"
    }

    fn name(&self) -> &str {
        "fiber"
    }

    async fn execute(&self, worker: &Worker, tasks: &TaskList) -> SchedulerResult<()> {
        join_all(tasks.iter().map(|task| async move {
            // 已经开始的任务会执行完，尚未开始的任务在停止后不再执行
            if worker.should_stop() {
                debug!("Worker {} 收到停止请求，跳过任务 {}", worker.id(), task.name);
                return;
            }
            worker.handle_task(task.clone()).await;
        }))
        .await;
        Ok(())
    }
}

/// 把任务分发给 Worker 池，池为空时从当前 Worker 派生
pub struct SupervisorPolicy {
    pool: Arc<WorkerPool>,
    pool_size: usize,
}

impl SupervisorPolicy {
    pub fn new(pool: Arc<WorkerPool>, pool_size: usize) -> Self {
        Self {
            pool,
            pool_size: pool_size.max(1),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }
}

#[async_trait]
impl ExecutionPolicy for SupervisorPolicy {
    fn support(&self, policy: &str) -> bool {
        policy == "supervisor"
    }

    fn name(&self) -> &str {
        "supervisor"
    }

    async fn execute(&self, worker: &Worker, tasks: &TaskList) -> SchedulerResult<()> {
        if self.pool.count().await == 0 {
            self.pool.boot(worker, self.pool_size).await;
        }

        let failed = self.pool.run(tasks).await?;
        worker.absorb_failed_tasks(failed).await;
        Ok(())
    }

    async fn stop(&self) -> SchedulerResult<()> {
        self.pool.stop().await
    }
}

/// 执行策略注册表
pub struct ExecutionPolicyRegistry {
    policies: Vec<Arc<dyn ExecutionPolicy>>,
}

impl ExecutionPolicyRegistry {
    pub fn new(policies: Vec<Arc<dyn ExecutionPolicy>>) -> Self {
        Self { policies }
    }

    pub fn with_default_policies() -> Self {
        Self::new(vec![Arc::new(DefaultPolicy), Arc::new(FiberPolicy)])
    }

    pub fn add(&mut self, policy: Arc<dyn ExecutionPolicy>) {
        self.policies.push(policy);
    }

    /// 恰好一个策略支持该名称时返回它
    pub fn find(&self, policy: &str) -> SchedulerResult<Arc<dyn ExecutionPolicy>> {
        let mut matching = self
            .policies
            .iter()
            .filter(|candidate| candidate.support(policy));

        match (matching.next(), matching.next()) {
            (Some(found), None) => Ok(found.clone()),
            (None, _) => Err(SchedulerError::InvalidArgument(format!(
                "执行策略 \"{policy}\" 不可用"
            ))),
            (Some(_), Some(_)) => Err(SchedulerError::InvalidArgument(format!(
                "多个执行策略支持 \"{policy}\""
            ))),
        }
    }
}

impl Default for ExecutionPolicyRegistry {
    fn default() -> Self {
        Self::with_default_policies()
    }
}
