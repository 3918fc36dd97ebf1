use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use scheduler_core::{
    models::{FailedTask, TaskList},
    SchedulerError, SchedulerResult,
};

/// 可以放入 [`WorkerPool`] 的 Worker
#[async_trait]
pub trait PoolWorker: Send + Sync {
    fn id(&self) -> String;

    fn fork(&self) -> Arc<dyn PoolWorker>;

    /// 执行给定任务，返回失败的任务
    async fn run_tasks(&self, tasks: TaskList) -> SchedulerResult<Vec<FailedTask>>;

    fn stop(&self) -> SchedulerResult<()>;
}

/// Worker 池
///
/// 任务按轮转方式分配给池中的 Worker，每个 Worker 在独立的 tokio 任务中执行。
#[derive(Default)]
pub struct WorkerPool {
    workers: Mutex<Vec<Arc<dyn PoolWorker>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `source` 派生 `size` 个 Worker 加入池中
    pub async fn boot(&self, source: &dyn PoolWorker, size: usize) {
        let mut workers = self.workers.lock().await;
        for _ in 0..size {
            workers.push(source.fork());
        }
        info!("Worker池已启动，共 {} 个Worker", workers.len());
    }

    pub async fn scale_up(&self, count: usize) -> SchedulerResult<()> {
        let mut workers = self.workers.lock().await;
        let source = workers
            .first()
            .cloned()
            .ok_or_else(|| SchedulerError::Logic("Worker池为空，无法扩容".to_string()))?;

        for _ in 0..count {
            workers.push(source.fork());
        }
        info!("Worker池扩容 {} 个，当前 {} 个", count, workers.len());
        Ok(())
    }

    /// 移除最后加入的 Worker，停止失败只记录日志
    pub async fn scale_down(&self, count: usize) {
        let mut workers = self.workers.lock().await;
        for _ in 0..count {
            let Some(worker) = workers.pop() else {
                break;
            };
            if let Err(e) = worker.stop() {
                warn!("停止Worker {} 失败: {}", worker.id(), e);
            }
        }
        info!("Worker池缩容后剩余 {} 个", workers.len());
    }

    pub async fn run(&self, tasks: &TaskList) -> SchedulerResult<Vec<FailedTask>> {
        let workers = self.workers.lock().await.clone();
        if workers.is_empty() {
            return Err(SchedulerError::Logic("Worker池为空".to_string()));
        }

        let mut batches = vec![TaskList::new(); workers.len()];
        for (index, task) in tasks.iter().enumerate() {
            batches[index % workers.len()].add(task.clone());
        }

        let handles = workers
            .into_iter()
            .zip(batches)
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(worker, batch)| tokio::spawn(async move { worker.run_tasks(batch).await }))
            .collect::<Vec<_>>();

        let mut failed = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Ok(mut worker_failed)) => failed.append(&mut worker_failed),
                Ok(Err(e)) => error!("池中Worker执行失败: {}", e),
                Err(e) => error!("池中Worker任务异常退出: {}", e),
            }
        }
        Ok(failed)
    }

    /// 停止全部 Worker 并清空池，任一 Worker 停止失败时返回错误
    pub async fn stop(&self) -> SchedulerResult<()> {
        let workers = std::mem::take(&mut *self.workers.lock().await);

        let errors = workers
            .iter()
            .filter_map(|worker| {
                worker
                    .stop()
                    .err()
                    .map(|e| format!("{}: {}", worker.id(), e))
            })
            .collect::<Vec<_>>();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchedulerError::Runtime(format!(
                "停止Worker池失败: {}",
                errors.join("; ")
            )))
        }
    }

    pub async fn count(&self) -> usize {
        self.workers.lock().await.len()
    }
}
