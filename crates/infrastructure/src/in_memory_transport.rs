use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use scheduler_core::{
    models::{Task, TaskList, TaskState},
    SchedulerError, SchedulerResult, Transport,
};

/// 内存任务存储
///
/// 按插入顺序保存任务，适用于嵌入式部署和测试。
/// 克隆出的实例共享同一份存储。
#[derive(Debug, Clone, Default)]
pub struct InMemoryTransport {
    tasks: Arc<RwLock<IndexMap<String, Task>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用初始任务创建存储
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let tasks = tasks
            .into_iter()
            .map(|task| (task.name.clone(), task))
            .collect();
        Self {
            tasks: Arc::new(RwLock::new(tasks)),
        }
    }

    pub async fn count(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn list(&self) -> SchedulerResult<TaskList> {
        let tasks = self.tasks.read().await;
        Ok(tasks.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> SchedulerResult<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    async fn create(&self, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.name) {
            return Err(SchedulerError::already_scheduled(&task.name));
        }

        debug!("内存存储新增任务: {}", task.name);
        tasks.insert(task.name.clone(), task);
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let stored = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;

        *stored = task;
        Ok(())
    }

    async fn delete(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        tasks
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::task_not_found(name))
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;

        if task.state == TaskState::Paused {
            return Err(SchedulerError::Logic(format!("任务 {name} 已处于暂停状态")));
        }

        task.state = TaskState::Paused;
        Ok(())
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(name)
            .ok_or_else(|| SchedulerError::task_not_found(name))?;

        task.state = TaskState::Enabled;
        Ok(())
    }

    async fn clear(&self) -> SchedulerResult<()> {
        let mut tasks = self.tasks.write().await;
        info!("清空内存存储中的 {} 个任务", tasks.len());
        tasks.clear();
        Ok(())
    }
}
