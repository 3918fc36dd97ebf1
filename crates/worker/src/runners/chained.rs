use async_trait::async_trait;
use tracing::info;

use scheduler_core::{
    models::{Output, Task, TaskKind, TaskList},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

/// 链式任务执行器
///
/// 在派生的 Worker 中依次执行子任务，任一子任务失败或被跳过则整体失败。
pub struct ChainedTaskRunner;

#[async_trait]
impl TaskRunner for ChainedTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Chained { .. })
    }

    async fn run(&self, task: &Task, worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Chained { tasks } = &task.kind else {
            return Ok(Output::error(&task.name, Some("不是链式任务".to_string())));
        };

        if tasks.is_empty() {
            return Ok(Output::success(&task.name, None));
        }

        let fork = worker.fork();
        let configuration = fork.configuration();
        info!(
            "链式任务 {} 在 Worker {} 中执行 {} 个子任务",
            task.name,
            fork.id(),
            tasks.len()
        );

        let result = fork
            .execute(configuration, Some(TaskList::from(tasks.clone())))
            .await;
        fork.stop();
        result?;

        let skipped = fork.skipped_tasks();
        if !skipped.is_empty() {
            return Ok(Output::error(
                &task.name,
                Some(format!("子任务正在其他Worker中执行，未能执行: {}", skipped.join(", "))),
            ));
        }

        let failed = fork.failed_tasks().await;
        if failed.is_empty() {
            return Ok(Output::success(&task.name, None));
        }

        let names = failed
            .iter()
            .map(|failed| failed.task().name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Output::error(
            &task.name,
            Some(format!("子任务执行失败: {names}")),
        ))
    }

    fn name(&self) -> &str {
        "chained"
    }
}
