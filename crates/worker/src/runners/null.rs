use async_trait::async_trait;

use scheduler_core::{
    models::{Output, Task, TaskKind},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

pub struct NullTaskRunner;

#[async_trait]
impl TaskRunner for NullTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Null)
    }

    async fn run(&self, task: &Task, _worker: &Worker) -> SchedulerResult<Output> {
        Ok(Output::success(&task.name, None))
    }

    fn name(&self) -> &str {
        "null"
    }
}
