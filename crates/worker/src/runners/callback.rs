use async_trait::async_trait;

use scheduler_core::{
    models::{Output, Task, TaskKind},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

pub struct CallbackTaskRunner;

#[async_trait]
impl TaskRunner for CallbackTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Callback { .. })
    }

    async fn run(&self, task: &Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Callback {
            callback: Some(callback),
            arguments,
        } = &task.kind
        else {
            return Ok(Output::error(&task.name, Some("回调函数未设置".to_string())));
        };

        match callback.call(arguments) {
            Ok(output) => Ok(Output::success(&task.name, output)),
            Err(message) => Ok(Output::error(&task.name, Some(message))),
        }
    }

    fn name(&self) -> &str {
        "callback"
    }
}
