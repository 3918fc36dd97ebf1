use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use scheduler_core::{
    models::{Output, Task, TaskKind},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

/// 进程内注册的命令
#[async_trait]
pub trait ConsoleCommand: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        arguments: &[String],
        options: &HashMap<String, Value>,
    ) -> SchedulerResult<String>;
}

/// 按名称查找并执行已注册的命令
#[derive(Default)]
pub struct CommandTaskRunner {
    commands: HashMap<String, Arc<dyn ConsoleCommand>>,
}

impl CommandTaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: Arc<dyn ConsoleCommand>) -> Self {
        self.register(command);
        self
    }

    pub fn register(&mut self, command: Arc<dyn ConsoleCommand>) {
        self.commands.insert(command.name().to_string(), command);
    }
}

#[async_trait]
impl TaskRunner for CommandTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Command { .. })
    }

    async fn run(&self, task: &Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Command {
            command,
            arguments,
            options,
        } = &task.kind
        else {
            return Ok(Output::error(&task.name, Some("不是命令任务".to_string())));
        };

        let Some(registered) = self.commands.get(command) else {
            return Ok(Output::error(
                &task.name,
                Some(format!("命令 {command} 未注册")),
            ));
        };

        info!("执行命令任务: task={}, command={}", task.name, command);
        match registered.execute(arguments, options).await {
            Ok(output) => Ok(Output::success(&task.name, task.output.then_some(output))),
            Err(e) => Ok(Output::error(&task.name, Some(e.to_string()))),
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}
