//! 任务执行器
//!
//! 执行器按注册顺序匹配，第一个 `support` 返回 true 的执行器负责执行任务。

mod callback;
mod chained;
mod command;
mod http;
mod null;
mod probe;
mod shell;

use std::sync::Arc;

use async_trait::async_trait;

use scheduler_core::{
    models::{Output, Task},
    SchedulerResult,
};

use crate::worker::Worker;

pub use callback::CallbackTaskRunner;
pub use chained::ChainedTaskRunner;
pub use command::{CommandTaskRunner, ConsoleCommand};
pub use http::HttpTaskRunner;
pub use null::NullTaskRunner;
pub use probe::ProbeTaskRunner;
pub use shell::ShellTaskRunner;

/// 任务执行器接口
///
/// 执行失败应尽量返回错误类型的 [`Output`]，
/// 返回 `Err` 同样会被 Worker 记为失败任务。
#[async_trait]
pub trait TaskRunner: Send + Sync {
    fn support(&self, task: &Task) -> bool;

    async fn run(&self, task: &Task, worker: &Worker) -> SchedulerResult<Output>;

    fn name(&self) -> &str;
}

#[derive(Default)]
pub struct RunnerRegistry {
    runners: Vec<Arc<dyn TaskRunner>>,
}

impl RunnerRegistry {
    pub fn new(runners: Vec<Arc<dyn TaskRunner>>) -> Self {
        Self { runners }
    }

    /// 注册全部内置执行器，命令执行器使用给定的命令表
    pub fn with_default_runners(commands: CommandTaskRunner) -> Self {
        Self::new(vec![
            Arc::new(NullTaskRunner),
            Arc::new(ShellTaskRunner),
            Arc::new(commands),
            Arc::new(HttpTaskRunner::new()),
            Arc::new(ChainedTaskRunner),
            Arc::new(CallbackTaskRunner),
            Arc::new(ProbeTaskRunner::new()),
        ])
    }

    pub fn add(&mut self, runner: Arc<dyn TaskRunner>) {
        self.runners.push(runner);
    }

    pub fn find(&self, task: &Task) -> Option<Arc<dyn TaskRunner>> {
        self.runners
            .iter()
            .find(|runner| runner.support(task))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}
