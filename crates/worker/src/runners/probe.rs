use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use scheduler_core::{
    models::{Output, Task, TaskKind},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

/// 探针任务执行器
///
/// 请求外部探针地址，响应必须是包含 `failedTasks` 字段的 JSON 对象。
/// 开启 `error_on_failed_tasks` 时失败任务数不为 0 也视为失败。
pub struct ProbeTaskRunner {
    client: reqwest::Client,
}

impl ProbeTaskRunner {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn check(&self, path: &str, error_on_failed_tasks: bool) -> Result<(), String> {
        let body: Value = self
            .client
            .get(path)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .json()
            .await
            .map_err(|e| e.to_string())?;

        let failed_tasks = body
            .get("failedTasks")
            .and_then(Value::as_u64)
            .ok_or_else(|| "探针状态无效".to_string())?;

        if error_on_failed_tasks && failed_tasks != 0 {
            return Err("探针状态无效".to_string());
        }
        Ok(())
    }
}

impl Default for ProbeTaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRunner for ProbeTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Probe { .. })
    }

    async fn run(&self, task: &Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Probe {
            external_probe_path,
            error_on_failed_tasks,
            delay,
        } = &task.kind
        else {
            return Ok(Output::error(&task.name, None));
        };

        if *delay > 0 {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
        }

        debug!("检查外部探针: {}", external_probe_path);
        match self.check(external_probe_path, *error_on_failed_tasks).await {
            Ok(()) => Ok(Output::success(&task.name, Some("探针检查通过".to_string()))),
            Err(message) => Ok(Output::error(&task.name, Some(message))),
        }
    }

    fn name(&self) -> &str {
        "probe"
    }
}
