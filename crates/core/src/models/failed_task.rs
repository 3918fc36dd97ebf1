use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;

/// 执行失败的任务，创建后不可变
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedTask {
    task: Task,
    reason: String,
    failed_at: DateTime<Utc>,
}

impl FailedTask {
    pub fn new(task: Task, reason: impl Into<String>) -> Self {
        Self {
            task,
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    /// 失败记录的名称，形如 `{任务名}.failed`
    pub fn name(&self) -> String {
        format!("{}.failed", self.task.name)
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn failed_at(&self) -> DateTime<Utc> {
        self.failed_at
    }
}
