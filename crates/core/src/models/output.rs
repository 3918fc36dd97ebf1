use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Success,
    Error,
}

/// 执行器返回的任务执行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub task_name: String,
    pub output_type: OutputType,
    pub output: Option<String>,
}

impl Output {
    pub fn success(task_name: impl Into<String>, output: Option<String>) -> Self {
        Self {
            task_name: task_name.into(),
            output_type: OutputType::Success,
            output,
        }
    }

    pub fn error(task_name: impl Into<String>, output: Option<String>) -> Self {
        Self {
            task_name: task_name.into(),
            output_type: OutputType::Error,
            output,
        }
    }

    pub fn is_success(&self) -> bool {
        self.output_type == OutputType::Success
    }
}
