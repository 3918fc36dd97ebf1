use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::expression::Expression;
use crate::{errors::SchedulerError, Result};

pub const MIN_PRIORITY: i32 = -1000;
pub const MAX_PRIORITY: i32 = 1000;
pub const MIN_NICE: i32 = -20;
pub const MAX_NICE: i32 = 19;

/// 任务定义
///
/// 任务以 `name` 作为在同一个调度器/传输层内的唯一键。
/// 调度器在 schedule/pause/resume/update 时修改它，
/// Worker 和执行跟踪器在每次执行后回写执行记录字段。
///
/// # 使用示例
///
/// ```rust
/// use scheduler_core::models::{Task, TaskKind};
///
/// let task = Task::new("cleanup", TaskKind::Null)
///     .with_expression("*/5 * * * *")
///     .unwrap()
///     .with_priority(10)
///     .unwrap();
/// assert_eq!(task.expression.expression(), "*/5 * * * *");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub kind: TaskKind,
    pub expression: Expression,
    /// 为空时使用调度器的时区
    pub timezone: Option<Tz>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub state: TaskState,
    pub execution_state: Option<ExecutionState>,
    /// 取值范围 [-1000, 1000]，数值越小越优先
    pub priority: i32,
    /// 取值范围 [-20, 19]
    pub nice: Option<i32>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub last_execution: Option<DateTime<Utc>>,
    /// 允许执行的时间窗口
    pub execution_start_date: Option<DateTime<Utc>>,
    pub execution_end_date: Option<DateTime<Utc>>,
    pub execution_start_time: Option<DateTime<Utc>>,
    pub execution_end_time: Option<DateTime<Utc>>,
    pub execution_relative_deadline: Option<Duration>,
    pub execution_absolute_deadline: Option<Duration>,
    /// 时间片长度（秒），只参与轮询策略的排序
    pub max_duration: Option<f64>,
    /// 上次执行耗时（秒）
    pub execution_computation_time: Option<f64>,
    /// 上次执行的内存峰值（字节）
    pub execution_memory_usage: Option<u64>,
    pub max_executions: Option<u32>,
    /// 失败后允许的重试次数，不应超过 `max_executions`
    pub max_retries: Option<u32>,
    pub execution_count: u32,
    pub queued: bool,
    pub single_run: bool,
    pub tracked: bool,
    /// 为 true 时执行器保留命令输出
    pub output: bool,
    #[serde(skip)]
    pub callbacks: TaskCallbacks,
}

impl Task {
    pub fn new(name: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            name: name.into(),
            kind,
            expression: Expression::new(),
            timezone: None,
            description: None,
            tags: Vec::new(),
            state: TaskState::Enabled,
            execution_state: None,
            priority: 0,
            nice: None,
            arrival_time: None,
            scheduled_at: None,
            last_execution: None,
            execution_start_date: None,
            execution_end_date: None,
            execution_start_time: None,
            execution_end_time: None,
            execution_relative_deadline: None,
            execution_absolute_deadline: None,
            max_duration: None,
            execution_computation_time: None,
            execution_memory_usage: None,
            max_executions: None,
            max_retries: None,
            execution_count: 0,
            queued: false,
            single_run: false,
            tracked: true,
            output: false,
            callbacks: TaskCallbacks::default(),
        }
    }

    pub fn with_expression(mut self, raw: &str) -> Result<Self> {
        self.expression = Expression::create(raw)?;
        Ok(self)
    }

    pub fn with_priority(mut self, priority: i32) -> Result<Self> {
        self.set_priority(priority)?;
        Ok(self)
    }

    pub fn with_nice(mut self, nice: i32) -> Result<Self> {
        self.set_nice(nice)?;
        Ok(self)
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    pub fn with_state(mut self, state: TaskState) -> Self {
        self.state = state;
        self
    }

    pub fn single_run(mut self) -> Self {
        self.single_run = true;
        self
    }

    pub fn set_priority(&mut self, priority: i32) -> Result<()> {
        if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
            return Err(SchedulerError::InvalidArgument(format!(
                "任务 {} 的优先级 {priority} 超出范围 [{MIN_PRIORITY}, {MAX_PRIORITY}]",
                self.name
            )));
        }
        self.priority = priority;
        Ok(())
    }

    pub fn set_nice(&mut self, nice: i32) -> Result<()> {
        if !(MIN_NICE..=MAX_NICE).contains(&nice) {
            return Err(SchedulerError::InvalidArgument(format!(
                "任务 {} 的nice值 {nice} 超出范围 [{MIN_NICE}, {MAX_NICE}]",
                self.name
            )));
        }
        self.nice = Some(nice);
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.state == TaskState::Enabled
    }

    /// 任务所在时区，未设置时退回到给定的默认时区
    pub fn timezone_or(&self, default: Tz) -> Tz {
        self.timezone.unwrap_or(default)
    }

    /// 给定时刻是否落在执行窗口内，窗口包含开始时刻、不包含结束时刻
    pub fn is_within_execution_window(&self, at: DateTime<Utc>) -> bool {
        let started = self.execution_start_date.map_or(true, |start| start <= at);
        let not_ended = self.execution_end_date.map_or(true, |end| at < end);
        started && not_ended
    }
}

/// 任务类型
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    Null,
    Shell {
        command: Vec<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        environment: HashMap<String, String>,
        /// 超时（秒）
        #[serde(default)]
        timeout: Option<f64>,
    },
    Command {
        command: String,
        #[serde(default)]
        arguments: Vec<String>,
        #[serde(default)]
        options: HashMap<String, serde_json::Value>,
    },
    Http {
        url: String,
        #[serde(default = "default_http_method")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        timeout: Option<f64>,
    },
    Chained {
        tasks: Vec<Task>,
    },
    Callback {
        #[serde(skip)]
        callback: Option<TaskCallback>,
        #[serde(default)]
        arguments: Vec<serde_json::Value>,
    },
    Probe {
        external_probe_path: String,
        #[serde(default)]
        error_on_failed_tasks: bool,
        /// 请求前的等待时间（毫秒）
        #[serde(default)]
        delay: u64,
    },
}

fn default_http_method() -> String {
    "GET".to_string()
}

impl TaskKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::Null => "null",
            TaskKind::Shell { .. } => "shell",
            TaskKind::Command { .. } => "command",
            TaskKind::Http { .. } => "http",
            TaskKind::Chained { .. } => "chained",
            TaskKind::Callback { .. } => "callback",
            TaskKind::Probe { .. } => "probe",
        }
    }
}

/// 任务生命周期状态，决定任务是否可被执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Enabled,
    Paused,
    Disabled,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Enabled => write!(f, "ENABLED"),
            TaskState::Paused => write!(f, "PAUSED"),
            TaskState::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// 最近一次执行的结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Succeed,
    Done,
    Incomplete,
    Errored,
    ToRetry,
}

/// 在调度和执行前后调用的任务钩子，返回 `false` 表示失败
#[derive(Clone)]
pub struct TaskHook(Arc<dyn Fn(&Task) -> bool + Send + Sync>);

impl TaskHook {
    pub fn new(hook: impl Fn(&Task) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub fn call(&self, task: &Task) -> bool {
        (self.0)(task)
    }
}

impl fmt::Debug for TaskHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskHook(..)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskCallbacks {
    pub before_scheduling: Option<TaskHook>,
    pub after_scheduling: Option<TaskHook>,
    pub before_executing: Option<TaskHook>,
    pub after_executing: Option<TaskHook>,
}

type CallbackFn =
    dyn Fn(&[serde_json::Value]) -> std::result::Result<Option<String>, String> + Send + Sync;

/// 回调任务的函数体
#[derive(Clone)]
pub struct TaskCallback(Arc<CallbackFn>);

impl TaskCallback {
    pub fn new(
        callback: impl Fn(&[serde_json::Value]) -> std::result::Result<Option<String>, String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, arguments: &[serde_json::Value]) -> std::result::Result<Option<String>, String> {
        (self.0)(arguments)
    }
}

impl fmt::Debug for TaskCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskCallback(..)")
    }
}
