use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use scheduler_core::{config::WorkerSettings, models::Task};

/// Worker 的运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Running,
    Sleeping,
    Paused,
    Stopped,
}

impl WorkerState {
    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Running => 1,
            WorkerState::Sleeping => 2,
            WorkerState::Paused => 3,
            WorkerState::Stopped => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => WorkerState::Running,
            2 => WorkerState::Sleeping,
            3 => WorkerState::Paused,
            4 => WorkerState::Stopped,
            _ => WorkerState::Idle,
        }
    }
}

/// 单次 `execute` 使用的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfiguration {
    /// 为 true 时执行完一轮后休眠到下一分钟继续，否则执行一轮即停止
    pub sleep_until_next_minute: bool,
    /// 休眠到下一分钟后额外等待的秒数
    pub sleep_duration_delay: u64,
    pub execution_policy: String,
    pub is_fork: bool,
    pub forked_from: Option<String>,
}

impl WorkerConfiguration {
    pub fn new() -> Self {
        Self {
            sleep_until_next_minute: false,
            sleep_duration_delay: 1,
            execution_policy: "default".to_string(),
            is_fork: false,
            forked_from: None,
        }
    }

    pub fn builder() -> WorkerConfigurationBuilder {
        WorkerConfigurationBuilder::default()
    }

    pub fn from_settings(settings: &WorkerSettings) -> Self {
        Self::builder()
            .sleep_until_next_minute(settings.sleep_until_next_minute)
            .sleep_duration_delay(settings.sleep_duration_delay)
            .execution_policy(&settings.execution_policy)
            .build()
    }

    /// 派生 Worker 使用的配置
    pub fn for_fork(forked_from: &str) -> Self {
        Self {
            is_fork: true,
            forked_from: Some(forked_from.to_string()),
            ..Self::new()
        }
    }
}

impl Default for WorkerConfiguration {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct WorkerConfigurationBuilder {
    configuration: WorkerConfiguration,
}

impl WorkerConfigurationBuilder {
    pub fn sleep_until_next_minute(mut self, enabled: bool) -> Self {
        self.configuration.sleep_until_next_minute = enabled;
        self
    }

    pub fn sleep_duration_delay(mut self, seconds: u64) -> Self {
        self.configuration.sleep_duration_delay = seconds;
        self
    }

    pub fn execution_policy(mut self, policy: &str) -> Self {
        self.configuration.execution_policy = policy.to_string();
        self
    }

    pub fn build(self) -> WorkerConfiguration {
        self.configuration
    }
}

/// Worker 运行期的共享状态
///
/// `stop` 可能在另一个任务中被调用，因此全部使用原子量或短临界区。
#[derive(Debug)]
pub(crate) struct WorkerRuntime {
    should_stop: AtomicBool,
    state: AtomicU8,
    executed_tasks: AtomicU64,
    running_task: Mutex<Option<Task>>,
    last_executed_task: Mutex<Option<Task>>,
    /// 因执行锁被占用而跳过的任务名
    skipped_tasks: Mutex<Vec<String>>,
    wake: Notify,
}

impl WorkerRuntime {
    pub(crate) fn new() -> Self {
        Self {
            should_stop: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle.as_u8()),
            executed_tasks: AtomicU64::new(0),
            running_task: Mutex::new(None),
            last_executed_task: Mutex::new(None),
            skipped_tasks: Mutex::new(Vec::new()),
            wake: Notify::new(),
        }
    }

    pub(crate) fn reset(&self) {
        self.should_stop.store(false, Ordering::SeqCst);
        self.executed_tasks.store(0, Ordering::SeqCst);
        self.skipped_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.should_stop.load(Ordering::SeqCst)
    }

    pub(crate) fn request_stop(&self) {
        self.should_stop.store(true, Ordering::SeqCst);
        // 只唤醒正在休眠的 Worker，不留下许可
        self.wake.notify_waiters();
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn executed_tasks(&self) -> u64 {
        self.executed_tasks.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running_task(&self, task: Option<Task>) {
        *self
            .running_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = task;
    }

    pub(crate) fn running_task(&self) -> Option<Task> {
        self.running_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_executed(&self, task: Task) {
        self.executed_tasks.fetch_add(1, Ordering::SeqCst);
        *self
            .last_executed_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    pub(crate) fn last_executed_task(&self) -> Option<Task> {
        self.last_executed_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn record_skipped(&self, name: &str) {
        self.skipped_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_string());
    }

    pub(crate) fn skipped_tasks(&self) -> Vec<String> {
        self.skipped_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn wake(&self) -> &Notify {
        &self.wake
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let configuration = WorkerConfiguration::default();
        assert!(!configuration.sleep_until_next_minute);
        assert_eq!(configuration.sleep_duration_delay, 1);
        assert_eq!(configuration.execution_policy, "default");
        assert!(!configuration.is_fork);
    }

    #[test]
    fn test_fork_configuration() {
        let configuration = WorkerConfiguration::for_fork("worker-1");
        assert!(configuration.is_fork);
        assert_eq!(configuration.forked_from.as_deref(), Some("worker-1"));
        assert_eq!(configuration.execution_policy, "default");
    }

    #[test]
    fn test_state_round_trip_through_runtime() {
        let runtime = WorkerRuntime::new();
        assert_eq!(runtime.state(), WorkerState::Idle);

        for state in [
            WorkerState::Running,
            WorkerState::Sleeping,
            WorkerState::Paused,
            WorkerState::Stopped,
        ] {
            runtime.set_state(state);
            assert_eq!(runtime.state(), state);
        }
    }

    #[test]
    fn test_stop_request_is_cleared_by_reset() {
        let runtime = WorkerRuntime::new();
        runtime.request_stop();
        assert!(runtime.should_stop());

        runtime.reset();
        assert!(!runtime.should_stop());
    }
}
