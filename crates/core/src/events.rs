//! 调度与执行生命周期事件
//!
//! 事件是不可变的负载，监听器只消费不返回结果。
//! 日志、探针和指标统计都通过注册监听器接入。

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::trace;

use crate::models::{FailedTask, Output, Task, TaskList};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    TaskScheduled { task: Box<Task> },
    TaskUnscheduled { task_name: String },
    TaskExecuting { task: Box<Task>, worker_id: String },
    TaskExecuted { task: Box<Task>, output: Output },
    TaskFailed { failed_task: Box<FailedTask> },
    SingleRunTaskExecuted { task: Box<Task> },
    WorkerStarted { worker_id: String },
    WorkerRunning { worker_id: String },
    WorkerSleeping { worker_id: String, duration: Duration },
    WorkerPaused { worker_id: String },
    WorkerStopped { worker_id: String },
    WorkerForked { forked_from: String, forked: String },
    WorkerRestarted { worker_id: String },
    SchedulerRebooted { tasks: TaskList },
}

impl SchedulerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::TaskScheduled { .. } => "task_scheduled",
            SchedulerEvent::TaskUnscheduled { .. } => "task_unscheduled",
            SchedulerEvent::TaskExecuting { .. } => "task_executing",
            SchedulerEvent::TaskExecuted { .. } => "task_executed",
            SchedulerEvent::TaskFailed { .. } => "task_failed",
            SchedulerEvent::SingleRunTaskExecuted { .. } => "single_run_task_executed",
            SchedulerEvent::WorkerStarted { .. } => "worker_started",
            SchedulerEvent::WorkerRunning { .. } => "worker_running",
            SchedulerEvent::WorkerSleeping { .. } => "worker_sleeping",
            SchedulerEvent::WorkerPaused { .. } => "worker_paused",
            SchedulerEvent::WorkerStopped { .. } => "worker_stopped",
            SchedulerEvent::WorkerForked { .. } => "worker_forked",
            SchedulerEvent::WorkerRestarted { .. } => "worker_restarted",
            SchedulerEvent::SchedulerRebooted { .. } => "scheduler_rebooted",
        }
    }
}

/// 事件监听器
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &SchedulerEvent);
}

/// 按注册顺序把事件分发给所有监听器
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    pub fn dispatch(&self, event: SchedulerEvent) {
        trace!("分发事件 {} 到 {} 个监听器", event.name(), self.listeners.len());
        for listener in &self.listeners {
            listener.on_event(&event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

/// 记录全部事件的监听器，用于断言事件序列和事后审计
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(SchedulerEvent::name)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventListener for EventRecorder {
    fn on_event(&self, event: &SchedulerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
