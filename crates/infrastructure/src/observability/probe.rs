use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use metrics::{counter, Counter};

use scheduler_core::{EventListener, SchedulerEvent};

/// 某一时刻的探针计数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSnapshot {
    pub scheduled_tasks: u64,
    pub executed_tasks: u64,
    pub failed_tasks: u64,
    pub last_executed_at: Option<DateTime<Utc>>,
}

/// 统计已调度、已执行和失败的任务数
///
/// 计数同时以 `metrics` 计数器发布，由外部导出器决定如何暴露。
pub struct ProbeListener {
    scheduled: AtomicU64,
    executed: AtomicU64,
    failed: AtomicU64,
    last_executed_at: Mutex<Option<DateTime<Utc>>>,

    scheduled_total: Counter,
    executed_total: Counter,
    failed_total: Counter,
}

impl ProbeListener {
    pub fn new() -> Self {
        Self {
            scheduled: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            last_executed_at: Mutex::new(None),
            scheduled_total: counter!("scheduler_tasks_scheduled_total"),
            executed_total: counter!("scheduler_tasks_executed_total"),
            failed_total: counter!("scheduler_tasks_failed_total"),
        }
    }

    pub fn snapshot(&self) -> ProbeSnapshot {
        ProbeSnapshot {
            scheduled_tasks: self.scheduled.load(Ordering::Relaxed),
            executed_tasks: self.executed.load(Ordering::Relaxed),
            failed_tasks: self.failed.load(Ordering::Relaxed),
            last_executed_at: *self
                .last_executed_at
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }
}

impl Default for ProbeListener {
    fn default() -> Self {
        Self::new()
    }
}

impl EventListener for ProbeListener {
    fn on_event(&self, event: &SchedulerEvent) {
        match event {
            SchedulerEvent::TaskScheduled { .. } => {
                self.scheduled.fetch_add(1, Ordering::Relaxed);
                self.scheduled_total.increment(1);
            }
            SchedulerEvent::TaskExecuted { task, .. } => {
                self.executed.fetch_add(1, Ordering::Relaxed);
                self.executed_total.increment(1);
                *self
                    .last_executed_at
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) =
                    task.last_execution.or_else(|| Some(Utc::now()));
            }
            SchedulerEvent::TaskFailed { .. } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.failed_total.increment(1);
            }
            _ => {}
        }
    }
}
