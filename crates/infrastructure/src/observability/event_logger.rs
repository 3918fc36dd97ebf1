use tracing::{debug, error, info, warn};

use scheduler_core::{EventListener, SchedulerEvent};

/// 把调度事件输出为结构化日志
#[derive(Debug, Default)]
pub struct TracingEventListener;

impl TracingEventListener {
    pub fn new() -> Self {
        Self
    }
}

impl EventListener for TracingEventListener {
    fn on_event(&self, event: &SchedulerEvent) {
        let name = event.name();
        match event {
            SchedulerEvent::TaskScheduled { task } => {
                info!(
                    event = name,
                    task.name = %task.name,
                    task.type = task.kind.type_name(),
                    task.expression = task.expression.expression(),
                    "任务已调度"
                );
            }
            SchedulerEvent::TaskUnscheduled { task_name } => {
                info!(event = name, task.name = %task_name, "任务已取消调度");
            }
            SchedulerEvent::TaskExecuting { task, worker_id } => {
                debug!(
                    event = name,
                    task.name = %task.name,
                    task.type = task.kind.type_name(),
                    worker.id = %worker_id,
                    "任务开始执行"
                );
            }
            SchedulerEvent::TaskExecuted { task, output } => {
                info!(
                    event = name,
                    task.name = %task.name,
                    task.duration_seconds = task.execution_computation_time.unwrap_or(0.0),
                    output.length = output.output.as_ref().map_or(0, String::len),
                    "任务执行完成"
                );
            }
            SchedulerEvent::TaskFailed { failed_task } => {
                error!(
                    event = name,
                    task.name = %failed_task.task().name,
                    reason = failed_task.reason(),
                    "任务执行失败"
                );
            }
            SchedulerEvent::SingleRunTaskExecuted { task } => {
                info!(event = name, task.name = %task.name, "单次任务已执行并取消调度");
            }
            SchedulerEvent::WorkerSleeping {
                worker_id,
                duration,
            } => {
                debug!(
                    event = name,
                    worker.id = %worker_id,
                    sleep_seconds = duration.as_secs_f64(),
                    "Worker进入休眠"
                );
            }
            SchedulerEvent::WorkerForked {
                forked_from,
                forked,
            } => {
                debug!(
                    event = name,
                    worker.id = %forked,
                    worker.forked_from = %forked_from,
                    "Worker已派生"
                );
            }
            SchedulerEvent::WorkerPaused { worker_id } => {
                warn!(event = name, worker.id = %worker_id, "Worker已暂停");
            }
            SchedulerEvent::WorkerStarted { worker_id }
            | SchedulerEvent::WorkerRunning { worker_id }
            | SchedulerEvent::WorkerStopped { worker_id }
            | SchedulerEvent::WorkerRestarted { worker_id } => {
                info!(event = name, worker.id = %worker_id, "Worker状态变化");
            }
            SchedulerEvent::SchedulerRebooted { tasks } => {
                info!(event = name, tasks.count = tasks.count(), "调度器已重启");
            }
        }
    }
}
