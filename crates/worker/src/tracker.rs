use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::debug;

use scheduler_core::models::Task;

/// 记录任务的执行耗时和内存峰值
///
/// `tracked` 为 false 的任务不做任何记录。
#[derive(Debug, Default)]
pub struct TaskExecutionTracker {
    started: Mutex<HashMap<String, Instant>>,
}

impl TaskExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, task: &Task) {
        if !task.tracked {
            return;
        }
        self.started
            .lock()
            .await
            .insert(task.name.clone(), Instant::now());
    }

    pub async fn end(&self, task: &mut Task) {
        if !task.tracked {
            return;
        }

        let Some(started) = self.started.lock().await.remove(&task.name) else {
            debug!("任务 {} 没有开始记录，跳过", task.name);
            return;
        };

        let elapsed = started.elapsed().as_secs_f64();
        task.execution_computation_time = Some((elapsed * 1000.0).round() / 1000.0);
        task.execution_memory_usage = Some(peak_memory_usage());
    }
}

/// 进程内存峰值（字节），无法读取时为 0
fn peak_memory_usage() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find_map(|line| line.strip_prefix("VmHWM:"))
                .and_then(|value| value.trim().trim_end_matches("kB").trim().parse::<u64>().ok())
        })
        .map_or(0, |kilobytes| kilobytes * 1024)
}
