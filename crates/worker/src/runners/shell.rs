use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use scheduler_core::{
    models::{Output, Task, TaskKind},
    SchedulerResult,
};

use super::TaskRunner;
use crate::worker::Worker;

/// Shell任务执行器
///
/// 退出码为 0 视为成功；只有任务开启 `output` 时才返回标准输出。
pub struct ShellTaskRunner;

#[async_trait]
impl TaskRunner for ShellTaskRunner {
    fn support(&self, task: &Task) -> bool {
        matches!(task.kind, TaskKind::Shell { .. })
    }

    async fn run(&self, task: &Task, _worker: &Worker) -> SchedulerResult<Output> {
        let TaskKind::Shell {
            command,
            cwd,
            environment,
            timeout,
        } = &task.kind
        else {
            return Ok(Output::error(&task.name, Some("不是Shell任务".to_string())));
        };

        let Some((program, args)) = command.split_first() else {
            return Ok(Output::error(&task.name, Some("命令为空".to_string())));
        };

        info!("执行Shell任务: task={}, command={:?}", task.name, command);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .envs(environment)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let execution = cmd.output();
        let limit = timeout.and_then(|seconds| Duration::try_from_secs_f64(seconds).ok());
        let result = match limit {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Shell任务 {} 超时 ({:?})", task.name, limit);
                    return Ok(Output::error(
                        &task.name,
                        Some(format!("执行超时: {}秒", limit.as_secs_f64())),
                    ));
                }
            },
            None => execution.await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                return Ok(Output::error(
                    &task.name,
                    Some(format!("启动Shell命令失败: {e}")),
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("命令执行失败，退出码: {:?}", output.status.code())
            } else {
                stderr
            };
            return Ok(Output::error(&task.name, Some(message)));
        }

        let stdout = task
            .output
            .then(|| String::from_utf8_lossy(&output.stdout).trim_end().to_string());
        Ok(Output::success(&task.name, stdout))
    }

    fn name(&self) -> &str {
        "shell"
    }
}
