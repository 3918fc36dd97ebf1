//! 从配置项构建任务
//!
//! 配置中的每个任务都是一个 JSON 对象，`type` 字段决定使用哪个类型构建器，
//! 其余公共字段（表达式、优先级、执行窗口等）由 [`TaskBuilder`] 统一处理。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tracing::debug;

use scheduler_core::{
    models::{Task, TaskKind, TaskState},
    SchedulerError, SchedulerResult,
};

use crate::expression_builder::ExpressionBuilderChain;

type Options = Map<String, Value>;

/// 按任务类型构建 [`TaskKind`]
pub trait KindBuilder: Send + Sync {
    fn support(&self, kind: &str) -> bool;

    fn build(&self, tasks: &TaskBuilder, options: &Options) -> SchedulerResult<TaskKind>;
}

pub struct NullKindBuilder;

impl KindBuilder for NullKindBuilder {
    fn support(&self, kind: &str) -> bool {
        kind == "null"
    }

    fn build(&self, _tasks: &TaskBuilder, _options: &Options) -> SchedulerResult<TaskKind> {
        Ok(TaskKind::Null)
    }
}

/// `command` 可以是字符串（按空白拆分）或字符串数组
pub struct ShellKindBuilder;

impl KindBuilder for ShellKindBuilder {
    fn support(&self, kind: &str) -> bool {
        kind == "shell"
    }

    fn build(&self, _tasks: &TaskBuilder, options: &Options) -> SchedulerResult<TaskKind> {
        let command = match options.get("command") {
            Some(Value::String(command)) => {
                command.split_whitespace().map(str::to_string).collect()
            }
            Some(Value::Array(_)) => string_list(options, "command")?,
            _ => return Err(invalid("shell 任务缺少 command 字段")),
        };
        if command.is_empty() {
            return Err(invalid("shell 任务的 command 不能为空"));
        }

        Ok(TaskKind::Shell {
            command,
            cwd: optional_string(options, "cwd")?,
            environment: string_map(options, "environment")?,
            timeout: optional_f64(options, "timeout")?,
        })
    }
}

pub struct CommandKindBuilder;

impl KindBuilder for CommandKindBuilder {
    fn support(&self, kind: &str) -> bool {
        kind == "command"
    }

    fn build(&self, _tasks: &TaskBuilder, options: &Options) -> SchedulerResult<TaskKind> {
        let command = optional_string(options, "command")?
            .ok_or_else(|| invalid("command 任务缺少 command 字段"))?;

        let options_map = match options.get("options") {
            None | Some(Value::Null) => HashMap::new(),
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            Some(_) => return Err(invalid("options 必须是对象")),
        };

        Ok(TaskKind::Command {
            command,
            arguments: string_list(options, "arguments")?,
            options: options_map,
        })
    }
}

pub struct HttpKindBuilder;

impl KindBuilder for HttpKindBuilder {
    fn support(&self, kind: &str) -> bool {
        kind == "http"
    }

    fn build(&self, _tasks: &TaskBuilder, options: &Options) -> SchedulerResult<TaskKind> {
        let url = optional_string(options, "url")?
            .ok_or_else(|| invalid("http 任务缺少 url 字段"))?;

        Ok(TaskKind::Http {
            url,
            method: optional_string(options, "method")?
                .map(|method| method.to_uppercase())
                .unwrap_or_else(|| "GET".to_string()),
            headers: string_map(options, "headers")?,
            body: optional_string(options, "body")?,
            timeout: optional_f64(options, "timeout")?,
        })
    }
}

/// 子任务按同样的规则递归构建
pub struct ChainedKindBuilder;

impl KindBuilder for ChainedKindBuilder {
    fn support(&self, kind: &str) -> bool {
        kind == "chained"
    }

    fn build(&self, tasks: &TaskBuilder, options: &Options) -> SchedulerResult<TaskKind> {
        let Some(Value::Array(children)) = options.get("tasks") else {
            return Err(invalid("chained 任务缺少 tasks 数组"));
        };

        let tasks = children
            .iter()
            .map(|child| match child {
                Value::Object(child) => tasks.build(child),
                _ => Err(invalid("chained 任务的子任务必须是对象")),
            })
            .collect::<SchedulerResult<Vec<_>>>()?;

        Ok(TaskKind::Chained { tasks })
    }
}

pub struct ProbeKindBuilder;

impl KindBuilder for ProbeKindBuilder {
    fn support(&self, kind: &str) -> bool {
        kind == "probe"
    }

    fn build(&self, _tasks: &TaskBuilder, options: &Options) -> SchedulerResult<TaskKind> {
        let external_probe_path = optional_string(options, "external_probe_path")?
            .ok_or_else(|| invalid("probe 任务缺少 external_probe_path 字段"))?;

        Ok(TaskKind::Probe {
            external_probe_path,
            error_on_failed_tasks: optional_bool(options, "error_on_failed_tasks")?
                .unwrap_or(false),
            delay: optional_u64(options, "delay")?.unwrap_or(0),
        })
    }
}

/// 任务构建器
pub struct TaskBuilder {
    builders: Vec<Arc<dyn KindBuilder>>,
    expressions: ExpressionBuilderChain,
    timezone: Tz,
}

impl TaskBuilder {
    pub fn new(
        builders: Vec<Arc<dyn KindBuilder>>,
        expressions: ExpressionBuilderChain,
        timezone: Tz,
    ) -> Self {
        Self {
            builders,
            expressions,
            timezone,
        }
    }

    pub fn with_default_builders(timezone: Tz) -> Self {
        Self::new(
            vec![
                Arc::new(NullKindBuilder),
                Arc::new(ShellKindBuilder),
                Arc::new(CommandKindBuilder),
                Arc::new(HttpKindBuilder),
                Arc::new(ChainedKindBuilder),
                Arc::new(ProbeKindBuilder),
            ],
            ExpressionBuilderChain::with_default_builders(),
            timezone,
        )
    }

    pub fn build(&self, options: &Options) -> SchedulerResult<Task> {
        let name = optional_string(options, "name")?
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| invalid("任务缺少 name 字段"))?;
        let kind_name = optional_string(options, "type")?
            .ok_or_else(|| invalid(format!("任务 {name} 缺少 type 字段")))?;

        let builder = self
            .builders
            .iter()
            .find(|builder| builder.support(&kind_name))
            .ok_or_else(|| invalid(format!("任务 {name} 的类型 {kind_name} 不受支持")))?;

        let mut task = Task::new(name, builder.build(self, options)?);

        let timezone = match optional_string(options, "timezone")? {
            Some(raw) => Some(raw.parse::<Tz>().map_err(|e| {
                invalid(format!("任务 {} 的时区 {raw} 无效: {e}", task.name))
            })?),
            None => None,
        };
        task.timezone = timezone;

        let expression = optional_string(options, "expression")?;
        if let Some(raw) = expression {
            task.expression = self
                .expressions
                .build(&raw, timezone.unwrap_or(self.timezone))?;
        }

        if let Some(priority) = optional_i64(options, "priority")? {
            let priority = i32::try_from(priority)
                .map_err(|_| invalid(format!("优先级 {priority} 超出范围")))?;
            task.set_priority(priority)?;
        }
        if let Some(nice) = optional_i64(options, "nice")? {
            let nice =
                i32::try_from(nice).map_err(|_| invalid(format!("nice值 {nice} 超出范围")))?;
            task.set_nice(nice)?;
        }

        task.description = optional_string(options, "description")?;
        task.tags = string_list(options, "tags")?;
        task.state = match optional_string(options, "state")?.as_deref() {
            None | Some("enabled") => TaskState::Enabled,
            Some("paused") => TaskState::Paused,
            Some("disabled") => TaskState::Disabled,
            Some(other) => return Err(invalid(format!("未知的任务状态: {other}"))),
        };

        task.single_run = optional_bool(options, "single_run")?.unwrap_or(false);
        task.queued = optional_bool(options, "queued")?.unwrap_or(false);
        task.tracked = optional_bool(options, "tracked")?.unwrap_or(true);
        task.output = optional_bool(options, "output")?.unwrap_or(false);
        task.max_duration = optional_f64(options, "max_duration")?;
        task.max_executions = optional_u64(options, "max_executions")?
            .map(|max| u32::try_from(max).unwrap_or(u32::MAX));
        task.max_retries = optional_u64(options, "max_retries")?
            .map(|max| u32::try_from(max).unwrap_or(u32::MAX));
        if let (Some(retries), Some(executions)) = (task.max_retries, task.max_executions) {
            if retries > executions {
                return Err(invalid(format!(
                    "任务 {} 的重试次数 {retries} 超过最大执行次数 {executions}",
                    task.name
                )));
            }
        }
        task.execution_relative_deadline =
            optional_u64(options, "execution_relative_deadline")?.map(Duration::from_secs);
        task.execution_start_date = optional_date(options, "execution_start_date")?;
        task.execution_end_date = optional_date(options, "execution_end_date")?;

        debug!(
            "已构建任务 {} (类型: {}, 表达式: {})",
            task.name,
            kind_name,
            task.expression.expression()
        );
        Ok(task)
    }
}

fn invalid(message: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidArgument(message.into())
}

fn optional_string(options: &Options, key: &str) -> SchedulerResult<Option<String>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(invalid(format!("字段 {key} 必须是字符串"))),
    }
}

fn optional_bool(options: &Options, key: &str) -> SchedulerResult<Option<bool>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(_) => Err(invalid(format!("字段 {key} 必须是布尔值"))),
    }
}

fn optional_i64(options: &Options, key: &str) -> SchedulerResult<Option<i64>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(format!("字段 {key} 必须是整数"))),
    }
}

fn optional_u64(options: &Options, key: &str) -> SchedulerResult<Option<u64>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(format!("字段 {key} 必须是非负整数"))),
    }
}

fn optional_f64(options: &Options, key: &str) -> SchedulerResult<Option<f64>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(format!("字段 {key} 必须是数字"))),
    }
}

fn optional_date(options: &Options, key: &str) -> SchedulerResult<Option<DateTime<Utc>>> {
    optional_string(options, key)?
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|date| date.with_timezone(&Utc))
                .map_err(|e| invalid(format!("字段 {key} 不是有效的RFC3339时间: {e}")))
        })
        .transpose()
}

fn string_list(options: &Options, key: &str) -> SchedulerResult<Vec<String>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| {
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid(format!("字段 {key} 只能包含字符串")))
            })
            .collect(),
        Some(_) => Err(invalid(format!("字段 {key} 必须是数组"))),
    }
}

fn string_map(options: &Options, key: &str) -> SchedulerResult<HashMap<String, String>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(HashMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::String(value) => value.clone(),
                    other => other.to_string(),
                };
                Ok((name.clone(), value))
            })
            .collect(),
        Some(_) => Err(invalid(format!("字段 {key} 必须是对象"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("测试数据必须是对象"),
        }
    }

    #[test]
    fn test_build_shell_task_with_common_fields() {
        let builder = TaskBuilder::with_default_builders(chrono_tz::UTC);
        let task = builder
            .build(&options(json!({
                "name": "backup",
                "type": "shell",
                "command": "tar -czf backup.tgz /srv",
                "expression": "0 2 * * *",
                "priority": 5,
                "nice": -3,
                "tags": ["ops"],
                "single_run": true,
                "max_executions": 3,
                "max_retries": 2,
                "execution_relative_deadline": 120,
                "execution_start_date": "2024-01-01T00:00:00Z",
            })))
            .unwrap();

        assert_eq!(task.name, "backup");
        assert_eq!(task.expression.expression(), "0 2 * * *");
        assert_eq!(task.priority, 5);
        assert_eq!(task.nice, Some(-3));
        assert_eq!(task.tags, vec!["ops".to_string()]);
        assert!(task.single_run);
        assert_eq!(task.max_executions, Some(3));
        assert_eq!(task.max_retries, Some(2));
        assert_eq!(task.execution_relative_deadline, Some(Duration::from_secs(120)));
        assert!(task.execution_start_date.is_some());
        match task.kind {
            TaskKind::Shell { command, .. } => {
                assert_eq!(command, vec!["tar", "-czf", "backup.tgz", "/srv"]);
            }
            other => panic!("意外的任务类型: {other:?}"),
        }
    }

    #[test]
    fn test_chained_task_builds_children() {
        let builder = TaskBuilder::with_default_builders(chrono_tz::UTC);
        let task = builder
            .build(&options(json!({
                "name": "pipeline",
                "type": "chained",
                "tasks": [
                    {"name": "first", "type": "null"},
                    {"name": "second", "type": "http", "url": "http://localhost/health"},
                ],
            })))
            .unwrap();

        match task.kind {
            TaskKind::Chained { tasks } => {
                assert_eq!(tasks.len(), 2);
                assert_eq!(tasks[1].kind.type_name(), "http");
            }
            other => panic!("意外的任务类型: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let builder = TaskBuilder::with_default_builders(chrono_tz::UTC);

        let cases = [
            json!({"type": "null"}),
            json!({"name": "foo"}),
            json!({"name": "foo", "type": "ftp"}),
            json!({"name": "foo", "type": "null", "priority": 5000}),
            json!({"name": "foo", "type": "null", "timezone": "Mars/Olympus"}),
            json!({"name": "foo", "type": "null", "expression": "every full moon"}),
            json!({"name": "foo", "type": "null", "state": "sleeping"}),
            json!({"name": "foo", "type": "shell", "command": ""}),
            json!({"name": "foo", "type": "null", "max_executions": 1, "max_retries": 2}),
        ];

        for case in cases {
            let error = builder.build(&options(case.clone())).unwrap_err();
            assert!(
                matches!(
                    error,
                    SchedulerError::InvalidArgument(_) | SchedulerError::InvalidExpression { .. }
                ),
                "{case} 返回了 {error:?}"
            );
        }
    }
}
