//! 调度策略
//!
//! 每个策略决定同时到期的一组任务的执行顺序。编排器按策略名选择
//! 第一个支持该名称的策略。
//!
//! 轮询、批处理、空闲和 nice 策略使用的是成对的"谁在前"判断，
//! 这些判断不构成严格弱序，因此统一交给 [`sort_by_precedence`]，
//! 它是稳定的插入排序，对任意判断函数都能终止且不会 panic。

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use scheduler_core::{
    models::{Task, TaskList, MAX_PRIORITY, MIN_PRIORITY},
    SchedulerError, SchedulerResult,
};

pub trait SchedulePolicy: Send + Sync {
    /// 返回排好序的任务，部分策略会修改任务字段
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList>;

    fn support(&self, policy: &str) -> bool;

    fn name(&self) -> &str;
}

/// 按 `before(a, b)` 排序：a 在 b 前时为 Less，b 在 a 前时为 Greater，否则相等
pub fn sort_by_precedence(tasks: TaskList, before: impl Fn(&Task, &Task) -> bool) -> TaskList {
    let compare = |a: &Task, b: &Task| {
        if before(a, b) {
            Ordering::Less
        } else if before(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    };

    let mut tasks = tasks.into_vec();
    for index in 1..tasks.len() {
        let mut position = index;
        while position > 0 && compare(&tasks[position - 1], &tasks[position]) == Ordering::Greater
        {
            tasks.swap(position - 1, position);
            position -= 1;
        }
    }

    tasks.into()
}

fn stable_sort_by(tasks: TaskList, compare: impl Fn(&Task, &Task) -> Ordering) -> TaskList {
    let mut tasks = tasks.into_vec();
    tasks.sort_by(|a, b| compare(a, b));
    tasks.into()
}

/// 按优先级升序
pub struct PriorityPolicy;

impl SchedulePolicy for PriorityPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(stable_sort_by(tasks, |a, b| a.priority.cmp(&b.priority)))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "priority"
    }

    fn name(&self) -> &str {
        "priority"
    }
}

/// 先调度的任务先执行
pub struct FirstInFirstOutPolicy;

impl SchedulePolicy for FirstInFirstOutPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(stable_sort_by(tasks, |a, b| {
            scheduled_at(a).cmp(&scheduled_at(b))
        }))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "first_in_first_out"
    }

    fn name(&self) -> &str {
        "first_in_first_out"
    }
}

/// 后调度的任务先执行
pub struct FirstInLastOutPolicy;

impl SchedulePolicy for FirstInLastOutPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(stable_sort_by(tasks, |a, b| {
            scheduled_at(b).cmp(&scheduled_at(a))
        }))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "first_in_last_out"
    }

    fn name(&self) -> &str {
        "first_in_last_out"
    }
}

fn scheduled_at(task: &Task) -> DateTime<Utc> {
    task.scheduled_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// 最早截止时间优先
///
/// 同时设置了到达时间和相对截止时间的任务，先把绝对截止时间更新为相对截止时间；
/// 缺少任一字段的任务保留原来的绝对截止时间，没有截止时间的任务排在最后。
pub struct DeadlinePolicy;

impl SchedulePolicy for DeadlinePolicy {
    fn sort(&self, mut tasks: TaskList) -> SchedulerResult<TaskList> {
        tasks.walk(|task| {
            if let (Some(_), Some(relative)) =
                (task.arrival_time, task.execution_relative_deadline)
            {
                task.execution_absolute_deadline = Some(relative);
            }
        });

        Ok(stable_sort_by(tasks, |a, b| {
            match (a.execution_absolute_deadline, b.execution_absolute_deadline) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "deadline"
    }

    fn name(&self) -> &str {
        "deadline"
    }
}

/// 按上次执行耗时升序
pub struct ExecutionDurationPolicy;

impl SchedulePolicy for ExecutionDurationPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(stable_sort_by(tasks, |a, b| {
            computation_time(a).total_cmp(&computation_time(b))
        }))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "execution_duration"
    }

    fn name(&self) -> &str {
        "execution_duration"
    }
}

/// 按上次执行内存峰值升序
pub struct MemoryUsagePolicy;

impl SchedulePolicy for MemoryUsagePolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(stable_sort_by(tasks, |a, b| {
            a.execution_memory_usage
                .unwrap_or(0)
                .cmp(&b.execution_memory_usage.unwrap_or(0))
        }))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "memory_usage"
    }

    fn name(&self) -> &str {
        "memory_usage"
    }
}

fn computation_time(task: &Task) -> f64 {
    task.execution_computation_time.unwrap_or(0.0)
}

/// 时间片轮询
///
/// 已经用完时间片（耗时不小于 `max_duration`）且耗时少于对方的任务排在前面。
/// 没有设置 `max_duration` 的任务永远不会用完时间片。
pub struct RoundRobinPolicy;

impl RoundRobinPolicy {
    pub fn precedes(task: &Task, other: &Task) -> bool {
        let spent = computation_time(task);
        task.max_duration
            .is_some_and(|slice| spent >= slice && spent < computation_time(other))
    }
}

impl SchedulePolicy for RoundRobinPolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(sort_by_precedence(tasks, Self::precedes))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "round_robin"
    }

    fn name(&self) -> &str {
        "round_robin"
    }
}

/// 批处理
///
/// 每次排序都会把优先级严格位于 (-1000, 1000) 内的任务优先级减一，
/// 该修改体现在返回的任务上。随后按优先级降序排列。
pub struct BatchPolicy;

impl BatchPolicy {
    pub fn precedes(task: &Task, other: &Task) -> bool {
        task.priority > other.priority
    }
}

impl SchedulePolicy for BatchPolicy {
    fn sort(&self, mut tasks: TaskList) -> SchedulerResult<TaskList> {
        tasks.walk(|task| {
            if task.priority > MIN_PRIORITY && task.priority < MAX_PRIORITY {
                task.priority -= 1;
            }
        });

        Ok(sort_by_precedence(tasks, Self::precedes))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "batch"
    }

    fn name(&self) -> &str {
        "batch"
    }
}

/// 空闲调度：只有优先级不高于 19 且低于对方的任务会被提前
pub struct IdlePolicy;

impl IdlePolicy {
    pub fn precedes(task: &Task, other: &Task) -> bool {
        task.priority <= 19 && task.priority < other.priority
    }
}

impl SchedulePolicy for IdlePolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(sort_by_precedence(tasks, Self::precedes))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "idle"
    }

    fn name(&self) -> &str {
        "idle"
    }
}

/// nice 调度：只在两个任务优先级都为 0 时比较，nice 值大的排在前面
pub struct NicePolicy;

impl NicePolicy {
    pub fn precedes(task: &Task, other: &Task) -> bool {
        if task.priority != 0 || other.priority != 0 {
            return false;
        }
        task.nice.unwrap_or(0) > other.nice.unwrap_or(0)
    }
}

impl SchedulePolicy for NicePolicy {
    fn sort(&self, tasks: TaskList) -> SchedulerResult<TaskList> {
        Ok(sort_by_precedence(tasks, Self::precedes))
    }

    fn support(&self, policy: &str) -> bool {
        policy == "nice"
    }

    fn name(&self) -> &str {
        "nice"
    }
}

/// 按名称选择策略并排序
pub struct SchedulePolicyOrchestrator {
    policies: Vec<Arc<dyn SchedulePolicy>>,
}

impl SchedulePolicyOrchestrator {
    pub fn new(policies: Vec<Arc<dyn SchedulePolicy>>) -> Self {
        Self { policies }
    }

    pub fn with_default_policies() -> Self {
        Self::new(vec![
            Arc::new(BatchPolicy),
            Arc::new(DeadlinePolicy),
            Arc::new(ExecutionDurationPolicy),
            Arc::new(FirstInFirstOutPolicy),
            Arc::new(FirstInLastOutPolicy),
            Arc::new(IdlePolicy),
            Arc::new(MemoryUsagePolicy),
            Arc::new(NicePolicy),
            Arc::new(PriorityPolicy),
            Arc::new(RoundRobinPolicy),
        ])
    }

    pub fn add_policy(&mut self, policy: Arc<dyn SchedulePolicy>) {
        self.policies.push(policy);
    }

    pub fn supports(&self, policy: &str) -> bool {
        self.policies.iter().any(|candidate| candidate.support(policy))
    }

    pub fn sort(&self, policy: &str, tasks: TaskList) -> SchedulerResult<TaskList> {
        if self.policies.is_empty() {
            return Err(SchedulerError::Runtime("没有注册任何调度策略".to_string()));
        }

        if tasks.is_empty() {
            return Ok(tasks);
        }

        let selected = self
            .policies
            .iter()
            .find(|candidate| candidate.support(policy))
            .ok_or_else(|| {
                SchedulerError::InvalidArgument(format!("调度策略 \"{policy}\" 不可用"))
            })?;

        debug!("使用 {} 策略排序 {} 个任务", selected.name(), tasks.count());
        selected.sort(tasks)
    }
}

impl Default for SchedulePolicyOrchestrator {
    fn default() -> Self {
        Self::with_default_policies()
    }
}
