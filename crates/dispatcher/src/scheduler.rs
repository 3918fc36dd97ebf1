use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use scheduler_core::{
    models::{Task, TaskList},
    EventDispatcher, SchedulerEvent, SchedulerResult, SchedulerService, Transport,
};

use crate::cron_utils::CronScheduler;
use crate::middleware::SchedulerMiddlewareStack;
use crate::policies::SchedulePolicyOrchestrator;

/// 任务调度器
///
/// 负责任务的增删改、暂停恢复，以及计算某一时刻的到期任务。
/// 到期任务交给调度策略编排器排序后返回给 Worker。
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    middleware: Arc<SchedulerMiddlewareStack>,
    events: Arc<EventDispatcher>,
    orchestrator: Arc<SchedulePolicyOrchestrator>,
    timezone: Tz,
    policy: String,
}

impl Scheduler {
    pub fn new(
        transport: Arc<dyn Transport>,
        middleware: Arc<SchedulerMiddlewareStack>,
        events: Arc<EventDispatcher>,
        orchestrator: Arc<SchedulePolicyOrchestrator>,
        timezone: Tz,
        policy: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            middleware,
            events,
            orchestrator,
            timezone,
            policy: policy.into(),
        }
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// 计算给定时刻到期的任务并按调度策略排序
    pub async fn get_due_tasks_at(&self, now: DateTime<Utc>) -> SchedulerResult<TaskList> {
        let tasks = self.transport.list().await?;
        let due = tasks.filter(|task| self.is_due(task, now));

        debug!(
            "共 {} 个任务，其中 {} 个在 {} 到期",
            tasks.count(),
            due.count(),
            now.format("%Y-%m-%d %H:%M")
        );

        self.orchestrator.sort(&self.policy, due)
    }

    fn is_due(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if !task.is_enabled() {
            debug!("任务 {} 处于 {} 状态，跳过", task.name, task.state);
            return false;
        }

        if !task.is_within_execution_window(now) {
            debug!("任务 {} 不在执行窗口内，跳过", task.name);
            return false;
        }

        if task.expression.is_reboot() {
            return task.last_execution.is_none();
        }

        if let Some(last_execution) = task.last_execution {
            if same_minute(last_execution, now) {
                debug!("任务 {} 在本分钟内已执行，跳过", task.name);
                return false;
            }
        }

        match CronScheduler::new(task.expression.expression()) {
            Ok(cron) => cron.is_due(now, task.timezone_or(self.timezone)),
            Err(e) => {
                warn!("任务 {} 的表达式无法解析: {}", task.name, e);
                false
            }
        }
    }
}

/// 任务表达式必须是合法的5段式CRON或已知的宏
fn validate_expression(task: &Task) -> SchedulerResult<()> {
    CronScheduler::validate_cron_expression(task.expression.expression()).map_err(|e| {
        warn!("任务 {} 的表达式无效: {}", task.name, e);
        e
    })
}

fn same_minute(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    let minute = Duration::minutes(1);
    match (a.duration_trunc(minute), b.duration_trunc(minute)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[async_trait]
impl SchedulerService for Scheduler {
    async fn schedule(&self, mut task: Task) -> SchedulerResult<()> {
        self.middleware.run_pre_scheduling(&mut task, self).await?;
        validate_expression(&task)?;

        task.scheduled_at = Some(Utc::now());
        if task.timezone.is_none() {
            task.timezone = Some(self.timezone);
        }

        self.transport.create(task.clone()).await?;
        info!(
            "任务 {} 已调度，表达式: {}",
            task.name,
            task.expression.expression()
        );

        self.events.dispatch(SchedulerEvent::TaskScheduled {
            task: Box::new(task.clone()),
        });

        self.middleware.run_post_scheduling(&task, self).await
    }

    async fn unschedule(&self, name: &str) -> SchedulerResult<()> {
        self.transport.delete(name).await?;
        info!("任务 {} 已取消调度", name);

        self.events.dispatch(SchedulerEvent::TaskUnscheduled {
            task_name: name.to_string(),
        });
        Ok(())
    }

    async fn update(&self, name: &str, task: Task) -> SchedulerResult<()> {
        validate_expression(&task)?;
        self.transport.update(name, task).await
    }

    async fn pause(&self, name: &str) -> SchedulerResult<()> {
        self.transport.pause(name).await?;
        info!("任务 {} 已暂停", name);
        Ok(())
    }

    async fn resume(&self, name: &str) -> SchedulerResult<()> {
        self.transport.resume(name).await?;
        info!("任务 {} 已恢复", name);
        Ok(())
    }

    async fn get_tasks(&self) -> SchedulerResult<TaskList> {
        self.transport.list().await
    }

    async fn get_due_tasks(&self) -> SchedulerResult<TaskList> {
        self.get_due_tasks_at(Utc::now()).await
    }

    async fn yield_task(&self, name: &str) -> SchedulerResult<()> {
        let task = self.transport.get(name).await?;
        self.unschedule(name).await?;
        self.schedule(task).await
    }

    async fn reboot(&self) -> SchedulerResult<()> {
        let tasks = self.transport.list().await?;
        let mut reboot_tasks = tasks.filter(|task| task.expression.is_reboot());

        self.transport.clear().await?;
        reboot_tasks.walk(|task| task.last_execution = None);
        for task in reboot_tasks.iter() {
            self.transport.create(task.clone()).await?;
        }

        info!(
            "调度器已重启，保留 {} 个 @reboot 任务",
            reboot_tasks.count()
        );
        self.events
            .dispatch(SchedulerEvent::SchedulerRebooted { tasks: reboot_tasks });
        Ok(())
    }

    fn timezone(&self) -> Tz {
        self.timezone
    }
}
