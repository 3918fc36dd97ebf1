use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use tracing::{debug, error, info, warn};

use scheduler_core::{
    models::{ExecutionState, FailedTask, Task, TaskList},
    EventDispatcher, SchedulerError, SchedulerEvent, SchedulerResult, SchedulerService,
};

use crate::configuration::{WorkerConfiguration, WorkerRuntime, WorkerState};
use crate::execution_policy::{ExecutionPolicy, ExecutionPolicyRegistry};
use crate::lock::{task_lock_key, InMemoryLockStore, LockGuard, LockStore};
use crate::middleware::WorkerMiddlewareStack;
use crate::pool::PoolWorker;
use crate::runners::{CommandTaskRunner, RunnerRegistry};
use crate::tracker::TaskExecutionTracker;

/// Worker构建器
pub struct WorkerBuilder {
    scheduler: Arc<dyn SchedulerService>,
    runners: Option<RunnerRegistry>,
    middleware: Option<WorkerMiddlewareStack>,
    events: Arc<EventDispatcher>,
    locks: Arc<dyn LockStore>,
    policies: Option<ExecutionPolicyRegistry>,
    configuration: WorkerConfiguration,
}

impl WorkerBuilder {
    pub fn new(scheduler: Arc<dyn SchedulerService>) -> Self {
        Self {
            scheduler,
            runners: None,
            middleware: None,
            events: Arc::new(EventDispatcher::new()),
            locks: Arc::new(InMemoryLockStore::new()),
            policies: None,
            configuration: WorkerConfiguration::default(),
        }
    }

    pub fn runners(mut self, runners: RunnerRegistry) -> Self {
        self.runners = Some(runners);
        self
    }

    pub fn middleware(mut self, middleware: WorkerMiddlewareStack) -> Self {
        self.middleware = Some(middleware);
        self
    }

    /// 与调度器共享同一个分发器时，调度和执行事件会进入同一组监听器
    pub fn events(mut self, events: Arc<EventDispatcher>) -> Self {
        self.events = events;
        self
    }

    pub fn locks(mut self, locks: Arc<dyn LockStore>) -> Self {
        self.locks = locks;
        self
    }

    pub fn policies(mut self, policies: ExecutionPolicyRegistry) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn configuration(mut self, configuration: WorkerConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn build(self) -> Worker {
        Worker {
            id: generate_worker_id(),
            scheduler: self.scheduler,
            runners: Arc::new(
                self.runners
                    .unwrap_or_else(|| RunnerRegistry::with_default_runners(CommandTaskRunner::new())),
            ),
            middleware: Arc::new(
                self.middleware
                    .unwrap_or_else(WorkerMiddlewareStack::with_default_middleware),
            ),
            events: self.events,
            locks: self.locks,
            policies: Arc::new(self.policies.unwrap_or_default()),
            tracker: Arc::new(TaskExecutionTracker::new()),
            configuration: RwLock::new(self.configuration),
            runtime: WorkerRuntime::new(),
            failed_tasks: tokio::sync::RwLock::new(Vec::new()),
        }
    }
}

/// 任务执行Worker
///
/// 每一轮从调度器获取到期任务（或使用调用方给定的任务），交给执行策略逐个处理。
/// 单个任务的失败只会生成 [`FailedTask`] 和 `TaskFailed` 事件，不会中断循环。
/// `stop` 只在任务之间生效，不会打断正在执行的任务。
pub struct Worker {
    id: String,
    scheduler: Arc<dyn SchedulerService>,
    runners: Arc<RunnerRegistry>,
    middleware: Arc<WorkerMiddlewareStack>,
    events: Arc<EventDispatcher>,
    locks: Arc<dyn LockStore>,
    policies: Arc<ExecutionPolicyRegistry>,
    tracker: Arc<TaskExecutionTracker>,
    configuration: RwLock<WorkerConfiguration>,
    runtime: WorkerRuntime,
    failed_tasks: tokio::sync::RwLock<Vec<FailedTask>>,
}

impl Worker {
    pub fn builder(scheduler: Arc<dyn SchedulerService>) -> WorkerBuilder {
        WorkerBuilder::new(scheduler)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scheduler(&self) -> &Arc<dyn SchedulerService> {
        &self.scheduler
    }

    pub fn dispatch(&self, event: SchedulerEvent) {
        self.events.dispatch(event);
    }

    pub fn configuration(&self) -> WorkerConfiguration {
        self.configuration
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> WorkerState {
        self.runtime.state()
    }

    pub fn is_running(&self) -> bool {
        self.runtime.state() == WorkerState::Running
    }

    pub fn should_stop(&self) -> bool {
        self.runtime.should_stop()
    }

    /// 本次 `execute` 中成功执行的任务数
    pub fn executed_tasks(&self) -> u64 {
        self.runtime.executed_tasks()
    }

    pub fn running_task(&self) -> Option<Task> {
        self.runtime.running_task()
    }

    pub fn last_executed_task(&self) -> Option<Task> {
        self.runtime.last_executed_task()
    }

    /// 本次执行中因执行锁被占用而跳过的任务
    pub fn skipped_tasks(&self) -> Vec<String> {
        self.runtime.skipped_tasks()
    }

    pub async fn failed_tasks(&self) -> Vec<FailedTask> {
        self.failed_tasks.read().await.clone()
    }

    /// 执行任务直到停止
    ///
    /// `tasks` 非空时第一轮使用给定任务，之后的轮次从调度器获取。
    /// 未开启 `sleep_until_next_minute` 时只执行一轮。
    pub async fn execute(
        &self,
        configuration: WorkerConfiguration,
        tasks: Option<TaskList>,
    ) -> SchedulerResult<()> {
        if self.runners.is_empty() {
            return Err(SchedulerError::UndefinedRunner(
                "Worker没有注册任何任务执行器".to_string(),
            ));
        }

        let policy = self.policies.find(&configuration.execution_policy)?;

        *self
            .configuration
            .write()
            .unwrap_or_else(PoisonError::into_inner) = configuration.clone();
        self.runtime.reset();
        self.runtime.set_state(WorkerState::Running);
        self.dispatch(SchedulerEvent::WorkerStarted {
            worker_id: self.id.clone(),
        });
        info!(
            "Worker {} 启动，执行策略: {}",
            self.id,
            policy.name()
        );

        let result = self.run_loop(&configuration, policy.as_ref(), tasks).await;

        if let Err(e) = policy.stop().await {
            warn!("停止执行策略 {} 失败: {}", policy.name(), e);
        }

        self.runtime.set_state(WorkerState::Stopped);
        self.dispatch(SchedulerEvent::WorkerStopped {
            worker_id: self.id.clone(),
        });
        info!(
            "Worker {} 已停止，共执行 {} 个任务",
            self.id,
            self.runtime.executed_tasks()
        );

        result
    }

    async fn run_loop(
        &self,
        configuration: &WorkerConfiguration,
        policy: &dyn ExecutionPolicy,
        tasks: Option<TaskList>,
    ) -> SchedulerResult<()> {
        let mut provided = tasks.filter(|tasks| !tasks.is_empty());

        while !self.should_stop() {
            let due = match provided.take() {
                Some(tasks) => tasks,
                None => self.scheduler.get_due_tasks().await?,
            };

            let executable = due.filter(|task| {
                let enabled = task.is_enabled();
                if !enabled {
                    info!("任务 {} 当前状态为 {}，跳过执行", task.name, task.state);
                }
                enabled
            });

            if self.state() == WorkerState::Paused {
                debug!("Worker {} 已暂停，跳过 {} 个任务", self.id, executable.count());
            } else if !executable.is_empty() {
                policy.execute(self, &executable).await?;
            }

            if self.should_stop() || !configuration.sleep_until_next_minute {
                break;
            }

            self.sleep(configuration).await;
        }

        Ok(())
    }

    /// 休眠到下一分钟开始后 `sleep_duration_delay` 秒，`stop` 会提前唤醒
    async fn sleep(&self, configuration: &WorkerConfiguration) {
        let duration = sleep_duration(Utc::now(), configuration.sleep_duration_delay);
        let paused = self.state() == WorkerState::Paused;

        if !paused {
            self.runtime.set_state(WorkerState::Sleeping);
        }
        self.dispatch(SchedulerEvent::WorkerSleeping {
            worker_id: self.id.clone(),
            duration,
        });
        debug!("Worker {} 休眠 {:?}", self.id, duration);

        let wake = self.runtime.wake().notified();
        tokio::pin!(wake);
        wake.as_mut().enable();
        if self.should_stop() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = &mut wake => {
                debug!("Worker {} 被提前唤醒", self.id);
            }
        }

        if self.should_stop() || self.state() == WorkerState::Paused {
            return;
        }

        self.runtime.set_state(WorkerState::Running);
        self.dispatch(SchedulerEvent::WorkerRunning {
            worker_id: self.id.clone(),
        });
    }

    /// 处理单个任务
    ///
    /// 执行锁在整个处理过程中持有，离开作用域时释放。
    pub async fn handle_task(&self, task: Task) {
        let Some(_lock) = LockGuard::acquire(self.locks.as_ref(), task_lock_key(&task.name)) else {
            info!("任务 {} 正在其他Worker中执行，跳过", task.name);
            self.runtime.record_skipped(&task.name);
            return;
        };

        let mut task = task;

        if let Err(e) = self.middleware.run_pre_execution(&mut task, self).await {
            self.fail(task, e.to_string()).await;
            return;
        }

        let Some(runner) = self.runners.find(&task) else {
            let reason = format!("没有执行器支持 {} 类型的任务", task.kind.type_name());
            self.fail(task, reason).await;
            return;
        };

        self.dispatch(SchedulerEvent::TaskExecuting {
            task: Box::new(task.clone()),
            worker_id: self.id.clone(),
        });
        debug!("任务 {} 由执行器 {} 执行", task.name, runner.name());

        let started_at = Utc::now();
        task.arrival_time = Some(started_at);
        task.execution_start_time = Some(started_at);
        task.execution_state = Some(ExecutionState::Running);
        self.runtime.set_running_task(Some(task.clone()));

        self.tracker.start(&task).await;
        let result = runner.run(&task, self).await;
        self.tracker.end(&mut task).await;

        let finished_at = Utc::now();
        task.execution_end_time = Some(finished_at);
        task.last_execution = Some(finished_at);
        task.execution_count += 1;
        self.runtime.set_running_task(None);

        match result {
            Ok(output) if output.is_success() => {
                task.execution_state = Some(ExecutionState::Succeed);

                if let Err(e) = self.middleware.run_post_execution(&mut task, self).await {
                    self.fail(task, e.to_string()).await;
                    return;
                }

                info!("任务 {} 执行成功", task.name);
                self.runtime.record_executed(task.clone());
                self.dispatch(SchedulerEvent::TaskExecuted {
                    task: Box::new(task),
                    output,
                });
            }
            Ok(output) => {
                let reason = output
                    .output
                    .unwrap_or_else(|| format!("任务 {} 执行失败", task.name));
                self.fail_after_execution(task, reason).await;
            }
            Err(e) => self.fail_after_execution(task, e.to_string()).await,
        }
    }

    /// 执行失败的任务仍需回写执行记录，执行后中间件的错误只记录日志
    async fn fail_after_execution(&self, mut task: Task, reason: String) {
        task.execution_state = Some(ExecutionState::Errored);

        if let Err(e) = self.middleware.run_post_execution(&mut task, self).await {
            warn!("失败任务 {} 的执行后中间件出错: {}", task.name, e);
        }

        self.fail(task, reason).await;
    }

    async fn fail(&self, task: Task, reason: String) {
        error!("任务 {} 执行失败: {}", task.name, reason);

        let failed = FailedTask::new(task, reason);
        self.failed_tasks.write().await.push(failed.clone());
        self.dispatch(SchedulerEvent::TaskFailed {
            failed_task: Box::new(failed),
        });
    }

    /// 合并池中 Worker 的失败任务，事件已由池中 Worker 发出
    pub async fn absorb_failed_tasks(&self, failed: Vec<FailedTask>) {
        if failed.is_empty() {
            return;
        }
        self.failed_tasks.write().await.extend(failed);
    }

    /// 派生一个共享调度器、执行器、中间件、锁服务和事件分发器的新 Worker
    pub fn fork(&self) -> Arc<Worker> {
        let forked = Arc::new(Worker {
            id: generate_worker_id(),
            scheduler: self.scheduler.clone(),
            runners: self.runners.clone(),
            middleware: self.middleware.clone(),
            events: self.events.clone(),
            locks: self.locks.clone(),
            policies: self.policies.clone(),
            tracker: self.tracker.clone(),
            configuration: RwLock::new(WorkerConfiguration::for_fork(&self.id)),
            runtime: WorkerRuntime::new(),
            failed_tasks: tokio::sync::RwLock::new(Vec::new()),
        });

        self.dispatch(SchedulerEvent::WorkerForked {
            forked_from: self.id.clone(),
            forked: forked.id.clone(),
        });
        debug!("Worker {} 派生出 {}", self.id, forked.id);

        forked
    }

    /// 暂停后新的一轮任务会被跳过，直到 Worker 重新执行
    pub fn pause(&self) {
        self.runtime.set_state(WorkerState::Paused);
        self.dispatch(SchedulerEvent::WorkerPaused {
            worker_id: self.id.clone(),
        });
        info!("Worker {} 已暂停", self.id);
    }

    /// 请求停止，当前任务执行完后生效
    pub fn stop(&self) {
        self.runtime.request_stop();
        info!("Worker {} 收到停止请求", self.id);
    }

    pub async fn restart(&self) {
        self.stop();
        self.runtime.set_state(WorkerState::Idle);
        self.failed_tasks.write().await.clear();

        self.dispatch(SchedulerEvent::WorkerRestarted {
            worker_id: self.id.clone(),
        });
        info!("Worker {} 已重启", self.id);
    }

    /// 抢占执行
    ///
    /// 从 `to_preempt` 中挑出 `preempt` 里同名的任务，释放它们的执行锁后在派生 Worker 中立即执行。
    pub async fn preempt(&self, preempt: &TaskList, to_preempt: &TaskList) -> SchedulerResult<()> {
        let tasks = to_preempt.filter(|task| preempt.has(&task.name));
        if tasks.is_empty() {
            return Ok(());
        }

        for name in tasks.names() {
            self.locks.release(&task_lock_key(&name));
        }

        let fork = self.fork();
        info!("Worker {} 抢占执行 {} 个任务", fork.id, tasks.count());
        let result = fork.execute(fork.configuration(), Some(tasks)).await;
        fork.stop();

        self.absorb_failed_tasks(fork.failed_tasks().await).await;
        result
    }
}

#[async_trait]
impl PoolWorker for Worker {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn fork(&self) -> Arc<dyn PoolWorker> {
        Worker::fork(self)
    }

    async fn run_tasks(&self, tasks: TaskList) -> SchedulerResult<Vec<FailedTask>> {
        self.execute(self.configuration(), Some(tasks)).await?;
        Ok(std::mem::take(&mut *self.failed_tasks.write().await))
    }

    fn stop(&self) -> SchedulerResult<()> {
        Worker::stop(self);
        Ok(())
    }
}

fn generate_worker_id() -> String {
    let hostname = hostname::get()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{}-{}", hostname, uuid::Uuid::new_v4())
}

/// 距离下一分钟开始的时长加上额外延迟
pub(crate) fn sleep_duration(now: DateTime<Utc>, delay_seconds: u64) -> Duration {
    let elapsed_millis =
        u64::from(now.second()) * 1000 + u64::from(now.timestamp_subsec_millis().min(999));
    Duration::from_millis(60_000 - elapsed_millis) + Duration::from_secs(delay_seconds)
}
