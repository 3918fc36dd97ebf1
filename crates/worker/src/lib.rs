//! # Scheduler Worker
//!
//! 任务执行端：Worker 状态机、执行器、执行中间件、执行锁、执行策略和 Worker 池。

pub mod configuration;
pub mod execution_policy;
pub mod lock;
pub mod middleware;
pub mod pool;
pub mod runners;
pub mod tracker;
pub mod worker;

pub use configuration::{WorkerConfiguration, WorkerConfigurationBuilder, WorkerState};
pub use execution_policy::{
    DefaultPolicy, ExecutionPolicy, ExecutionPolicyRegistry, FiberPolicy, SupervisorPolicy,
};
pub use lock::{task_lock_key, InMemoryLockStore, LockGuard, LockStore};
pub use middleware::{
    MaxExecutionMiddleware, SingleRunTaskMiddleware, TaskCallbackMiddleware,
    TaskUpdateMiddleware, WorkerMiddleware, WorkerMiddlewareStack,
};
pub use pool::{PoolWorker, WorkerPool};
pub use runners::{
    CallbackTaskRunner, ChainedTaskRunner, CommandTaskRunner, ConsoleCommand, HttpTaskRunner,
    NullTaskRunner, ProbeTaskRunner, RunnerRegistry, ShellTaskRunner, TaskRunner,
};
pub use tracker::TaskExecutionTracker;
pub use worker::{Worker, WorkerBuilder};
