pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use events::{EventDispatcher, EventListener, EventRecorder, SchedulerEvent};
pub use logging::init_logging;
pub use middleware::{order_middleware, Middleware};
pub use models::{
    ExecutionState, Expression, FailedTask, Output, OutputType, Task, TaskKind, TaskList,
    TaskState,
};
pub use traits::{SchedulerService, Transport};

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
