//! # 数据模型
//!
//! 调度引擎使用的核心数据结构。
//!
//! ## 核心模型
//!
//! ### Task - 任务定义
//! 可调度的任务单元，包含调度表达式、排序输入和执行记录。
//!
//! ### TaskList - 任务集合
//! 以任务名为键的有序集合，排序策略的输入和输出。
//!
//! ### Expression - CRON表达式
//! 5段式CRON字符串或宏，提供按字段修改的辅助方法。
//!
//! ### Output / FailedTask - 执行结果
//! 执行器返回的结果，以及执行失败时生成的失败记录。

pub mod expression;
pub mod failed_task;
pub mod output;
pub mod task;
pub mod task_list;

pub use expression::{Expression, DEFAULT_EXPRESSION, REBOOT_MACRO};
pub use failed_task::FailedTask;
pub use output::{Output, OutputType};
pub use task::{
    ExecutionState, Task, TaskCallback, TaskCallbacks, TaskHook, TaskKind, TaskState,
    MAX_NICE, MAX_PRIORITY, MIN_NICE, MIN_PRIORITY,
};
pub use task_list::TaskList;
