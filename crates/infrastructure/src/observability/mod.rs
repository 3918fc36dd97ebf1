//! 可观测性
//!
//! 通过事件监听器接入调度核心：结构化日志和探针计数器。

pub mod event_logger;
pub mod probe;

pub use event_logger::TracingEventListener;
pub use probe::{ProbeListener, ProbeSnapshot};
