use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// 调用方传入了非法参数，例如未知的策略名或越界的表达式位置
    #[error("无效的参数: {0}")]
    InvalidArgument(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidExpression { expr: String, message: String },

    /// 内部不变量被破坏，例如没有注册任何策略
    #[error("运行时错误: {0}")]
    Runtime(String),

    /// 缺少运行所需的依赖或状态不合法
    #[error("逻辑错误: {0}")]
    Logic(String),

    #[error("传输层错误: {0}")]
    Transport(String),

    #[error("任务已被调度: {name}")]
    AlreadyScheduled { name: String },

    #[error("任务未找到: {name}")]
    TaskNotFound { name: String },

    #[error("未找到可用的执行器: {0}")]
    UndefinedRunner(String),

    #[error("中间件错误: {0}")]
    Middleware(String),

    #[error("任务执行错误: {0}")]
    TaskExecution(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),
}

impl SchedulerError {
    pub fn invalid_expression(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExpression {
            expr: expr.into(),
            message: message.into(),
        }
    }

    pub fn task_not_found(name: impl Into<String>) -> Self {
        Self::TaskNotFound { name: name.into() }
    }

    pub fn already_scheduled(name: impl Into<String>) -> Self {
        Self::AlreadyScheduled { name: name.into() }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;
