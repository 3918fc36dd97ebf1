//! 应用配置
//!
//! 配置按以下优先级合并：环境变量（前缀 `SCHEDULER`，层级分隔符 `__`）
//! 覆盖配置文件，配置文件覆盖内置默认值。

use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{errors::SchedulerError, SchedulerResult};

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/scheduler.toml", "scheduler.toml"];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scheduler: SchedulerSettings,
    pub worker: WorkerSettings,
    pub observability: ObservabilitySettings,
    /// 启动时调度的任务，每一项是交给任务构建器的原始选项
    #[serde(default)]
    pub tasks: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub timezone: String,
    /// 到期任务使用的排序策略
    pub policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    pub sleep_until_next_minute: bool,
    /// 睡眠到下一分钟之后额外等待的秒数
    pub sleep_duration_delay: u64,
    pub execution_policy: String,
    /// supervisor 执行策略使用的子Worker数量
    pub pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    pub log_level: String,
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerSettings {
                timezone: "UTC".to_string(),
                policy: "priority".to_string(),
            },
            worker: WorkerSettings {
                sleep_until_next_minute: false,
                sleep_duration_delay: 1,
                execution_policy: "default".to_string(),
                pool_size: 1,
            },
            observability: ObservabilitySettings {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
            },
            tasks: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .set_default("scheduler.timezone", "UTC")?
            .set_default("scheduler.policy", "priority")?
            .set_default("worker.sleep_until_next_minute", false)?
            .set_default("worker.sleep_duration_delay", 1)?
            .set_default("worker.execution_policy", "default")?
            .set_default("worker.pool_size", 1)?
            .set_default("observability.log_level", "info")?
            .set_default("observability.log_format", "pretty")?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            debug!("使用默认配置文件: {}", path);
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            warn!("未找到配置文件，使用默认配置");
        }

        builder = builder.add_source(
            Environment::with_prefix("SCHEDULER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn timezone(&self) -> SchedulerResult<Tz> {
        Tz::from_str(&self.scheduler.timezone).map_err(|e| {
            SchedulerError::Configuration(format!(
                "无效的时区 {}: {e}",
                self.scheduler.timezone
            ))
        })
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        self.timezone()?;

        if self.scheduler.policy.trim().is_empty() {
            return Err(SchedulerError::Configuration(
                "调度策略名称不能为空".to_string(),
            ));
        }
        if self.worker.execution_policy.trim().is_empty() {
            return Err(SchedulerError::Configuration(
                "执行策略名称不能为空".to_string(),
            ));
        }
        if self.worker.pool_size == 0 {
            return Err(SchedulerError::Configuration(
                "Worker池大小必须大于0".to_string(),
            ));
        }
        if self.worker.sleep_duration_delay > 60 {
            return Err(SchedulerError::Configuration(format!(
                "睡眠延迟不能超过60秒: {}",
                self.worker.sleep_duration_delay
            )));
        }

        let log_level = self.observability.log_level.to_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(SchedulerError::Configuration(format!(
                "不支持的日志级别: {}",
                self.observability.log_level
            )));
        }
        if !LOG_FORMATS.contains(&self.observability.log_format.as_str()) {
            return Err(SchedulerError::Configuration(format!(
                "不支持的日志格式: {}",
                self.observability.log_format
            )));
        }

        Ok(())
    }
}
