use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use tokio::signal;
use tracing::{error, info, warn};

use scheduler_core::{init_logging, AppConfig, EventDispatcher, SchedulerService};
use scheduler_dispatcher::{
    Scheduler, SchedulePolicyOrchestrator, SchedulerMiddleware, SchedulerMiddlewareStack,
    TaskBuilder,
};
use scheduler_infrastructure::{InMemoryTransport, ProbeListener, TracingEventListener};
use scheduler_worker::{
    CommandTaskRunner, ExecutionPolicyRegistry, RunnerRegistry, SupervisorPolicy,
    TaskCallbackMiddleware, Worker, WorkerConfiguration, WorkerMiddlewareStack, WorkerPool,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("scheduler")
        .version("1.0.0")
        .about("定时任务调度引擎")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，未指定时依次查找 config/scheduler.toml 和 scheduler.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("sleep-until-next-minute")
                .long("sleep-until-next-minute")
                .help("每轮执行后休眠到下一分钟继续，而不是执行一轮后退出")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .context("加载配置失败")?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }
    if matches.get_flag("sleep-until-next-minute") {
        config.worker.sleep_until_next_minute = true;
    }

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("启动定时任务调度引擎");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let timezone = config.timezone()?;
    let probe = Arc::new(ProbeListener::new());
    let events = Arc::new(
        EventDispatcher::new()
            .with_listener(Arc::new(TracingEventListener::new()))
            .with_listener(probe.clone()),
    );

    let scheduler_middleware: Vec<Arc<dyn SchedulerMiddleware>> =
        vec![Arc::new(TaskCallbackMiddleware)];
    let scheduler = Arc::new(Scheduler::new(
        Arc::new(InMemoryTransport::new()),
        Arc::new(SchedulerMiddlewareStack::new(scheduler_middleware)),
        events.clone(),
        Arc::new(SchedulePolicyOrchestrator::with_default_policies()),
        timezone,
        config.scheduler.policy.clone(),
    ));

    let builder = TaskBuilder::with_default_builders(timezone);
    for options in &config.tasks {
        let task = builder
            .build(options)
            .context("构建配置中的任务失败")?;
        let name = task.name.clone();
        scheduler
            .schedule(task)
            .await
            .with_context(|| format!("调度任务 {name} 失败"))?;
    }
    info!("已调度 {} 个任务", config.tasks.len());

    let mut policies = ExecutionPolicyRegistry::with_default_policies();
    policies.add(Arc::new(SupervisorPolicy::new(
        Arc::new(WorkerPool::new()),
        config.worker.pool_size,
    )));

    let worker = Arc::new(
        Worker::builder(scheduler.clone())
            .runners(RunnerRegistry::with_default_runners(CommandTaskRunner::new()))
            .middleware(WorkerMiddlewareStack::with_default_middleware())
            .events(events)
            .policies(policies)
            .build(),
    );
    let configuration = WorkerConfiguration::from_settings(&config.worker);

    let mut worker_handle = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.execute(configuration, None).await })
    };

    let finished = tokio::select! {
        result = &mut worker_handle => Some(result),
        _ = wait_for_shutdown_signal() => None,
    };

    let result = match finished {
        Some(result) => result,
        None => {
            info!("收到关闭信号，当前任务执行完后停止Worker...");
            worker.stop();

            match tokio::time::timeout(Duration::from_secs(30), worker_handle).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Worker关闭超时，强制退出");
                    return Ok(());
                }
            }
        }
    };

    match result {
        Ok(Ok(())) => info!("Worker已停止"),
        Ok(Err(e)) => {
            error!("Worker运行失败: {e}");
            return Err(e.into());
        }
        Err(e) => error!("Worker任务异常退出: {e}"),
    }

    let snapshot = probe.snapshot();
    info!(
        scheduled = snapshot.scheduled_tasks,
        executed = snapshot.executed_tasks,
        failed = snapshot.failed_tasks,
        "定时任务调度引擎已退出"
    );
    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
