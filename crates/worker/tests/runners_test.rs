#[cfg(test)]
mod runners_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use scheduler_core::{
        models::{OutputType, Task, TaskCallback, TaskKind},
        EventDispatcher, SchedulerError, SchedulerResult,
    };
    use scheduler_dispatcher::{Scheduler, SchedulePolicyOrchestrator, SchedulerMiddlewareStack};
    use scheduler_infrastructure::InMemoryTransport;
    use scheduler_worker::{
        CallbackTaskRunner, CommandTaskRunner, ConsoleCommand, NullTaskRunner, RunnerRegistry,
        ShellTaskRunner, TaskRunner, Worker,
    };

    fn create_worker() -> Worker {
        let scheduler = Arc::new(Scheduler::new(
            Arc::new(InMemoryTransport::new()),
            Arc::new(SchedulerMiddlewareStack::default()),
            Arc::new(EventDispatcher::new()),
            Arc::new(SchedulePolicyOrchestrator::with_default_policies()),
            chrono_tz::UTC,
            "priority",
        ));
        Worker::builder(scheduler).build()
    }

    fn shell_task(name: &str, command: &[&str]) -> Task {
        Task::new(
            name,
            TaskKind::Shell {
                command: command.iter().map(|part| part.to_string()).collect(),
                cwd: None,
                environment: HashMap::new(),
                timeout: None,
            },
        )
    }

    struct GreetCommand;

    #[async_trait]
    impl ConsoleCommand for GreetCommand {
        fn name(&self) -> &str {
            "app:greet"
        }

        async fn execute(
            &self,
            arguments: &[String],
            _options: &HashMap<String, Value>,
        ) -> SchedulerResult<String> {
            match arguments.first() {
                Some(name) => Ok(format!("hello {name}")),
                None => Err(SchedulerError::InvalidArgument("缺少参数".to_string())),
            }
        }
    }

    fn command_task(arguments: Vec<String>) -> Task {
        let mut task = Task::new(
            "greet",
            TaskKind::Command {
                command: "app:greet".to_string(),
                arguments,
                options: HashMap::new(),
            },
        );
        task.output = true;
        task
    }

    #[test]
    fn test_registry_uses_first_supporting_runner() {
        let registry = RunnerRegistry::with_default_runners(CommandTaskRunner::new());
        assert_eq!(registry.len(), 7);

        let null = registry.find(&Task::new("foo", TaskKind::Null)).unwrap();
        assert_eq!(null.name(), "null");

        let shell = registry.find(&shell_task("bar", &["true"])).unwrap();
        assert_eq!(shell.name(), "shell");

        assert!(RunnerRegistry::default()
            .find(&Task::new("foo", TaskKind::Null))
            .is_none());
    }

    #[tokio::test]
    async fn test_null_runner_succeeds() {
        let worker = create_worker();
        let output = NullTaskRunner
            .run(&Task::new("foo", TaskKind::Null), &worker)
            .await
            .unwrap();

        assert!(output.is_success());
        assert!(output.output.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_returns_stdout_only_when_requested() {
        let worker = create_worker();
        let mut task = shell_task("echo", &["echo", "hello"]);

        let output = ShellTaskRunner.run(&task, &worker).await.unwrap();
        assert!(output.is_success());
        assert!(output.output.is_none());

        task.output = true;
        let output = ShellTaskRunner.run(&task, &worker).await.unwrap();
        assert_eq!(output.output.as_deref(), Some("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_reports_non_zero_exit() {
        let worker = create_worker();
        let output = ShellTaskRunner
            .run(&shell_task("fails", &["false"]), &worker)
            .await
            .unwrap();

        assert_eq!(output.output_type, OutputType::Error);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_runner_times_out() {
        let worker = create_worker();
        let mut task = shell_task("slow", &["sleep", "5"]);
        if let TaskKind::Shell { timeout, .. } = &mut task.kind {
            *timeout = Some(0.1);
        }

        let output = ShellTaskRunner.run(&task, &worker).await.unwrap();

        assert!(!output.is_success());
        assert!(output.output.unwrap().contains("超时"));
    }

    #[tokio::test]
    async fn test_shell_runner_rejects_missing_program() {
        let worker = create_worker();
        let output = ShellTaskRunner
            .run(&shell_task("missing", &["definitely-not-a-binary-4242"]), &worker)
            .await
            .unwrap();

        assert!(!output.is_success());
    }

    #[tokio::test]
    async fn test_command_runner_executes_registered_command() {
        let worker = create_worker();
        let runner = CommandTaskRunner::new().with_command(Arc::new(GreetCommand));

        let output = runner
            .run(&command_task(vec!["world".to_string()]), &worker)
            .await
            .unwrap();
        assert_eq!(output.output.as_deref(), Some("hello world"));

        let output = runner.run(&command_task(Vec::new()), &worker).await.unwrap();
        assert!(!output.is_success());
    }

    #[tokio::test]
    async fn test_command_runner_rejects_unknown_command() {
        let worker = create_worker();
        let output = CommandTaskRunner::new()
            .run(&command_task(Vec::new()), &worker)
            .await
            .unwrap();

        assert!(!output.is_success());
        assert!(output.output.unwrap().contains("app:greet"));
    }

    #[tokio::test]
    async fn test_callback_runner() {
        let worker = create_worker();
        let task = Task::new(
            "sum",
            TaskKind::Callback {
                callback: Some(TaskCallback::new(|arguments| {
                    let sum: i64 = arguments.iter().filter_map(Value::as_i64).sum();
                    Ok(Some(sum.to_string()))
                })),
                arguments: vec![Value::from(1), Value::from(2)],
            },
        );

        let output = CallbackTaskRunner.run(&task, &worker).await.unwrap();
        assert_eq!(output.output.as_deref(), Some("3"));

        let missing = Task::new(
            "missing",
            TaskKind::Callback {
                callback: None,
                arguments: Vec::new(),
            },
        );
        let output = CallbackTaskRunner.run(&missing, &worker).await.unwrap();
        assert!(!output.is_success());
    }
}
