#[cfg(test)]
mod scheduler_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use mockall::mock;

    use scheduler_core::{
        models::{Task, TaskKind, TaskList, TaskState},
        EventDispatcher, EventRecorder, Middleware, SchedulerError, SchedulerEvent,
        SchedulerResult, SchedulerService, Transport,
    };
    use scheduler_dispatcher::{
        Scheduler, SchedulerMiddleware, SchedulerMiddlewareStack, SchedulePolicyOrchestrator,
    };
    use scheduler_infrastructure::InMemoryTransport;

    mock! {
        pub FailingTransport {}

        #[async_trait]
        impl Transport for FailingTransport {
            async fn list(&self) -> SchedulerResult<TaskList>;
            async fn get(&self, name: &str) -> SchedulerResult<Task>;
            async fn create(&self, task: Task) -> SchedulerResult<()>;
            async fn update(&self, name: &str, task: Task) -> SchedulerResult<()>;
            async fn delete(&self, name: &str) -> SchedulerResult<()>;
            async fn pause(&self, name: &str) -> SchedulerResult<()>;
            async fn resume(&self, name: &str) -> SchedulerResult<()>;
            async fn clear(&self) -> SchedulerResult<()>;
        }
    }

    fn create_test_task(name: &str, expression: &str) -> Task {
        Task::new(name, TaskKind::Null)
            .with_expression(expression)
            .unwrap()
    }

    fn create_scheduler(
        transport: Arc<dyn Transport>,
        middleware: SchedulerMiddlewareStack,
    ) -> (Scheduler, Arc<EventRecorder>) {
        let recorder = Arc::new(EventRecorder::new());
        let events = EventDispatcher::new().with_listener(recorder.clone());
        let scheduler = Scheduler::new(
            transport,
            Arc::new(middleware),
            Arc::new(events),
            Arc::new(SchedulePolicyOrchestrator::with_default_policies()),
            chrono_tz::UTC,
            "priority",
        );
        (scheduler, recorder)
    }

    struct DescribeMiddleware;

    impl Middleware for DescribeMiddleware {
        fn name(&self) -> &str {
            "describe"
        }
    }

    #[async_trait]
    impl SchedulerMiddleware for DescribeMiddleware {
        async fn pre_scheduling(
            &self,
            task: &mut Task,
            _scheduler: &dyn SchedulerService,
        ) -> SchedulerResult<()> {
            task.description = Some("described".to_string());
            Ok(())
        }
    }

    struct RejectMiddleware;

    impl Middleware for RejectMiddleware {
        fn name(&self) -> &str {
            "reject"
        }

        fn priority(&self) -> Option<i32> {
            Some(1)
        }
    }

    #[async_trait]
    impl SchedulerMiddleware for RejectMiddleware {
        async fn pre_scheduling(
            &self,
            task: &mut Task,
            _scheduler: &dyn SchedulerService,
        ) -> SchedulerResult<()> {
            Err(SchedulerError::Middleware(format!("拒绝任务 {}", task.name)))
        }
    }

    struct CountingMiddleware {
        required: bool,
        calls: AtomicUsize,
    }

    impl Middleware for CountingMiddleware {
        fn name(&self) -> &str {
            "counting"
        }

        fn priority(&self) -> Option<i32> {
            Some(10)
        }

        fn is_required(&self) -> bool {
            self.required
        }
    }

    #[async_trait]
    impl SchedulerMiddleware for CountingMiddleware {
        async fn pre_scheduling(
            &self,
            _task: &mut Task,
            _scheduler: &dyn SchedulerService,
        ) -> SchedulerResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_schedule_stores_task_and_emits_event() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, recorder) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());

        scheduler
            .schedule(create_test_task("foo", "*/5 * * * *"))
            .await
            .unwrap();

        let stored = transport.get("foo").await.unwrap();
        assert!(stored.scheduled_at.is_some());
        assert_eq!(stored.timezone, Some(chrono_tz::UTC));
        assert_eq!(recorder.names(), vec!["task_scheduled"]);

        let error = scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap_err();
        assert!(matches!(error, SchedulerError::AlreadyScheduled { .. }));
        assert_eq!(recorder.names(), vec!["task_scheduled"]);
    }

    #[tokio::test]
    async fn test_invalid_expression_is_rejected() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, recorder) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());

        for expression in ["not a cron", "* * * *", "0 0 32 * *"] {
            let task = create_test_task("bad", expression);
            let error = scheduler.schedule(task).await.unwrap_err();
            assert!(
                matches!(error, SchedulerError::InvalidExpression { .. }),
                "{expression} 返回了 {error:?}"
            );
        }
        assert!(transport.list().await.unwrap().is_empty());
        assert!(recorder.names().is_empty());

        scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap();
        let mut task = transport.get("foo").await.unwrap();
        task.expression = scheduler_core::models::Expression::create("every day").unwrap();
        assert!(matches!(
            scheduler.update("foo", task).await,
            Err(SchedulerError::InvalidExpression { .. })
        ));
        assert_eq!(
            transport.get("foo").await.unwrap().expression.expression(),
            "* * * * *"
        );
    }

    #[tokio::test]
    async fn test_queued_task_is_stored() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, _) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());

        let mut task = create_test_task("queued", "* * * * *");
        task.queued = true;
        scheduler.schedule(task).await.unwrap();

        assert!(transport.get("queued").await.unwrap().queued);
    }

    #[tokio::test]
    async fn test_pre_scheduling_middleware_can_modify_task() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, _) = create_scheduler(
            transport.clone(),
            SchedulerMiddlewareStack::new(vec![Arc::new(DescribeMiddleware)]),
        );

        scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap();

        let stored = transport.get("foo").await.unwrap();
        assert_eq!(stored.description.as_deref(), Some("described"));
    }

    #[tokio::test]
    async fn test_failing_middleware_aborts_scheduling_but_runs_required() {
        let required = Arc::new(CountingMiddleware {
            required: true,
            calls: AtomicUsize::new(0),
        });
        let optional = Arc::new(CountingMiddleware {
            required: false,
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, recorder) = create_scheduler(
            transport.clone(),
            SchedulerMiddlewareStack::new(vec![
                optional.clone(),
                required.clone(),
                Arc::new(RejectMiddleware),
            ]),
        );

        let error = scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap_err();

        assert!(matches!(error, SchedulerError::Middleware(_)));
        assert_eq!(required.calls.load(Ordering::SeqCst), 1);
        assert_eq!(optional.calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.count().await, 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_due_tasks_filtering() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 30).unwrap();

        let every_minute = create_test_task("every_minute", "* * * * *");
        let at_five = create_test_task("at_five", "5 * * * *");
        let paused = create_test_task("paused", "* * * * *").with_state(TaskState::Paused);
        let disabled = create_test_task("disabled", "* * * * *").with_state(TaskState::Disabled);

        let mut windowed = create_test_task("windowed", "* * * * *");
        windowed.execution_end_date = Some(now - Duration::days(1));

        let mut just_ran = create_test_task("just_ran", "* * * * *");
        just_ran.last_execution = Some(now - Duration::seconds(20));

        let mut ran_before = create_test_task("ran_before", "* * * * *");
        ran_before.last_execution = Some(now - Duration::minutes(1));

        let boot = create_test_task("boot", "@reboot");
        let mut booted = create_test_task("booted", "@reboot");
        booted.last_execution = Some(now - Duration::hours(1));

        let transport = Arc::new(InMemoryTransport::with_tasks(vec![
            every_minute,
            at_five,
            paused,
            disabled,
            windowed,
            just_ran,
            ran_before,
            boot,
            booted,
        ]));
        let (scheduler, _) = create_scheduler(transport, SchedulerMiddlewareStack::default());

        let due = scheduler.get_due_tasks_at(now).await.unwrap();
        assert_eq!(due.names(), vec!["every_minute", "ran_before", "boot"]);
    }

    #[tokio::test]
    async fn test_due_tasks_honour_task_timezone() {
        // 一月份巴黎为 UTC+1
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
        let paris = create_test_task("paris", "0 9 * * *").with_timezone(chrono_tz::Europe::Paris);
        let utc = create_test_task("utc", "0 9 * * *");

        let transport = Arc::new(InMemoryTransport::with_tasks(vec![paris, utc]));
        let (scheduler, _) = create_scheduler(transport, SchedulerMiddlewareStack::default());

        let due = scheduler.get_due_tasks_at(now).await.unwrap();
        assert_eq!(due.names(), vec!["paris"]);
    }

    #[tokio::test]
    async fn test_due_tasks_are_sorted_by_policy() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap();
        let tasks = vec![
            create_test_task("five", "* * * * *").with_priority(5).unwrap(),
            create_test_task("one", "* * * * *").with_priority(1).unwrap(),
            create_test_task("three", "* * * * *").with_priority(3).unwrap(),
        ];
        let transport = Arc::new(InMemoryTransport::with_tasks(tasks));
        let (scheduler, _) = create_scheduler(transport, SchedulerMiddlewareStack::default());

        let due = scheduler.get_due_tasks_at(now).await.unwrap();
        assert_eq!(due.names(), vec!["one", "three", "five"]);
    }

    #[tokio::test]
    async fn test_unknown_policy_surfaces_error() {
        let transport = Arc::new(InMemoryTransport::with_tasks(vec![create_test_task(
            "foo", "* * * * *",
        )]));
        let scheduler = Scheduler::new(
            transport,
            Arc::new(SchedulerMiddlewareStack::default()),
            Arc::new(EventDispatcher::new()),
            Arc::new(SchedulePolicyOrchestrator::with_default_policies()),
            chrono_tz::UTC,
            "lottery",
        );

        let error = scheduler.get_due_tasks().await.unwrap_err();
        assert!(matches!(error, SchedulerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_pause_resume_and_unschedule() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, recorder) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());
        scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap();

        scheduler.pause("foo").await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().state, TaskState::Paused);

        scheduler.resume("foo").await.unwrap();
        assert_eq!(transport.get("foo").await.unwrap().state, TaskState::Enabled);

        scheduler.unschedule("foo").await.unwrap();
        assert!(scheduler.get_tasks().await.unwrap().is_empty());
        assert_eq!(recorder.names(), vec!["task_scheduled", "task_unscheduled"]);

        let error = scheduler.unschedule("foo").await.unwrap_err();
        assert!(matches!(error, SchedulerError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_replaces_task() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, _) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());
        scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap();

        let mut task = transport.get("foo").await.unwrap();
        task.execution_count = 3;
        scheduler.update("foo", task).await.unwrap();

        assert_eq!(transport.get("foo").await.unwrap().execution_count, 3);
    }

    #[tokio::test]
    async fn test_yield_reschedules_task() {
        let transport = Arc::new(InMemoryTransport::new());
        let (scheduler, recorder) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());
        scheduler
            .schedule(create_test_task("first", "* * * * *"))
            .await
            .unwrap();
        scheduler
            .schedule(create_test_task("second", "* * * * *"))
            .await
            .unwrap();

        scheduler.yield_task("first").await.unwrap();

        assert_eq!(
            scheduler.get_tasks().await.unwrap().names(),
            vec!["second", "first"]
        );
        assert_eq!(
            recorder.names(),
            vec![
                "task_scheduled",
                "task_scheduled",
                "task_unscheduled",
                "task_scheduled"
            ]
        );
    }

    #[tokio::test]
    async fn test_reboot_keeps_only_reboot_tasks() {
        let mut boot = create_test_task("boot", "@reboot");
        boot.last_execution = Some(Utc::now());
        let transport = Arc::new(InMemoryTransport::with_tasks(vec![
            create_test_task("foo", "* * * * *"),
            boot,
        ]));
        let (scheduler, recorder) =
            create_scheduler(transport.clone(), SchedulerMiddlewareStack::default());

        scheduler.reboot().await.unwrap();

        let tasks = scheduler.get_tasks().await.unwrap();
        assert_eq!(tasks.names(), vec!["boot"]);
        assert!(tasks.get("boot").unwrap().last_execution.is_none());

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            SchedulerEvent::SchedulerRebooted { tasks } => assert_eq!(tasks.names(), vec!["boot"]),
            other => panic!("意外的事件: {other:?}"),
        }

        let due = scheduler.get_due_tasks().await.unwrap();
        assert_eq!(due.names(), vec!["boot"]);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let mut transport = MockFailingTransport::new();
        transport
            .expect_list()
            .times(1)
            .returning(|| Err(SchedulerError::Transport("连接已断开".to_string())));
        let (scheduler, _) =
            create_scheduler(Arc::new(transport), SchedulerMiddlewareStack::default());

        let error = scheduler.get_due_tasks().await.unwrap_err();
        assert!(matches!(error, SchedulerError::Transport(_)));
    }

    #[tokio::test]
    async fn test_create_failure_emits_no_event() {
        let mut transport = MockFailingTransport::new();
        transport
            .expect_create()
            .times(1)
            .returning(|_| Err(SchedulerError::Transport("写入失败".to_string())));
        let (scheduler, recorder) =
            create_scheduler(Arc::new(transport), SchedulerMiddlewareStack::default());

        let error = scheduler
            .schedule(create_test_task("foo", "* * * * *"))
            .await
            .unwrap_err();

        assert!(matches!(error, SchedulerError::Transport(_)));
        assert!(recorder.events().is_empty());
    }
}
