#[cfg(test)]
mod pool_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use mockall::mock;

    use scheduler_core::{
        models::{FailedTask, Task, TaskKind, TaskList},
        SchedulerError, SchedulerResult,
    };
    use scheduler_worker::{PoolWorker, WorkerPool};

    mock! {
        pub PoolMember {}

        #[async_trait]
        impl PoolWorker for PoolMember {
            fn id(&self) -> String;
            fn fork(&self) -> Arc<dyn PoolWorker>;
            async fn run_tasks(&self, tasks: TaskList) -> SchedulerResult<Vec<FailedTask>>;
            fn stop(&self) -> SchedulerResult<()>;
        }
    }

    fn create_test_tasks(names: &[&str]) -> TaskList {
        names
            .iter()
            .map(|name| Task::new(*name, TaskKind::Null))
            .collect()
    }

    fn create_member(id: &str) -> MockPoolMember {
        let mut member = MockPoolMember::new();
        member.expect_id().return_const(id.to_string());
        member
    }

    fn member_with_stop(id: &str, calls: Arc<AtomicUsize>, fails: bool) -> MockPoolMember {
        let mut member = create_member(id);
        member.expect_stop().times(1).returning(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            if fails {
                Err(SchedulerError::Runtime("stop failed".to_string()))
            } else {
                Ok(())
            }
        });
        member
    }

    async fn boot_pool(members: Vec<MockPoolMember>) -> WorkerPool {
        let size = members.len();
        let queue: Arc<Mutex<Vec<Arc<dyn PoolWorker>>>> = Arc::new(Mutex::new(
            members
                .into_iter()
                .map(|member| Arc::new(member) as Arc<dyn PoolWorker>)
                .collect(),
        ));

        let mut source = create_member("source");
        source
            .expect_fork()
            .times(size)
            .returning(move || queue.lock().unwrap().remove(0));

        let pool = WorkerPool::new();
        pool.boot(&source, size).await;
        pool
    }

    #[tokio::test]
    async fn test_stop_reaches_every_worker_when_one_fails() {
        let calls = [
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
        ];
        let pool = boot_pool(vec![
            member_with_stop("worker-1", calls[0].clone(), false),
            member_with_stop("worker-2", calls[1].clone(), true),
            member_with_stop("worker-3", calls[2].clone(), false),
        ])
        .await;
        assert_eq!(pool.count().await, 3);

        let result = pool.stop().await;

        match result {
            Err(SchedulerError::Runtime(message)) => assert!(message.contains("worker-2")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(calls[1].load(Ordering::SeqCst), 1);
        assert_eq!(calls[2].load(Ordering::SeqCst), 1);
        assert_eq!(pool.count().await, 0);
    }

    #[tokio::test]
    async fn test_run_distributes_tasks_round_robin() {
        let batches = Arc::new(Mutex::new(Vec::new()));

        let members = ["worker-1", "worker-2"]
            .into_iter()
            .map(|id| {
                let batches = batches.clone();
                let mut member = create_member(id);
                let owner = id.to_string();
                member.expect_run_tasks().times(1).returning(move |tasks| {
                    batches.lock().unwrap().push((owner.clone(), tasks.names()));
                    Ok(Vec::new())
                });
                member
            })
            .collect();
        let pool = boot_pool(members).await;

        let failed = pool
            .run(&create_test_tasks(&["foo", "bar", "baz"]))
            .await
            .unwrap();

        assert!(failed.is_empty());
        let mut batches = batches.lock().unwrap().clone();
        batches.sort();
        assert_eq!(
            batches,
            vec![
                ("worker-1".to_string(), vec!["foo".to_string(), "baz".to_string()]),
                ("worker-2".to_string(), vec!["bar".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_run_collects_failed_tasks_and_skips_idle_workers() {
        let mut first = create_member("worker-1");
        first.expect_run_tasks().times(1).returning(|tasks| {
            Ok(tasks
                .into_iter()
                .map(|task| FailedTask::new(task, "boom"))
                .collect())
        });
        // 第二个 Worker 没有分到任务，不能被调用
        let second = create_member("worker-2");
        let pool = boot_pool(vec![first, second]).await;

        let failed = pool.run(&create_test_tasks(&["foo"])).await.unwrap();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name(), "foo.failed");
    }

    #[tokio::test]
    async fn test_run_reports_worker_errors_without_failing() {
        let mut first = create_member("worker-1");
        first
            .expect_run_tasks()
            .times(1)
            .returning(|_| Err(SchedulerError::Runtime("crashed".to_string())));
        let pool = boot_pool(vec![first]).await;

        let failed = pool.run(&create_test_tasks(&["foo"])).await.unwrap();

        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pool_cannot_run_or_scale_up() {
        let pool = WorkerPool::new();

        assert!(matches!(
            pool.run(&create_test_tasks(&["foo"])).await,
            Err(SchedulerError::Logic(_))
        ));
        assert!(matches!(
            pool.scale_up(1).await,
            Err(SchedulerError::Logic(_))
        ));
        assert!(pool.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_scale_up_forks_first_worker() {
        let mut first = create_member("worker-1");
        first
            .expect_fork()
            .times(2)
            .returning(|| Arc::new(create_member("forked")) as Arc<dyn PoolWorker>);
        let pool = boot_pool(vec![first]).await;

        pool.scale_up(2).await.unwrap();

        assert_eq!(pool.count().await, 3);
    }

    #[tokio::test]
    async fn test_scale_down_stops_removed_workers() {
        let calls = [Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0))];
        let pool = boot_pool(vec![
            create_member("worker-1"),
            member_with_stop("worker-2", calls[0].clone(), true),
            member_with_stop("worker-3", calls[1].clone(), false),
        ])
        .await;

        pool.scale_down(2).await;

        assert_eq!(pool.count().await, 1);
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(calls[1].load(Ordering::SeqCst), 1);
    }
}
