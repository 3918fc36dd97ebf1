use std::sync::Arc;

/// 中间件的公共属性
///
/// 调度侧和执行侧的中间件栈都依赖这组属性决定执行顺序，
/// 以及前面的中间件失败后是否还需要继续执行。
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// 有序中间件的优先级，数值越小越先执行；`None` 的中间件排在所有有序中间件之后
    fn priority(&self) -> Option<i32> {
        None
    }

    /// 必需中间件在前面的中间件失败后仍会执行，其错误会中止当前任务
    fn is_required(&self) -> bool {
        false
    }
}

/// 按优先级排列中间件，优先级相同或无优先级的保持注册顺序
pub fn order_middleware<M>(stack: &[Arc<M>]) -> Vec<Arc<M>>
where
    M: Middleware + ?Sized,
{
    let (mut ordered, unordered): (Vec<Arc<M>>, Vec<Arc<M>>) = stack
        .iter()
        .cloned()
        .partition(|middleware| middleware.priority().is_some());

    ordered.sort_by_key(|middleware| middleware.priority());
    ordered.extend(unordered);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestMiddleware {
        name: &'static str,
        priority: Option<i32>,
    }

    impl Middleware for TestMiddleware {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> Option<i32> {
            self.priority
        }
    }

    fn middleware(name: &'static str, priority: Option<i32>) -> Arc<TestMiddleware> {
        Arc::new(TestMiddleware { name, priority })
    }

    #[test]
    fn test_ordered_middleware_come_first() {
        let stack = vec![
            middleware("plain", None),
            middleware("late", Some(15)),
            middleware("early", Some(1)),
            middleware("other", None),
            middleware("middle", Some(5)),
        ];

        let names: Vec<&str> = order_middleware(&stack)
            .iter()
            .map(|middleware| middleware.name)
            .collect();

        assert_eq!(names, vec!["early", "middle", "late", "plain", "other"]);
    }

    #[test]
    fn test_empty_stack() {
        let stack: Vec<Arc<TestMiddleware>> = Vec::new();
        assert!(order_middleware(&stack).is_empty());
    }
}
