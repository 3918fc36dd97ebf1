use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

const LOCK_PREFIX: &str = "_scheduler_task_lock_";

/// 任务执行锁的键
pub fn task_lock_key(task_name: &str) -> String {
    format!("{LOCK_PREFIX}{task_name}")
}

/// 执行锁服务
///
/// 保证同一个任务名在同一时刻最多只有一个 Worker 在执行。
pub trait LockStore: Send + Sync {
    /// 尝试获取锁，已被占用时返回 false
    fn try_acquire(&self, key: &str) -> bool;

    fn release(&self, key: &str);

    fn is_locked(&self, key: &str) -> bool;
}

/// 作用域锁，离开作用域时释放
pub struct LockGuard<'a> {
    store: &'a dyn LockStore,
    key: String,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(store: &'a dyn LockStore, key: String) -> Option<Self> {
        store.try_acquire(&key).then(|| Self { store, key })
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.store.release(&self.key);
        debug!("释放执行锁: {}", self.key);
    }
}

/// 进程内的锁服务，克隆出的 Worker 共享同一份实例
#[derive(Debug, Default)]
pub struct InMemoryLockStore {
    keys: Mutex<HashSet<String>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for InMemoryLockStore {
    fn try_acquire(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string())
    }

    fn release(&self, key: &str) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn is_locked(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}
