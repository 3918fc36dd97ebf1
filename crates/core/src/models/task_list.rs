use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::task::Task;

/// 以任务名为键的有序任务集合
///
/// 插入同名任务会替换原有任务并保留其位置。集合按值传递，
/// 排序策略拿到的是调用方的一份拷贝，不会在并发排序之间共享。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskList {
    tasks: IndexMap<String, Task>,
}

impl TaskList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task) {
        self.tasks.insert(task.name.clone(), task);
    }

    pub fn has(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.get_mut(name)
    }

    /// 移除任务并保持其余任务的相对顺序
    pub fn remove(&mut self, name: &str) -> Option<Task> {
        self.tasks.shift_remove(name)
    }

    pub fn filter(&self, predicate: impl Fn(&Task) -> bool) -> TaskList {
        self.iter().filter(|task| predicate(task)).cloned().collect()
    }

    pub fn map<T>(&self, func: impl Fn(&Task) -> T) -> Vec<T> {
        self.iter().map(func).collect()
    }

    pub fn walk(&mut self, func: impl FnMut(&mut Task)) {
        self.tasks.values_mut().for_each(func);
    }

    pub fn names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn into_vec(self) -> Vec<Task> {
        self.tasks.into_values().collect()
    }
}

impl FromIterator<Task> for TaskList {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut list = TaskList::new();
        for task in iter {
            list.add(task);
        }
        list
    }
}

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        tasks.into_iter().collect()
    }
}

impl IntoIterator for TaskList {
    type Item = Task;
    type IntoIter = indexmap::map::IntoValues<String, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskKind;

    fn create_test_list() -> TaskList {
        ["foo", "bar", "baz"]
            .into_iter()
            .map(|name| Task::new(name, TaskKind::Null))
            .collect()
    }

    #[test]
    fn test_keeps_insertion_order() {
        let list = create_test_list();
        assert_eq!(list.names(), vec!["foo", "bar", "baz"]);
        assert_eq!(list.count(), 3);
    }

    #[test]
    fn test_add_replaces_same_name() {
        let mut list = create_test_list();
        list.add(Task::new("foo", TaskKind::Null).with_priority(5).unwrap());

        assert_eq!(list.count(), 3);
        assert_eq!(list.names()[0], "foo");
        assert_eq!(list.get("foo").unwrap().priority, 5);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut list = create_test_list();
        assert!(list.remove("foo").is_some());
        assert!(list.remove("missing").is_none());
        assert_eq!(list.names(), vec!["bar", "baz"]);
    }

    #[test]
    fn test_filter_and_walk() {
        let mut list = create_test_list();
        list.walk(|task| task.priority = if task.name == "bar" { 1 } else { 0 });

        let filtered = list.filter(|task| task.priority > 0);
        assert_eq!(filtered.names(), vec!["bar"]);
        assert_eq!(list.map(|task| task.priority), vec![0, 1, 0]);
    }
}
