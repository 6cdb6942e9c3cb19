//! TaskCollection: ordered id -> task mapping with logical removal.
//!
//! Design:
//! - Insertion order is preserved (`IndexMap`).
//! - `remove` leaves a tombstone (`None`) in place, so positions never shift.
//! - `visit` lets the callback drop the entry it is looking at without
//!   disturbing the rest of the traversal.

use indexmap::IndexMap;

use super::ids::TaskId;
use super::task::Task;

/// What `TaskCollection::visit` should do with the entry just visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Remove,
}

#[derive(Debug, Clone, Default)]
pub struct TaskCollection {
    slots: IndexMap<TaskId, Option<Task>>,
}

impl TaskCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn set(&mut self, id: TaskId, task: Task) {
        self.slots.insert(id, Some(task));
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Tombstone `id`. Returns whether a live entry was removed.
    pub fn remove(&mut self, id: &TaskId) -> bool {
        if let Some(slot) = self.slots.get_mut(id)
            && slot.is_some()
        {
            *slot = None;
            return true;
        }
        false
    }

    /// Number of live (non-tombstoned) tasks.
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.slots.values().filter_map(Option::as_ref)
    }

    pub fn for_each(&self, mut f: impl FnMut(&Task)) {
        for task in self.iter() {
            f(task);
        }
    }

    /// Traverse live tasks in insertion order with mutable access.
    pub fn visit(&mut self, mut f: impl FnMut(&mut Task) -> Visit) {
        for slot in self.slots.values_mut() {
            if let Some(task) = slot
                && f(task) == Visit::Remove
            {
                *slot = None;
            }
        }
    }

    /// Live tasks, cloned, in insertion order.
    pub fn to_vec(&self) -> Vec<Task> {
        self.iter().cloned().collect()
    }
}

impl FromIterator<Task> for TaskCollection {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        let mut collection = Self::new();
        for task in iter {
            collection.set(task.id().clone(), task);
        }
        collection
    }
}

impl IntoIterator for TaskCollection {
    type Item = Task;
    type IntoIter = std::iter::Flatten<indexmap::map::IntoValues<TaskId, Option<Task>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_values().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetRef;
    use chrono::Utc;

    fn task(id: &str) -> Task {
        Task::new(id, "", "t", TargetRef::named("x"), "m", vec![], Utc::now()).unwrap()
    }

    fn ids(collection: &TaskCollection) -> Vec<String> {
        collection.iter().map(|t| t.id().to_string()).collect()
    }

    #[test]
    fn keeps_insertion_order() {
        let collection: TaskCollection = ["c", "a", "b"].into_iter().map(task).collect();
        assert_eq!(ids(&collection), vec!["c", "a", "b"]);
        assert_eq!(collection.count(), 3);
    }

    #[test]
    fn remove_tombstones_and_is_skipped() {
        let mut collection: TaskCollection = ["a", "b", "c"].into_iter().map(task).collect();
        let b = TaskId::new("b").unwrap();

        assert!(collection.remove(&b));
        assert!(!collection.remove(&b));
        assert!(collection.get(&b).is_none());
        assert_eq!(ids(&collection), vec!["a", "c"]);
        assert_eq!(collection.count(), 2);
    }

    #[test]
    fn set_after_remove_revives_in_original_position() {
        let mut collection: TaskCollection = ["a", "b", "c"].into_iter().map(task).collect();
        let a = TaskId::new("a").unwrap();
        collection.remove(&a);
        collection.set(a, task("a"));
        assert_eq!(ids(&collection), vec!["a", "b", "c"]);
    }

    #[test]
    fn removal_during_visit_does_not_disturb_traversal() {
        let mut collection: TaskCollection = ["a", "b", "c", "d"].into_iter().map(task).collect();
        let mut seen = Vec::new();

        collection.visit(|t| {
            seen.push(t.id().to_string());
            if t.id().as_str() == "b" || t.id().as_str() == "c" {
                Visit::Remove
            } else {
                Visit::Keep
            }
        });

        assert_eq!(seen, vec!["a", "b", "c", "d"]);
        assert_eq!(ids(&collection), vec!["a", "d"]);
    }

    #[test]
    fn for_each_and_into_iter_skip_tombstones() {
        let mut collection: TaskCollection = ["a", "b"].into_iter().map(task).collect();
        collection.remove(&TaskId::new("a").unwrap());

        let mut visited = 0;
        collection.for_each(|_| visited += 1);
        assert_eq!(visited, 1);

        assert_eq!(collection.to_vec().len(), 1);
        let owned: Vec<Task> = collection.into_iter().collect();
        assert_eq!(owned[0].id().as_str(), "b");
    }
}
