//! Dense integer ids for task id strings.
//!
//! Ids are assigned in lexicographic order of the strings, so comparing two
//! `TaskId`s gives the same answer as comparing the task id strings.

use rustc_hash::FxHashMap;

/// Interned task id.
pub type TaskId = u32;

/// Bidirectional mapping between task id strings and `TaskId`s.
#[derive(Debug, Clone, Default)]
pub struct TaskIndex {
    to_int: FxHashMap<String, TaskId>,
    from_int: Vec<String>,
}

impl TaskIndex {
    /// Build an index over the given ids. Duplicates collapse onto one entry.
    pub fn from_ids<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut sorted: Vec<&str> = ids.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut to_int = FxHashMap::with_capacity_and_hasher(sorted.len(), Default::default());
        let mut from_int = Vec::with_capacity(sorted.len());
        for (i, id) in sorted.into_iter().enumerate() {
            to_int.insert(id.to_string(), i as TaskId);
            from_int.push(id.to_string());
        }
        Self { to_int, from_int }
    }

    #[inline]
    pub fn get(&self, s: &str) -> Option<TaskId> {
        self.to_int.get(s).copied()
    }

    /// Get the string for an id. Panics on ids not produced by this index.
    #[inline]
    pub fn name(&self, id: TaskId) -> &str {
        &self.from_int[id as usize]
    }

    pub fn len(&self) -> usize {
        self.from_int.len()
    }

    pub fn is_empty(&self) -> bool {
        self.from_int.is_empty()
    }
}
