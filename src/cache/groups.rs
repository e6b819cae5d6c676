//! Group Index Module
//!
//! Tracks which keys belong to which group for bulk invalidation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// == Group Index ==
/// Secondary index from group name to member keys.
///
/// Entry records are the source of truth; every operation here tolerates a
/// stale index (removing unknown keys or groups is a no-op).
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupIndex {
    groups: BTreeMap<String, BTreeSet<String>>,
}

impl GroupIndex {
    // == Constructor ==
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    // == Add ==
    /// Registers `key` under `group`, creating the group if needed.
    ///
    /// Returns true if the index changed.
    pub fn add(&mut self, group: &str, key: &str) -> bool {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(key.to_string())
    }

    // == Remove Key ==
    /// Removes `key` from `group`, dropping the group once it is empty.
    ///
    /// Returns true if the index changed.
    pub fn remove_key(&mut self, group: &str, key: &str) -> bool {
        let Some(members) = self.groups.get_mut(group) else {
            return false;
        };
        let removed = members.remove(key);
        if members.is_empty() {
            self.groups.remove(group);
        }
        removed
    }

    // == Take Group ==
    /// Removes a whole group and returns its members.
    pub fn take_group(&mut self, group: &str) -> Option<BTreeSet<String>> {
        self.groups.remove(group)
    }

    // == Members ==
    /// Returns the keys registered under `group`.
    pub fn members(&self, group: &str) -> Option<&BTreeSet<String>> {
        self.groups.get(group)
    }

    /// Checks if a key is registered under `group`.
    pub fn contains(&self, group: &str, key: &str) -> bool {
        self.groups
            .get(group)
            .map(|members| members.contains(key))
            .unwrap_or(false)
    }

    /// Iterates over group names.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    // == Length ==
    /// Returns the number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if no group is registered.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
