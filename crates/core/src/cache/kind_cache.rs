//! Flat per-kind cache with a secondary group index kept in lock-step.

use std::collections::{HashMap, HashSet};

use crate::models::{AnyModel, Model};

/// Where the current value of a cache entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    /// Returned by this window's own write call; not yet confirmed by an event.
    Optimistic,
    /// Applied from a backend change event.
    Event,
    /// Loaded by a full refetch of the kind.
    Refetch,
}

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub value: AnyModel,
    pub source: EntrySource,
}

/// Ids changed while at least one refetch of the kind was in flight.
///
/// A refetch snapshot is older than any of these changes, so the rebuild
/// keeps the cached state for them (value or absence) over the snapshot.
#[derive(Debug, Default)]
struct RefetchJournal {
    tickets: HashSet<u64>,
    touched: HashSet<String>,
}

#[derive(Debug, Default)]
pub(crate) struct KindCache {
    entries: HashMap<String, CacheEntry>,
    /// group key -> member ids, in first-insertion order
    groups: HashMap<String, Vec<String>>,
    journal: RefetchJournal,
}

impl KindCache {
    pub fn from_values(values: Vec<AnyModel>, source: EntrySource) -> Self {
        let mut cache = Self::default();
        for value in values {
            cache.upsert(value, source);
        }
        cache
    }

    pub fn get(&self, id: &str) -> Option<&CacheEntry> {
        self.entries.get(id)
    }

    /// Replaces the whole entry for the value's id, returning the previous one.
    pub fn upsert(&mut self, value: AnyModel, source: EntrySource) -> Option<CacheEntry> {
        let id = value.id().to_string();
        let new_group = value.group_key().map(str::to_string);
        let previous = self
            .entries
            .insert(id.clone(), CacheEntry { value, source });

        let old_group = previous
            .as_ref()
            .and_then(|entry| entry.value.group_key().map(str::to_string));

        if previous.is_none() || old_group != new_group {
            if let Some(old_group) = old_group {
                self.remove_from_group(&old_group, &id);
            }
            if let Some(new_group) = new_group {
                self.groups.entry(new_group).or_default().push(id);
            }
        }

        previous
    }

    pub fn begin_refetch(&mut self, ticket: u64) {
        self.journal.tickets.insert(ticket);
    }

    /// Closes `ticket`. Unknown tickets (e.g. from before a `clear`) are ignored.
    pub fn end_refetch(&mut self, ticket: u64) {
        if self.journal.tickets.remove(&ticket) && self.journal.tickets.is_empty() {
            self.journal.touched.clear();
        }
    }

    /// Records that `id` changed, if a refetch is in flight.
    pub fn note_change(&mut self, id: &str) {
        if !self.journal.tickets.is_empty() {
            self.journal.touched.insert(id.to_string());
        }
    }

    /// Rebuilds from a refetch snapshot. Ids changed since the refetch began
    /// keep their current state.
    pub fn rebuild(&mut self, values: Vec<AnyModel>, source: EntrySource) {
        let mut rebuilt = Self::from_values(values, source);
        for id in &self.journal.touched {
            rebuilt.remove(id);
            if let Some(entry) = self.entries.get(id) {
                rebuilt.upsert(entry.value.clone(), entry.source);
            }
        }
        rebuilt.journal = std::mem::take(&mut self.journal);
        *self = rebuilt;
    }

    pub fn remove(&mut self, id: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(id)?;
        if let Some(group) = removed.value.group_key() {
            let group = group.to_string();
            self.remove_from_group(&group, id);
        }
        Some(removed)
    }

    fn remove_from_group(&mut self, group: &str, id: &str) {
        if let Some(members) = self.groups.get_mut(group) {
            members.retain(|member| member != id);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }

    pub fn group(&self, group: &str) -> Vec<AnyModel> {
        self.groups
            .get(group)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.entries.get(id))
                    .map(|entry| entry.value.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<AnyModel> {
        let mut values: Vec<AnyModel> = self.entries.values().map(|e| e.value.clone()).collect();
        values.sort_by(|a, b| a.id().cmp(b.id()));
        values
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
