//! Tunables for one window's synchronization engine.

use std::collections::HashSet;
use std::time::Duration;

use crate::constants::UPDATE_DEBOUNCE_MILLIS;
use crate::events::EventCategory;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Trailing window applied per (kind, id) on debounced categories.
    pub debounce: Duration,
    pub debounced_categories: HashSet<EventCategory>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(UPDATE_DEBOUNCE_MILLIS),
            // Response updates stream in while a request runs; each one matters.
            debounced_categories: HashSet::from([
                EventCategory::UpdatedWorkspace,
                EventCategory::UpdatedKeyValue,
            ]),
        }
    }
}

impl SyncConfig {
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_debounced(mut self, category: EventCategory, debounced: bool) -> Self {
        if debounced {
            self.debounced_categories.insert(category);
        } else {
            self.debounced_categories.remove(&category);
        }
        self
    }

    /// Applies every event as soon as it arrives.
    pub fn without_debounce(mut self) -> Self {
        self.debounced_categories.clear();
        self
    }

    pub fn is_debounced(&self, category: EventCategory) -> bool {
        // Deletions are never delayed.
        category != EventCategory::DeletedModel
            && !self.debounce.is_zero()
            && self.debounced_categories.contains(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounces_bursty_categories_only() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert!(config.is_debounced(EventCategory::UpdatedWorkspace));
        assert!(config.is_debounced(EventCategory::UpdatedKeyValue));
        assert!(!config.is_debounced(EventCategory::UpdatedResponse));
        assert!(!config.is_debounced(EventCategory::UpdatedRequest));
    }

    #[test]
    fn test_deletions_and_zero_window_are_never_debounced() {
        let config = SyncConfig::default().with_debounced(EventCategory::DeletedModel, true);
        assert!(!config.is_debounced(EventCategory::DeletedModel));

        let config = SyncConfig::default().with_debounce(Duration::ZERO);
        assert!(!config.is_debounced(EventCategory::UpdatedWorkspace));
        assert!(!SyncConfig::default()
            .without_debounce()
            .is_debounced(EventCategory::UpdatedKeyValue));
    }
}
