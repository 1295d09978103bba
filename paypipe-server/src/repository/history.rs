//! History Repository
//!
//! Bounded in-memory log of finished runs, newest first.

use paypipe_core::domain::pipeline::HistoryEntry;
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct HistoryLog {
    entries: Mutex<VecDeque<HistoryEntry>>,
    capacity: usize,
}

impl HistoryLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Prepend an entry, evicting the oldest beyond capacity
    pub fn add_entry(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.push_front(entry);
        entries.truncate(self.capacity);
    }

    /// Up to `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(query: &str) -> HistoryEntry {
        HistoryEntry {
            pipeline_id: Uuid::new_v4(),
            query: query.to_string(),
            success: true,
            step_count: 1,
            succeeded_steps: 1,
            services: vec!["svc".to_string()],
            total_cost: 100,
            duration_ms: 3,
            error: None,
            final_output: None,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_history_is_bounded_and_newest_first() {
        let log = HistoryLog::new(50);

        for n in 0..75 {
            log.add_entry(entry(&n.to_string()));
            assert!(log.len() <= 50);
        }

        assert_eq!(log.len(), 50);
        let recent = log.recent(100);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].query, "74");
        assert_eq!(recent[49].query, "25");
    }

    #[test]
    fn test_recent_limit() {
        let log = HistoryLog::default();
        assert!(log.is_empty());
        assert_eq!(log.capacity(), DEFAULT_CAPACITY);

        for n in 0..5 {
            log.add_entry(entry(&n.to_string()));
        }

        let queries: Vec<String> = log.recent(2).into_iter().map(|e| e.query).collect();
        assert_eq!(queries, vec!["4", "3"]);
        assert!(log.recent(0).is_empty());
    }
}
