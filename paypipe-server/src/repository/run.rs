//! Run Repository
//!
//! Live status of runs keyed by pipeline id. Runs in flight are always kept;
//! finished runs are retained up to a fixed count, oldest evicted first.

use paypipe_core::domain::pipeline::RunStatus;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_RETAINED: usize = 50;

#[derive(Debug, Default)]
struct Runs {
    by_id: HashMap<Uuid, RunStatus>,
    finished: VecDeque<Uuid>,
}

#[derive(Debug)]
pub struct RunStore {
    runs: RwLock<Runs>,
    retain_finished: usize,
}

impl RunStore {
    /// Store that keeps at most `retain_finished` finished runs
    pub fn new(retain_finished: usize) -> Self {
        Self {
            runs: RwLock::new(Runs::default()),
            retain_finished,
        }
    }

    pub fn insert(&self, status: RunStatus) {
        self.runs
            .write()
            .unwrap()
            .by_id
            .insert(status.pipeline_id, status);
    }

    /// Snapshot of one run's status
    pub fn find_by_id(&self, id: Uuid) -> Option<RunStatus> {
        self.runs.read().unwrap().by_id.get(&id).cloned()
    }

    /// Apply `f` to a run's status; returns false when the run is unknown
    pub fn update(&self, id: Uuid, f: impl FnOnce(&mut RunStatus)) -> bool {
        match self.runs.write().unwrap().by_id.get_mut(&id) {
            Some(status) => {
                f(status);
                true
            }
            None => false,
        }
    }

    /// Marks a run as finished, evicting the oldest finished runs past the cap
    pub fn mark_finished(&self, id: Uuid) {
        let mut runs = self.runs.write().unwrap();
        if !runs.by_id.contains_key(&id) || runs.finished.contains(&id) {
            return;
        }
        runs.finished.push_back(id);
        while runs.finished.len() > self.retain_finished {
            if let Some(oldest) = runs.finished.pop_front() {
                runs.by_id.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETAINED)
    }
}
