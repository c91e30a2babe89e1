//! Bounded in-memory store of recent extraction results.
//!
//! Results are only kept so the download and overlay endpoints can serve
//! them shortly after `/extract` returns. Once `capacity` results are held,
//! each insert evicts the oldest one.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::schema::ExtractionResult;

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, Arc<ExtractionResult>>,
    order: VecDeque<String>,
}

pub struct ExtractionStore {
    capacity: usize,
    entries: RwLock<Entries>,
}

impl ExtractionStore {
    /// A store holding at most `capacity` results (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Keep `result`, evicting the oldest results beyond capacity.
    pub fn insert(&self, result: ExtractionResult) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let id = result.id.clone();
        if entries.by_id.insert(id.clone(), Arc::new(result)).is_none() {
            entries.order.push_back(id);
        }

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.by_id.remove(&oldest);
                debug!("Evicted extraction {}", oldest);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ExtractionResult>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_id
            .len()
    }
}
