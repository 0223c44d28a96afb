//! The pagination snapshot store.
//!
//! The engine returns complete federated result lists; pagination is the
//! surface's job. A snapshot of the full list is stored under an opaque
//! cursor id and pages are served from it on continuation requests. The
//! engine itself never reads from this store.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

/// Storage for federated result snapshots, keyed by cursor id.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Stores a snapshot and returns its cursor id.
    async fn store(&self, resources: Vec<Value>) -> String;

    /// Retrieves a snapshot by cursor id.
    async fn retrieve(&self, cursor: &str) -> Option<Vec<Value>>;
}

/// In-memory page store with FIFO eviction.
#[derive(Debug)]
pub struct InMemoryPageStore {
    snapshots: RwLock<Snapshots>,
    max_snapshots: usize,
}

#[derive(Debug, Default)]
struct Snapshots {
    pages: HashMap<String, Vec<Value>>,
    order: VecDeque<String>,
}

impl InMemoryPageStore {
    /// Creates a store retaining at most `max_snapshots` snapshots.
    pub fn new(max_snapshots: usize) -> Self {
        Self {
            snapshots: RwLock::new(Snapshots::default()),
            max_snapshots: max_snapshots.max(1),
        }
    }

    /// Number of retained snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.read().pages.len()
    }

    /// Whether the store holds no snapshots.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryPageStore {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[async_trait]
impl PageStore for InMemoryPageStore {
    async fn store(&self, resources: Vec<Value>) -> String {
        let cursor = Uuid::new_v4().to_string();
        let mut snapshots = self.snapshots.write();
        while snapshots.order.len() >= self.max_snapshots {
            if let Some(evicted) = snapshots.order.pop_front() {
                snapshots.pages.remove(&evicted);
            }
        }
        snapshots.order.push_back(cursor.clone());
        snapshots.pages.insert(cursor.clone(), resources);
        cursor
    }

    async fn retrieve(&self, cursor: &str) -> Option<Vec<Value>> {
        self.snapshots.read().pages.get(cursor).cloned()
    }
}
