use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use serde::Serialize;
use tracing::debug;

use crate::models::{summary::SummaryMap, trip::Trip};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefPath {
    Trips { user_uuid: String },
    Summaries { user_uuid: String },
}

impl RefPath {
    pub fn trips(user_uuid: impl Into<String>) -> Self {
        RefPath::Trips {
            user_uuid: user_uuid.into(),
        }
    }

    pub fn summaries(user_uuid: impl Into<String>) -> Self {
        RefPath::Summaries {
            user_uuid: user_uuid.into(),
        }
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefPath::Trips { user_uuid } => write!(f, "trips/{user_uuid}"),
            RefPath::Summaries { user_uuid } => write!(f, "summaries/{user_uuid}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Snapshot {
    Trips(Vec<Trip>),
    Summaries(SummaryMap),
}

pub type SnapshotCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

struct Listener {
    id: u64,
    callback: SnapshotCallback,
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<RefPath, Vec<Listener>>>,
}

impl Registry {
    fn listeners(&self) -> MutexGuard<'_, HashMap<RefPath, Vec<Listener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, path: &RefPath, id: u64) -> bool {
        let mut listeners = self.listeners();
        let Some(entries) = listeners.get_mut(path) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|listener| listener.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(path);
        }
        removed
    }
}

/// Fan-out of document snapshots to whoever is watching a path.
#[derive(Clone, Default)]
pub struct SnapshotHub {
    registry: Arc<Registry>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_snapshot<F>(&self, path: RefPath, callback: F) -> Subscription
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners()
            .entry(path.clone())
            .or_default()
            .push(Listener {
                id,
                callback: Arc::new(callback),
            });
        debug!(%path, id, "snapshot listener registered");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            path,
            id,
            released: false,
        }
    }

    /// Calls every listener on `path`. Callbacks run outside the registry lock.
    pub fn publish(&self, path: &RefPath, snapshot: &Snapshot) -> usize {
        let callbacks: Vec<SnapshotCallback> = self
            .registry
            .listeners()
            .get(path)
            .map(|entries| entries.iter().map(|l| l.callback.clone()).collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(snapshot);
        }
        callbacks.len()
    }

    /// Drops every listener on `path` without notifying them.
    pub fn cancel(&self, path: &RefPath) {
        if let Some(entries) = self.registry.listeners().remove(path) {
            debug!(%path, count = entries.len(), "snapshot listeners cancelled");
        }
    }

    pub fn listener_count(&self, path: &RefPath) -> usize {
        self.registry
            .listeners()
            .get(path)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Handle to one registration. Released on `unsubscribe` or drop.
pub struct Subscription {
    registry: Weak<Registry>,
    path: RefPath,
    id: u64,
    released: bool,
}

impl Subscription {
    pub fn path(&self) -> &RefPath {
        &self.path
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(&self.path, self.id) {
                debug!(path = %self.path, id = self.id, "snapshot listener released");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}
