//! Connection registry (C6): `id -> connection` with per-entry locking and
//! a bulk iterator that never holds a lock across the visitor callback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use fxhash::FxBuildHasher;

use crate::connection::Connection;
use crate::types::ConnId;

/// A cloned reference to a registry slot. Holding one keeps the entry
/// alive even after `remove` has dropped it from the map. This is the
/// Rust analogue of the source's "outstanding acquires defer removal"
/// rule, falling out of `Arc` refcounting rather than an explicit flag.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Mutex<Connection>>,
}

impl ConnectionHandle {
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

pub struct Registry {
    next_id: AtomicI64,
    entries: RwLock<HashMap<ConnId, Arc<Mutex<Connection>>, FxBuildHasher>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(0),
            entries: RwLock::new(HashMap::with_hasher(FxBuildHasher::default())),
        }
    }

    pub fn next_id(&self) -> ConnId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, id: ConnId, connection: Connection) {
        self.entries
            .write()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(connection)));
    }

    /// Prevents concurrent removal and grants exclusive access to the
    /// entry once `lock()` is called on the returned handle.
    pub fn acquire(&self, id: ConnId) -> Option<ConnectionHandle> {
        self.entries
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .map(|inner| ConnectionHandle { inner })
    }

    /// Marks the entry for deletion; physical removal from the map is
    /// immediate, but any handle acquired earlier keeps the connection
    /// alive (and usable) until it is dropped.
    pub fn remove(&self, id: ConnId) -> Option<ConnectionHandle> {
        self.entries
            .write()
            .unwrap()
            .remove(&id)
            .map(|inner| ConnectionHandle { inner })
    }

    /// Invokes `f(id)` for every id live at the moment of the snapshot,
    /// without holding any per-entry lock while `f` runs. `f` acquiring
    /// an id that was concurrently removed is expected and not an error.
    pub fn for_each_id(&self, mut f: impl FnMut(ConnId)) {
        let ids: Vec<ConnId> = self.entries.read().unwrap().keys().copied().collect();
        for id in ids {
            f(id);
        }
    }

    pub fn size(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
