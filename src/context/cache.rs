//! Generic write-through cache.
//!
//! The cache is a view, never the source of truth. Mutations go to the
//! durable store first; the cached copy is patched only once the store has
//! confirmed the write. Refreshes and commits are serialized by a writer
//! gate so a refresh can never overwrite a patch with data read before it.

use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::storage::error::StorageResult;

/// Lifecycle of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePhase {
    /// Never loaded
    #[default]
    Uninitialized,
    /// A refresh is in progress
    Loading,
    /// Holds a full copy of the store
    Ready,
}

#[derive(Debug)]
struct CacheState<T> {
    phase: CachePhase,
    items: Vec<T>,
}

/// In-memory copy of a collection kept in step with its durable store.
#[derive(Debug)]
pub struct WriteThroughCache<T> {
    state: RwLock<CacheState<T>>,
    writer: Mutex<()>,
}

impl<T: Clone> Default for WriteThroughCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> WriteThroughCache<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CacheState {
                phase: CachePhase::Uninitialized,
                items: Vec::new(),
            }),
            writer: Mutex::new(()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState<T>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState<T>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn phase(&self) -> CachePhase {
        self.read().phase
    }

    /// Copy of the cached items.
    pub fn snapshot(&self) -> Vec<T> {
        self.read().items.clone()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    /// Replace the cache wholesale with what `load` returns.
    ///
    /// On failure the previous contents and phase are kept.
    pub fn refresh<F>(&self, load: F) -> StorageResult<usize>
    where
        F: FnOnce() -> StorageResult<Vec<T>>,
    {
        let _gate = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let previous = {
            let mut state = self.write();
            std::mem::replace(&mut state.phase, CachePhase::Loading)
        };

        let result = load();

        let mut state = self.write();
        match result {
            Ok(items) => {
                state.items = items;
                state.phase = CachePhase::Ready;
                Ok(state.items.len())
            }
            Err(e) => {
                state.phase = previous;
                Err(e)
            }
        }
    }

    /// Run `write` against the durable store, then apply `patch` to the
    /// cached items.
    ///
    /// If `write` fails the cache is untouched and the error returned. The
    /// patch is skipped while the cache has never been loaded, since a
    /// partial copy would pass for the whole collection.
    pub fn commit<R, W, P>(&self, write: W, patch: P) -> StorageResult<R>
    where
        W: FnOnce() -> StorageResult<R>,
        P: FnOnce(&mut Vec<T>, &R),
    {
        let _gate = self.writer.lock().unwrap_or_else(|e| e.into_inner());

        let outcome = write()?;

        let mut state = self.write();
        if state.phase == CachePhase::Ready {
            patch(&mut state.items, &outcome);
        }
        Ok(outcome)
    }
}
