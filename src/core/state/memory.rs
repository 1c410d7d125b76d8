//! core::state::memory
//!
//! In-memory [`StackStore`].
//!
//! Shares the document type and validation with [`super::GitStateStore`],
//! so tests against this store exercise the same transaction rules. Every
//! committed message is kept for assertions.

use std::sync::{Arc, Mutex, MutexGuard};

use super::schema::StateV1;
use super::{Branch, StackStore, StoreError, UpsertBranchRequest};
use crate::core::types::BranchName;

#[derive(Debug)]
struct MemoryInner {
    state: StateV1,
    log: Vec<String>,
}

/// Stack state held in memory. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStore {
    /// Empty forest rooted at `trunk`.
    pub fn new(trunk: BranchName) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                state: StateV1::new(trunk),
                log: Vec::new(),
            })),
        }
    }

    /// Messages of committed transactions, oldest first.
    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // `apply` only swaps the map in on success, so even a poisoned
        // lock guards a whole document.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StackStore for MemoryStore {
    fn trunk(&self) -> Result<BranchName, StoreError> {
        Ok(self.lock().state.trunk.clone())
    }

    fn lookup_branch(&self, name: &BranchName) -> Result<Branch, StoreError> {
        self.lock()
            .state
            .branch(name)
            .ok_or_else(|| StoreError::NotTracked(name.clone()))
    }

    fn list_above(&self, name: &BranchName) -> Result<Vec<BranchName>, StoreError> {
        Ok(self.lock().state.children_of(name))
    }

    fn branches(&self) -> Result<Vec<Branch>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .state
            .branches
            .keys()
            .filter_map(|name| inner.state.branch(name))
            .collect())
    }

    fn upsert_branches(&self, batch: &[UpsertBranchRequest], message: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.state.apply(batch)?;
        inner.log.push(message.to_string());
        Ok(())
    }
}
