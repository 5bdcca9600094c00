use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactDescriptor;
use crate::store::{ArtifactStore, StorageError};

/// In-memory set of known artifacts, keyed by encoded form and kept in
/// insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registry {
    entries: IndexMap<String, ArtifactDescriptor>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub discarded: usize,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union a loaded snapshot into the set. Corrupt entries are skipped.
    pub fn reconcile<I, S>(&mut self, loaded: I) -> ReconcileOutcome
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut outcome = ReconcileOutcome::default();
        for raw in loaded {
            let raw = raw.as_ref();
            match ArtifactDescriptor::decode(raw) {
                Ok(descriptor) => {
                    if self.insert(descriptor) {
                        outcome.added += 1;
                    }
                }
                Err(err) => {
                    warn!(entry = %raw, error = %err, "Discarding corrupt registry entry");
                    outcome.discarded += 1;
                }
            }
        }
        outcome
    }

    /// Union descriptors into the set; returns how many were new.
    pub fn merge<I>(&mut self, new_ones: I) -> usize
    where
        I: IntoIterator<Item = ArtifactDescriptor>,
    {
        new_ones
            .into_iter()
            .filter(|descriptor| self.insert(descriptor.clone()))
            .count()
    }

    /// Drop every descriptor matching `predicate`; returns the dropped ones.
    pub fn remove_if<F>(&mut self, mut predicate: F) -> Vec<ArtifactDescriptor>
    where
        F: FnMut(&ArtifactDescriptor) -> bool,
    {
        let mut removed = Vec::new();
        self.entries.retain(|_, descriptor| {
            if predicate(descriptor) {
                removed.push(descriptor.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<ArtifactDescriptor> {
        self.entries.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, descriptor: ArtifactDescriptor) -> bool {
        let key = descriptor.encode();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, descriptor);
        true
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    registry: Registry,
    pending: Vec<ArtifactDescriptor>,
}

struct SharedRegistryInner {
    state: Mutex<RegistryState>,
    store: Arc<dyn ArtifactStore>,
}

/// Process-wide registry handle shared by every connection.
///
/// Each operation holds the registry lock across its store call, so registry
/// mutation and persistence are serialized. When the store fails the
/// in-memory change is kept and the error is returned for logging.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Arc<SharedRegistryInner>,
}

impl SharedRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            inner: Arc::new(SharedRegistryInner {
                state: Mutex::new(RegistryState::default()),
                store,
            }),
        }
    }

    pub fn store_location(&self) -> String {
        self.inner.store.location()
    }

    /// Reconcile the persisted snapshot into memory (merge, never replace).
    pub async fn sync_from_store(&self) -> Result<ReconcileOutcome, StorageError> {
        let mut state = self.inner.state.lock().await;
        let loaded = self.inner.store.load().await?;
        let outcome = state.registry.reconcile(&loaded);
        debug!(
            loaded = loaded.len(),
            added = outcome.added,
            discarded = outcome.discarded,
            total = state.registry.len(),
            "Reconciled registry with store"
        );
        Ok(outcome)
    }

    /// Record a freshly produced artifact until the next flush.
    pub async fn push_pending(&self, descriptor: ArtifactDescriptor) {
        self.inner.state.lock().await.pending.push(descriptor);
    }

    pub async fn pending_len(&self) -> usize {
        self.inner.state.lock().await.pending.len()
    }

    /// Merge pending artifacts into the registry and persist the snapshot.
    /// Returns how many pending artifacts were new to the registry.
    pub async fn flush_pending(&self) -> Result<usize, StorageError> {
        let mut state = self.inner.state.lock().await;
        let pending = std::mem::take(&mut state.pending);
        let added = state.registry.merge(pending);
        let snapshot = state.registry.snapshot();
        self.inner.store.save(&snapshot).await?;
        debug!(added, total = snapshot.len(), "Persisted registry snapshot");
        Ok(added)
    }

    /// Empty the registry, the pending list and the persisted snapshot.
    pub async fn reset(&self) -> Result<(), StorageError> {
        let mut state = self.inner.state.lock().await;
        let dropped = state.registry.len();
        state.registry.clear();
        state.pending.clear();
        info!(dropped, "Registry reset");
        self.inner.store.clear().await
    }

    /// Remove matching descriptors and persist what remains.
    pub async fn remove_and_persist<F>(
        &self,
        predicate: F,
    ) -> Result<Vec<ArtifactDescriptor>, StorageError>
    where
        F: FnMut(&ArtifactDescriptor) -> bool,
    {
        let mut state = self.inner.state.lock().await;
        let removed = state.registry.remove_if(predicate);
        if removed.is_empty() {
            return Ok(removed);
        }
        let snapshot = state.registry.snapshot();
        self.inner.store.save(&snapshot).await?;
        Ok(removed)
    }

    pub async fn snapshot(&self) -> Vec<String> {
        self.inner.state.lock().await.registry.snapshot()
    }

    pub async fn descriptors(&self) -> Vec<ArtifactDescriptor> {
        self.inner.state.lock().await.registry.descriptors()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.registry.len()
    }
}
