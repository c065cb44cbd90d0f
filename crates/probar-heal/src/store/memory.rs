//! In-process locator store.

use super::{LocatorStore, StoreError, StoreHandle, DEFAULT_NAMESPACE};
use crate::locator::{LocatorIdentity, LocatorRecord, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

type Records = HashMap<LocatorIdentity, Vec<LocatorRecord>>;

/// Locator store held in memory; records vanish with the process.
///
/// Each identity keeps its records most recent first.
#[derive(Debug)]
pub struct MemoryLocatorStore {
    namespace: String,
    records: Mutex<Records>,
    open_handles: AtomicUsize,
    total_opens: AtomicUsize,
}

impl MemoryLocatorStore {
    /// Create an empty store in the default namespace
    #[must_use]
    pub fn new() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    /// Create an empty store in `namespace`
    #[must_use]
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            records: Mutex::new(HashMap::new()),
            open_handles: AtomicUsize::new(0),
            total_opens: AtomicUsize::new(0),
        }
    }

    /// Handles currently open
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Handles opened over the store's lifetime
    #[must_use]
    pub fn total_opens(&self) -> usize {
        self.total_opens.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryLocatorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocatorStore for MemoryLocatorStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn open(&self) -> Result<Box<dyn StoreHandle + '_>, StoreError> {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        self.total_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryHandle { store: self }))
    }
}

struct MemoryHandle<'a> {
    store: &'a MemoryLocatorStore,
}

impl Drop for MemoryHandle<'_> {
    fn drop(&mut self) {
        self.store.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StoreHandle for MemoryHandle<'_> {
    fn put(&mut self, identity: &LocatorIdentity, selector: &Selector) -> Result<(), StoreError> {
        let mut records = self.store.lock()?;
        let slot = records.entry(identity.clone()).or_default();
        slot.retain(|r| r.strategy() != selector.tag());
        slot.insert(0, LocatorRecord::new(selector.clone()));
        Ok(())
    }

    fn get_all(&self, identity: &LocatorIdentity) -> Result<Vec<LocatorRecord>, StoreError> {
        Ok(self
            .store
            .lock()?
            .get(identity)
            .cloned()
            .unwrap_or_default())
    }

    fn identities(&self) -> Result<Vec<LocatorIdentity>, StoreError> {
        let mut ids: Vec<_> = self
            .store
            .lock()?
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn remove(&mut self, identity: &LocatorIdentity) -> Result<usize, StoreError> {
        Ok(self
            .store
            .lock()?
            .remove(identity)
            .map_or(0, |records| records.len()))
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::{contract, with_handle};
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_memory_store_contract() {
        contract::run_all(&MemoryLocatorStore::new());
    }

    #[test]
    fn test_namespace() {
        assert_eq!(MemoryLocatorStore::new().namespace(), DEFAULT_NAMESPACE);
        assert_eq!(MemoryLocatorStore::with_namespace("ns").namespace(), "ns");
    }

    #[test]
    fn test_handle_released_on_drop() {
        let store = MemoryLocatorStore::new();
        {
            let _handle = store.open().unwrap();
            assert_eq!(store.open_handles(), 1);
        }
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(MemoryLocatorStore::new());
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let identity = contract::id(&format!("css=#w{i}"));
                    for n in 0..20 {
                        with_handle(store.as_ref(), |h| {
                            h.put(&identity, &Selector::css(format!("#v{n}")))
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let ids = with_handle(store.as_ref(), |h| h.identities()).unwrap();
        assert_eq!(ids.len(), 8);
        let records = with_handle(store.as_ref(), |h| h.get_all(&contract::id("css=#w3"))).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].expression(), "#v19");
        assert_eq!(store.open_handles(), 0);
    }
}
