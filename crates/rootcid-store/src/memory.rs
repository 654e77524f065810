use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use rootcid_crypto::ContentHasher;
use rootcid_types::Fingerprint;

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// Store operations that can be individually taken offline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    Get,
    Unpin,
}

#[derive(Default)]
struct Faults {
    down: HashSet<StoreOp>,
    latency: Option<Duration>,
}

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Pinned objects are held behind a
/// `RwLock`; unpinning reclaims immediately, so a `get` after `unpin` yields
/// [`StoreError::NotFound`]. Faults (unavailable operations, latency,
/// corrupted content) can be injected to exercise coordinator error paths.
pub struct InMemoryContentStore {
    objects: RwLock<HashMap<Fingerprint, Vec<u8>>>,
    faults: RwLock<Faults>,
    max_object_bytes: Option<usize>,
    puts: AtomicUsize,
    unpins: AtomicUsize,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            faults: RwLock::new(Faults::default()),
            max_object_bytes: None,
            puts: AtomicUsize::new(0),
            unpins: AtomicUsize::new(0),
        }
    }

    /// Reject objects larger than `limit` bytes with [`StoreError::Rejected`].
    pub fn with_max_object_bytes(mut self, limit: usize) -> Self {
        self.max_object_bytes = Some(limit);
        self
    }

    /// Take every operation offline (`false`) or bring all back (`true`).
    pub fn set_available(&self, available: bool) {
        let mut faults = self.faults.write().unwrap_or_else(PoisonError::into_inner);
        if available {
            faults.down.clear();
        } else {
            faults.down.extend([StoreOp::Put, StoreOp::Get, StoreOp::Unpin]);
        }
    }

    /// Take a single operation offline or bring it back.
    pub fn set_op_available(&self, op: StoreOp, available: bool) {
        let mut faults = self.faults.write().unwrap_or_else(PoisonError::into_inner);
        if available {
            faults.down.remove(&op);
        } else {
            faults.down.insert(op);
        }
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .latency = latency;
    }

    /// Replace the bytes held for `fingerprint`, simulating a misbehaving store.
    pub fn corrupt(&self, fingerprint: &Fingerprint, bytes: Vec<u8>) {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*fingerprint, bytes);
    }

    /// Number of pinned objects.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `fingerprint` is pinned, bypassing fault injection.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(fingerprint)
    }

    /// Sorted list of all pinned fingerprints.
    pub fn pinned(&self) -> Vec<Fingerprint> {
        let map = self.objects.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<Fingerprint> = map.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Number of successful `put` calls, including deduplicated ones.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of successful `unpin` calls.
    pub fn unpin_count(&self) -> usize {
        self.unpins.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: StoreOp) -> StoreResult<()> {
        let (down, latency) = {
            let faults = self.faults.read().unwrap_or_else(PoisonError::into_inner);
            (faults.down.contains(&op), faults.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if down {
            return Err(StoreError::unavailable(format!("{op:?} is offline")));
        }
        Ok(())
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, data: &[u8]) -> StoreResult<Fingerprint> {
        self.enter(StoreOp::Put).await?;
        if let Some(limit) = self.max_object_bytes {
            if data.len() > limit {
                return Err(StoreError::rejected(format!(
                    "object of {} bytes exceeds limit of {limit}",
                    data.len()
                )));
            }
        }

        let fingerprint = ContentHasher::fingerprint(data);
        let mut map = self
            .objects
            .write()
            .map_err(|e| StoreError::unavailable(format!("lock poisoned: {e}")))?;
        // Idempotent: content-addressing guarantees the same key maps to the same bytes.
        map.entry(fingerprint).or_insert_with(|| data.to_vec());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(fingerprint)
    }

    async fn get(&self, fingerprint: &Fingerprint) -> StoreResult<Vec<u8>> {
        self.enter(StoreOp::Get).await?;
        let map = self
            .objects
            .read()
            .map_err(|e| StoreError::unavailable(format!("lock poisoned: {e}")))?;
        map.get(fingerprint)
            .cloned()
            .ok_or(StoreError::NotFound(*fingerprint))
    }

    async fn unpin(&self, fingerprint: &Fingerprint) -> StoreResult<()> {
        self.enter(StoreOp::Unpin).await?;
        let mut map = self
            .objects
            .write()
            .map_err(|e| StoreError::unavailable(format!("lock poisoned: {e}")))?;
        map.remove(fingerprint);
        self.unpins.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_pinned(&self, fingerprint: &Fingerprint) -> StoreResult<bool> {
        self.enter(StoreOp::Get).await?;
        Ok(self.contains(fingerprint))
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("pinned", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryContentStore::new();
        let fp = store.put(b"hello world").await.unwrap();
        assert_eq!(store.get(&fp).await.unwrap(), b"hello world");
        assert!(store.is_pinned(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn put_is_idempotent_by_content() {
        let store = InMemoryContentStore::new();
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.put_count(), 2);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryContentStore::new();
        let fp = Fingerprint::compute(b"never stored");
        assert_eq!(store.get(&fp).await, Err(StoreError::NotFound(fp)));
    }

    #[tokio::test]
    async fn unpin_reclaims() {
        let store = InMemoryContentStore::new();
        let fp = store.put(b"short lived").await.unwrap();
        store.unpin(&fp).await.unwrap();
        assert_eq!(store.get(&fp).await, Err(StoreError::NotFound(fp)));
        assert!(!store.is_pinned(&fp).await.unwrap());
    }

    #[tokio::test]
    async fn unpin_is_idempotent() {
        let store = InMemoryContentStore::new();
        let fp = store.put(b"twice").await.unwrap();
        store.unpin(&fp).await.unwrap();
        store.unpin(&fp).await.unwrap();
        store
            .unpin(&Fingerprint::compute(b"unknown"))
            .await
            .unwrap();
        assert_eq!(store.unpin_count(), 3);
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = InMemoryContentStore::new();
        let fp = store.put(b"kept").await.unwrap();
        store.set_available(false);
        assert!(matches!(store.put(b"x").await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.get(&fp).await, Err(StoreError::Unavailable(_))));
        assert!(matches!(store.unpin(&fp).await, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert_eq!(store.get(&fp).await.unwrap(), b"kept");
    }

    #[tokio::test]
    async fn single_operation_outage() {
        let store = InMemoryContentStore::new();
        store.set_op_available(StoreOp::Unpin, false);
        let fp = store.put(b"pinned").await.unwrap();
        assert!(store.unpin(&fp).await.unwrap_err().is_transient());
        assert!(store.contains(&fp));
    }

    #[tokio::test]
    async fn oversized_object_is_rejected() {
        let store = InMemoryContentStore::new().with_max_object_bytes(4);
        assert!(matches!(
            store.put(b"too large").await,
            Err(StoreError::Rejected(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn corrupt_replaces_bytes() {
        let store = InMemoryContentStore::new();
        let fp = store.put(b"genuine").await.unwrap();
        store.corrupt(&fp, b"forged".to_vec());
        assert_eq!(store.get(&fp).await.unwrap(), b"forged");
    }

    #[tokio::test]
    async fn pinned_is_sorted() {
        let store = InMemoryContentStore::new();
        for data in [&b"c"[..], b"a", b"b"] {
            store.put(data).await.unwrap();
        }
        let pinned = store.pinned();
        assert_eq!(pinned.len(), 3);
        assert!(pinned.windows(2).all(|w| w[0] < w[1]));
    }

    proptest! {
        #[test]
        fn get_of_put_returns_the_same_bytes(
            data in proptest::collection::vec(any::<u8>(), 0..1024)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let store = InMemoryContentStore::new();
                let fp = store.put(&data).await.unwrap();
                let back = store.get(&fp).await.unwrap();
                assert_eq!(&back, &data);
                assert_eq!(ContentHasher::fingerprint(&back), fp);
            });
        }
    }
}
