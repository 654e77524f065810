use async_trait::async_trait;
use rootcid_types::Fingerprint;

use crate::error::StoreResult;

/// Content-addressed store with pinning.
///
/// All implementations must satisfy these invariants:
/// - `put` stores and pins in one call and returns the fingerprint of the
///   exact bytes given. Identical bytes always yield the identical fingerprint.
/// - `get` returns bytes only for pinned (or still retained) content and
///   [`StoreError::NotFound`] otherwise.
/// - `unpin` is idempotent and fails only with [`StoreError::Unavailable`].
/// - No implementation retries internally.
///
/// [`StoreError::NotFound`]: crate::StoreError::NotFound
/// [`StoreError::Unavailable`]: crate::StoreError::Unavailable
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Store and pin bytes, returning their fingerprint.
    async fn put(&self, data: &[u8]) -> StoreResult<Fingerprint>;

    /// Fetch the bytes addressed by `fingerprint`.
    async fn get(&self, fingerprint: &Fingerprint) -> StoreResult<Vec<u8>>;

    /// Release the pin on `fingerprint`.
    async fn unpin(&self, fingerprint: &Fingerprint) -> StoreResult<()>;

    /// Whether `fingerprint` is currently pinned.
    async fn is_pinned(&self, fingerprint: &Fingerprint) -> StoreResult<bool>;
}
