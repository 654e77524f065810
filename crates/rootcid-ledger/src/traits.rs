use async_trait::async_trait;
use rootcid_types::{CommitReceipt, Fingerprint, RootEvent, RootPointer};

use crate::error::LedgerResult;

/// Client for the single-slot root pointer ledger.
///
/// Every caller is authoritative: `set_current` carries no expected-previous
/// precondition, so concurrent writers resolve last-write-wins at the ledger.
#[async_trait]
pub trait RootLedger: Send + Sync {
    /// Ledger name for logging.
    fn name(&self) -> &'static str;

    /// Current pointer value, or [`RootPointer::Unset`] if never published.
    async fn read_current(&self) -> LedgerResult<RootPointer>;

    /// Record a transition setting the pointer to `fingerprint`.
    ///
    /// Returns only once the transition is durably recorded.
    async fn set_current(&self, fingerprint: &Fingerprint) -> LedgerResult<CommitReceipt>;

    /// Set events recorded at or after ledger height `from_block`, oldest first.
    async fn events_since(&self, from_block: u64) -> LedgerResult<Vec<RootEvent>>;
}
