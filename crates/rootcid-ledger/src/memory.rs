use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use rootcid_types::{CommitReceipt, Fingerprint, RootEvent, RootPointer};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::RootLedger;

/// In-memory root pointer ledger for tests, local demos, and embedding.
///
/// Transitions are appended to a log that is never rewritten; the current
/// pointer is the last entry. Every successful set is also broadcast to
/// subscribers.
pub struct InMemoryRootLedger {
    log: RwLock<Vec<RootEvent>>,
    events: broadcast::Sender<RootEvent>,
    available: AtomicBool,
    reject_next: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl InMemoryRootLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            log: RwLock::new(Vec::new()),
            events,
            available: AtomicBool::new(true),
            reject_next: AtomicBool::new(false),
            latency: RwLock::new(None),
        }
    }

    /// Take the ledger offline (`false`) or bring it back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `set_current` fail ledger-side validation.
    pub fn reject_next(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Subscribe to set events.
    pub fn subscribe(&self) -> broadcast::Receiver<RootEvent> {
        self.events.subscribe()
    }

    /// The full append-only transition log.
    pub fn history(&self) -> Vec<RootEvent> {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded transitions.
    pub fn height(&self) -> u64 {
        self.log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len() as u64
    }

    async fn enter(&self) -> LedgerResult<()> {
        let latency = *self.latency.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(LedgerError::unavailable("ledger is offline"));
        }
        Ok(())
    }
}

impl Default for InMemoryRootLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Transaction id for a transition: BLAKE3 over the height and new value.
fn transaction_id(block: u64, fingerprint: &Fingerprint) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"rootcid-memory-ledger-v1:");
    hasher.update(&block.to_be_bytes());
    hasher.update(fingerprint.digest());
    format!("0x{}", hex::encode(hasher.finalize().as_bytes()))
}

#[async_trait]
impl RootLedger for InMemoryRootLedger {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read_current(&self) -> LedgerResult<RootPointer> {
        self.enter().await?;
        let log = self
            .log
            .read()
            .map_err(|e| LedgerError::unavailable(format!("lock poisoned: {e}")))?;
        Ok(log.last().map(|e| e.fingerprint).into())
    }

    async fn set_current(&self, fingerprint: &Fingerprint) -> LedgerResult<CommitReceipt> {
        self.enter().await?;
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::rejected("transition refused by ledger validation"));
        }

        let event = {
            let mut log = self
                .log
                .write()
                .map_err(|e| LedgerError::unavailable(format!("lock poisoned: {e}")))?;
            let block = log.len() as u64 + 1;
            let event = RootEvent {
                fingerprint: *fingerprint,
                block,
                transaction: transaction_id(block, fingerprint),
            };
            log.push(event.clone());
            event
        };

        debug!(block = event.block, %fingerprint, "root pointer set");
        // No subscribers is fine.
        let _ = self.events.send(event.clone());
        Ok(CommitReceipt::new(event.fingerprint, event.transaction, event.block).with_event())
    }

    async fn events_since(&self, from_block: u64) -> LedgerResult<Vec<RootEvent>> {
        self.enter().await?;
        let log = self
            .log
            .read()
            .map_err(|e| LedgerError::unavailable(format!("lock poisoned: {e}")))?;
        Ok(log
            .iter()
            .filter(|e| e.block >= from_block)
            .cloned()
            .collect())
    }
}

impl std::fmt::Debug for InMemoryRootLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRootLedger")
            .field("height", &self.height())
            .finish()
    }
}
