use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use rootcid_crypto::{ContentHasher, DocumentCodec};
use rootcid_ledger::RootLedger;
use rootcid_store::{ContentStore, StoreError};
use rootcid_types::{CommitReceipt, Fingerprint, RootPointer};

use crate::cache::DocumentCache;
use crate::config::{RetireMode, Timeouts};
use crate::deadline;
use crate::error::{PublishError, PublishResult, RetireFailed};

// ---------------------------------------------------------------------------
// PublishReceipt
// ---------------------------------------------------------------------------

/// What happened to the superseded document after a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Retirement {
    /// There was no previous document, or it is the one just published.
    NotNeeded,
    /// The previous document was unpinned.
    Retired(Fingerprint),
    /// Unpinning failed; the previous document stays pinned.
    Failed(RetireFailed),
    /// Unpinning was handed to a background task.
    Dispatched(Fingerprint),
}

impl Retirement {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Retirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNeeded => write!(f, "nothing to retire"),
            Self::Retired(fp) => write!(f, "retired {fp}"),
            Self::Failed(failed) => write!(f, "{failed}"),
            Self::Dispatched(fp) => write!(f, "retiring {fp} in background"),
        }
    }
}

/// Result of a successful publish.
#[derive(Clone, Debug)]
pub struct PublishReceipt {
    /// Fingerprint of the published document; the root pointer now names it.
    pub fingerprint: Fingerprint,
    /// Root pointer observed before the commit.
    pub previous: RootPointer,
    /// `None` when the pointer already named this document and no commit was issued.
    pub commit: Option<CommitReceipt>,
    pub retirement: Retirement,
}

impl PublishReceipt {
    pub fn committed(&self) -> bool {
        self.commit.is_some()
    }
}

// ---------------------------------------------------------------------------
// PublishCoordinator
// ---------------------------------------------------------------------------

/// Drives a publish through `START -> STORED -> COMMITTED -> RETIRED`.
///
/// The new document is pinned before the pointer moves, and the superseded
/// document is unpinned only after the commit is durable, so the pointer
/// never names content the store has released. Nothing is retried here;
/// every failure carries enough state for the caller to resume.
pub struct PublishCoordinator {
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn RootLedger>,
    timeouts: Timeouts,
    retire_mode: RetireMode,
    cache: Option<DocumentCache>,
}

impl PublishCoordinator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn RootLedger>,
        timeouts: Timeouts,
        retire_mode: RetireMode,
    ) -> Self {
        Self {
            store,
            ledger,
            timeouts,
            retire_mode,
            cache: None,
        }
    }

    /// Seed `cache` with every stored document.
    pub fn with_cache(mut self, cache: DocumentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Publish a JSON document.
    pub async fn publish(&self, document: &Value) -> PublishResult<PublishReceipt> {
        let bytes = DocumentCodec::encode(document)?;
        self.publish_bytes(&bytes).await
    }

    /// Publish already-encoded document bytes.
    pub async fn publish_bytes(&self, bytes: &[u8]) -> PublishResult<PublishReceipt> {
        let expected = ContentHasher::fingerprint(bytes);
        let fingerprint = deadline::store(self.timeouts.store, "put", self.store.put(bytes))
            .await
            .map_err(|e| {
                warn!(error = %e, phase = "store", "publish aborted");
                PublishError::store(None, e)
            })?;
        if fingerprint != expected {
            let e = StoreError::rejected(format!(
                "store returned {fingerprint} for content hashing to {expected}"
            ));
            warn!(error = %e, phase = "store", "publish aborted");
            return Err(PublishError::store(None, e));
        }
        info!(%fingerprint, bytes = bytes.len(), store = self.store.name(), "document stored");

        if let Some(cache) = &self.cache {
            cache.store(&fingerprint, bytes).await;
        }
        self.commit(fingerprint).await
    }

    /// Resume a publish from `STORED`: commit an already pinned fingerprint.
    pub async fn commit_stored(&self, fingerprint: Fingerprint) -> PublishResult<PublishReceipt> {
        let pinned = deadline::store(
            self.timeouts.store,
            "is_pinned",
            self.store.is_pinned(&fingerprint),
        )
        .await
        .map_err(|e| PublishError::store(Some(fingerprint), e))?;
        if !pinned {
            return Err(PublishError::store(
                Some(fingerprint),
                StoreError::NotFound(fingerprint),
            ));
        }
        self.commit(fingerprint).await
    }

    async fn commit(&self, fingerprint: Fingerprint) -> PublishResult<PublishReceipt> {
        let previous = match deadline::ledger(
            self.timeouts.ledger,
            "read_current",
            self.ledger.read_current(),
        )
        .await
        {
            Ok(previous) => previous,
            Err(e) => {
                warn!(error = %e, "could not read current root; nothing will be retired");
                RootPointer::Unset
            }
        };

        if previous.points_to(&fingerprint) {
            info!(%fingerprint, "root pointer already up to date");
            return Ok(PublishReceipt {
                fingerprint,
                previous,
                commit: None,
                retirement: Retirement::NotNeeded,
            });
        }

        let commit = deadline::ledger(
            self.timeouts.commit(),
            "set_current",
            self.ledger.set_current(&fingerprint),
        )
        .await
        .map_err(|e| {
            warn!(
                %fingerprint,
                error = %e,
                phase = "commit",
                "publish aborted; document stays pinned"
            );
            PublishError::commit(fingerprint, e)
        })?;
        info!(
            %fingerprint,
            block = commit.block,
            tx = %commit.transaction,
            ledger = self.ledger.name(),
            "root pointer committed"
        );

        let retirement = match previous.fingerprint() {
            Some(old) if *old != fingerprint => self.retire(*old).await,
            _ => Retirement::NotNeeded,
        };

        Ok(PublishReceipt {
            fingerprint,
            previous,
            commit: Some(commit),
            retirement,
        })
    }

    async fn retire(&self, old: Fingerprint) -> Retirement {
        match self.retire_mode {
            RetireMode::Inline => {
                match retire(self.store.as_ref(), self.cache.as_ref(), self.timeouts.store, old)
                    .await
                {
                    Ok(()) => Retirement::Retired(old),
                    Err(failed) => Retirement::Failed(failed),
                }
            }
            RetireMode::Background => {
                let store = Arc::clone(&self.store);
                let cache = self.cache.clone();
                let limit = self.timeouts.store;
                tokio::spawn(async move {
                    // Outcome is logged inside.
                    let _ = retire(store.as_ref(), cache.as_ref(), limit, old).await;
                });
                Retirement::Dispatched(old)
            }
        }
    }
}

async fn retire(
    store: &dyn ContentStore,
    cache: Option<&DocumentCache>,
    limit: Duration,
    old: Fingerprint,
) -> Result<(), RetireFailed> {
    match deadline::store(limit, "unpin", store.unpin(&old)).await {
        Ok(()) => {
            if let Some(cache) = cache {
                cache.evict(&old).await;
            }
            info!(fingerprint = %old, "superseded document retired");
            Ok(())
        }
        Err(source) => {
            let failed = RetireFailed {
                fingerprint: old,
                source,
            };
            warn!(error = %failed, "superseded document stays pinned");
            Err(failed)
        }
    }
}
