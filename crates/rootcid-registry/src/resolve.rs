use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info};

use rootcid_crypto::{ContentHasher, DocumentCodec};
use rootcid_ledger::RootLedger;
use rootcid_store::{ContentStore, StoreError};
use rootcid_types::{Fingerprint, RootPointer};

use crate::cache::DocumentCache;
use crate::config::Timeouts;
use crate::deadline;
use crate::error::{ResolveError, ResolveResult};

/// The current document together with the fingerprint it was resolved from.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolved {
    pub fingerprint: Fingerprint,
    pub document: Value,
}

/// Reads the root pointer and fetches the verified document it names.
///
/// Consistency failures (`DanglingPointer`, `IntegrityViolation`) are logged
/// at error level and returned; they are never retried.
pub struct ResolveCoordinator {
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn RootLedger>,
    timeouts: Timeouts,
    cache: Option<DocumentCache>,
}

impl ResolveCoordinator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn RootLedger>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            store,
            ledger,
            timeouts,
            cache: None,
        }
    }

    /// Serve verified documents from `cache` before asking the store.
    ///
    /// A cache hit skips the store entirely, so an external unpin of the
    /// current fingerprint is not reported as [`ResolveError::DanglingPointer`].
    pub fn with_cache(mut self, cache: DocumentCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The fingerprint the root pointer currently names.
    pub async fn current(&self) -> ResolveResult<Fingerprint> {
        let pointer = deadline::ledger(
            self.timeouts.ledger,
            "read_current",
            self.ledger.read_current(),
        )
        .await?;
        match pointer {
            RootPointer::Unset => Err(ResolveError::RegistryUninitialized),
            RootPointer::Set(fingerprint) => Ok(fingerprint),
        }
    }

    /// Resolve the current document.
    pub async fn resolve(&self) -> ResolveResult<Resolved> {
        let (fingerprint, bytes) = self.resolve_bytes().await?;
        let document = DocumentCodec::decode(&bytes)
            .map_err(|source| ResolveError::Malformed { fingerprint, source })?;
        info!(%fingerprint, "document resolved");
        Ok(Resolved {
            fingerprint,
            document,
        })
    }

    /// Resolve the current document into a typed value.
    pub async fn resolve_as<T: DeserializeOwned>(&self) -> ResolveResult<(Fingerprint, T)> {
        let (fingerprint, bytes) = self.resolve_bytes().await?;
        let value = DocumentCodec::decode_typed(&bytes)
            .map_err(|source| ResolveError::Malformed { fingerprint, source })?;
        Ok((fingerprint, value))
    }

    /// One section of the current document, addressed by JSON pointer (`/servers/0`).
    pub async fn resolve_field(&self, pointer: &str) -> ResolveResult<Value> {
        let Resolved {
            fingerprint,
            mut document,
        } = self.resolve().await?;
        document
            .pointer_mut(pointer)
            .map(Value::take)
            .ok_or_else(|| ResolveError::FieldNotFound {
                fingerprint,
                pointer: pointer.to_string(),
            })
    }

    /// Verified bytes of the current document.
    pub async fn resolve_bytes(&self) -> ResolveResult<(Fingerprint, Vec<u8>)> {
        let fingerprint = self.current().await?;
        let bytes = self.fetch(&fingerprint).await?;
        Ok((fingerprint, bytes))
    }

    async fn fetch(&self, fingerprint: &Fingerprint) -> ResolveResult<Vec<u8>> {
        if let Some(bytes) = self.cached(fingerprint).await {
            return Ok(bytes);
        }

        let bytes = deadline::store(self.timeouts.store, "get", self.store.get(fingerprint))
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => {
                    error!(%fingerprint, store = self.store.name(), "root pointer is dangling");
                    ResolveError::DanglingPointer {
                        fingerprint: *fingerprint,
                    }
                }
                other => ResolveError::Store(other),
            })?;

        let actual = ContentHasher::fingerprint(&bytes);
        if actual != *fingerprint {
            error!(
                expected = %fingerprint,
                %actual,
                store = self.store.name(),
                "store returned wrong content"
            );
            return Err(ResolveError::IntegrityViolation {
                expected: *fingerprint,
                actual,
            });
        }

        if let Some(cache) = &self.cache {
            cache.store(fingerprint, &bytes).await;
        }
        Ok(bytes)
    }

    async fn cached(&self, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
        let bytes = self.cache.as_ref()?.load(fingerprint).await?;
        debug!(%fingerprint, "resolved from cache");
        Some(bytes)
    }
}
