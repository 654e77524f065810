use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use rootcid_crypto::DocumentCodec;
use rootcid_ledger::{RegistryContract, RootLedger};
use rootcid_store::{ContentStore, KuboContentStore};
use rootcid_types::{Fingerprint, RootPointer};

use crate::cache::DocumentCache;
use crate::config::RegistryConfig;
use crate::deadline;
use crate::error::{PublishResult, RegistryResult, ResolveError, ResolveResult};
use crate::publish::{PublishCoordinator, PublishReceipt};
use crate::resolve::{ResolveCoordinator, Resolved};
use crate::watcher::RootWatcher;

/// Snapshot of the registry's root pointer and the state of its content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryStatus {
    pub pointer: RootPointer,
    /// Whether the store holds the current document; `None` when unset.
    pub pinned: Option<bool>,
    pub store: &'static str,
    pub ledger: &'static str,
}

impl RegistryStatus {
    /// The pointer is set but its content is gone.
    pub fn is_dangling(&self) -> bool {
        self.pinned == Some(false)
    }
}

/// A root-anchored JSON document registry.
///
/// Owns one content store and one ledger, shared by a publish and a
/// resolve coordinator built from the same configuration.
pub struct Registry {
    config: RegistryConfig,
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn RootLedger>,
    publisher: PublishCoordinator,
    resolver: ResolveCoordinator,
}

impl Registry {
    /// Assemble a registry over explicit backends.
    pub fn new(
        config: RegistryConfig,
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn RootLedger>,
    ) -> Self {
        let mut publisher =
            PublishCoordinator::new(store.clone(), ledger.clone(), config.timeouts, config.retire);
        let mut resolver = ResolveCoordinator::new(store.clone(), ledger.clone(), config.timeouts);
        if let Some(dir) = &config.cache_dir {
            let cache = DocumentCache::new(dir);
            publisher = publisher.with_cache(cache.clone());
            resolver = resolver.with_cache(cache);
        }
        Self {
            config,
            store,
            ledger,
            publisher,
            resolver,
        }
    }

    /// Validate `config` and connect to the Kubo node and `Registry` contract it names.
    pub fn connect(config: RegistryConfig) -> RegistryResult<Self> {
        config.validate()?;
        let store = KuboContentStore::new(config.kubo_config())?;
        let contract = RegistryContract::new(config.contract_config()?)?;
        info!(
            store = %config.store.api_url,
            ledger = %config.ledger.rpc_url,
            contract = %contract.config().contract_address,
            "registry connected"
        );
        Ok(Self::new(config, Arc::new(store), Arc::new(contract)))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn publisher(&self) -> &PublishCoordinator {
        &self.publisher
    }

    pub fn resolver(&self) -> &ResolveCoordinator {
        &self.resolver
    }

    pub async fn publish(&self, document: &Value) -> PublishResult<PublishReceipt> {
        self.publisher.publish(document).await
    }

    pub async fn publish_as<T: Serialize>(&self, value: &T) -> PublishResult<PublishReceipt> {
        let bytes = DocumentCodec::encode_typed(value)?;
        self.publisher.publish_bytes(&bytes).await
    }

    pub async fn commit_stored(&self, fingerprint: Fingerprint) -> PublishResult<PublishReceipt> {
        self.publisher.commit_stored(fingerprint).await
    }

    pub async fn resolve(&self) -> ResolveResult<Resolved> {
        self.resolver.resolve().await
    }

    pub async fn resolve_as<T: DeserializeOwned>(&self) -> ResolveResult<(Fingerprint, T)> {
        self.resolver.resolve_as().await
    }

    pub async fn resolve_field(&self, pointer: &str) -> ResolveResult<Value> {
        self.resolver.resolve_field(pointer).await
    }

    pub async fn status(&self) -> ResolveResult<RegistryStatus> {
        let pointer = deadline::ledger(
            self.config.timeouts.ledger,
            "read_current",
            self.ledger.read_current(),
        )
        .await?;
        let pinned = match pointer.fingerprint() {
            Some(fp) => Some(
                deadline::store(self.config.timeouts.store, "is_pinned", self.store.is_pinned(fp))
                    .await
                    .map_err(ResolveError::Store)?,
            ),
            None => None,
        };
        Ok(RegistryStatus {
            pointer,
            pinned,
            store: self.store.name(),
            ledger: self.ledger.name(),
        })
    }

    /// Stream root pointer changes recorded at or after `from_block`.
    pub fn watch(&self, from_block: u64) -> RootWatcher {
        RootWatcher::spawn(
            self.ledger.clone(),
            from_block,
            self.config.timeouts.poll_interval,
            self.config.timeouts.ledger,
        )
    }
}
