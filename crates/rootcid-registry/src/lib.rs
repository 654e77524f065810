//! Root-anchored document registry.
//!
//! A registry holds one current JSON document. Its bytes live in a
//! content-addressed store; the ledger's root slot names the fingerprint of
//! the current version. This crate coordinates the two:
//!
//! - [`PublishCoordinator`] stores a document, moves the root pointer, then
//!   retires the superseded version
//! - [`ResolveCoordinator`] reads the root pointer and returns the verified document
//! - [`Registry`] wires both to a [`RegistryConfig`] and adds status and watching
//!
//! # Ordering Rules
//!
//! 1. Content is pinned before the pointer names it.
//! 2. The superseded document is unpinned only after the new pointer is durable.
//! 3. The new document is never unpinned by a publish.
//! 4. Every network call has a deadline; expiry is reported as unavailability
//!    and nothing is retried internally.

pub mod cache;
pub mod config;
mod deadline;
pub mod error;
pub mod publish;
pub mod registry;
pub mod resolve;
pub mod watcher;

pub use cache::DocumentCache;
pub use config::{LedgerConfig, RegistryConfig, RetireMode, StoreConfig, Timeouts};
pub use error::{
    BoundaryError, ConfigError, ConfigResult, PublishError, PublishPhase, PublishResult,
    RegistryError, RegistryResult, ResolveError, ResolveResult, RetireFailed,
};
pub use publish::{PublishCoordinator, PublishReceipt, Retirement};
pub use registry::{Registry, RegistryStatus};
pub use resolve::{ResolveCoordinator, Resolved};
pub use watcher::RootWatcher;

pub use rootcid_types::{CommitReceipt, Fingerprint, RootEvent, RootPointer};
