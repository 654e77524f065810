//! Content store client for rootcid.
//!
//! Documents are stored by content: `put` returns the [`Fingerprint`] of the
//! stored bytes and pins them in the same call, `get` fetches bytes by
//! fingerprint, and `unpin` releases the retention request. The store, not
//! the caller, decides when unpinned bytes are physically reclaimed.
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store with fault injection for tests
//! - [`KuboContentStore`] -- IPFS Kubo RPC API (`add`, `cat`, `pin/rm`) over HTTP
//!
//! # Design Rules
//!
//! 1. `put` pins as part of the same call; there is no separate pin step.
//! 2. `put` is idempotent by content: storing the same bytes twice yields the same fingerprint.
//! 3. `unpin` of an unknown or already-unpinned fingerprint is not an error.
//! 4. Transport failures surface as [`StoreError::Unavailable`]; the client never retries.
//!
//! [`Fingerprint`]: rootcid_types::Fingerprint

pub mod error;
pub mod kubo;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use kubo::{KuboConfig, KuboContentStore};
pub use memory::{InMemoryContentStore, StoreOp};
pub use traits::ContentStore;
