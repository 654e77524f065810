//! Foundation types for rootcid.
//!
//! rootcid anchors a mutable JSON document on an append-only ledger: the
//! document bytes live in a content-addressed store, and the ledger holds a
//! single pointer naming the fingerprint of the current document. Every other
//! rootcid crate depends on `rootcid-types`.
//!
//! # Key Types
//!
//! - [`Fingerprint`] -- Content identifier (CIDv1, raw codec, BLAKE3 multihash)
//! - [`RootPointer`] -- The ledger slot value: unset, or a fingerprint
//! - [`CommitReceipt`] -- Durable confirmation of a pointer transition
//! - [`RootEvent`] -- Notification emitted by the ledger on every successful set

pub mod duration;
pub mod error;
pub mod fingerprint;
pub mod pointer;
pub mod receipt;

pub use error::TypeError;
pub use fingerprint::Fingerprint;
pub use pointer::RootPointer;
pub use receipt::{CommitReceipt, RootEvent};
