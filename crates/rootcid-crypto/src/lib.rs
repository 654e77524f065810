//! Content hashing and document encoding for rootcid.
//!
//! Provides BLAKE3 fingerprinting with verification, and a deterministic
//! JSON encoding so that equal documents always map to equal fingerprints.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod codec;
pub mod hasher;

pub use codec::{CodecError, DocumentCodec};
pub use hasher::{ContentHasher, Mismatch};
