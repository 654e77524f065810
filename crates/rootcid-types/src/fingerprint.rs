use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// CIDv1 header: version 1, multicodec `raw`, multihash `blake3`, 32-byte digest.
const CID_HEADER: [u8; 4] = [0x01, 0x55, 0x1e, 0x20];

/// Content fingerprint of a stored document.
///
/// A `Fingerprint` is the BLAKE3 digest of the stored bytes, rendered as a
/// CIDv1 (`raw` codec, `blake3` multihash) in base16 multibase. Identical
/// bytes always produce the same fingerprint, so it can be recomputed from
/// fetched content and compared against the address it was fetched by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of raw bytes.
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create a fingerprint from a pre-computed BLAKE3 digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    /// The raw 32-byte digest.
    pub fn digest(&self) -> &[u8; 32] {
        &self.0
    }

    /// Binary CID: header followed by the digest.
    pub fn to_cid_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(CID_HEADER.len() + 32);
        bytes.extend_from_slice(&CID_HEADER);
        bytes.extend_from_slice(&self.0);
        bytes
    }

    /// Canonical textual CID (`f01551e20` + 64 hex chars).
    pub fn to_cid_string(&self) -> String {
        format!("f{}", hex::encode(self.to_cid_bytes()))
    }

    /// Short hex representation of the digest (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse a textual CID in base16 multibase form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let unsupported = |reason: &str| TypeError::UnsupportedCid {
            cid: s.to_string(),
            reason: reason.to_string(),
        };

        let body = s
            .strip_prefix('f')
            .or_else(|| s.strip_prefix('F'))
            .ok_or_else(|| unsupported("expected base16 multibase prefix 'f'"))?;
        let bytes = hex::decode(body).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != CID_HEADER.len() + 32 {
            return Err(TypeError::InvalidLength {
                expected: CID_HEADER.len() + 32,
                actual: bytes.len(),
            });
        }
        if bytes[..CID_HEADER.len()] != CID_HEADER {
            return Err(unsupported("expected CIDv1 raw/blake3-256"));
        }

        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[CID_HEADER.len()..]);
        Ok(Self(digest))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_cid_string())
    }
}

impl FromStr for Fingerprint {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.to_cid_string()
    }
}
