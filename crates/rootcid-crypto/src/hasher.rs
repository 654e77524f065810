use rootcid_types::Fingerprint;

/// BLAKE3 content hasher producing [`Fingerprint`]s.
///
/// No domain tag is mixed in: the fingerprint must equal the CID the content
/// store computes for the same raw block.
pub struct ContentHasher;

impl ContentHasher {
    /// Fingerprint raw bytes.
    pub fn fingerprint(data: &[u8]) -> Fingerprint {
        Fingerprint::compute(data)
    }

    /// Fingerprint large inputs incrementally.
    pub fn fingerprint_chunks<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        for chunk in chunks {
            hasher.update(chunk);
        }
        Fingerprint::from_digest(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected fingerprint.
    pub fn verify(data: &[u8], expected: &Fingerprint) -> bool {
        Self::fingerprint(data) == *expected
    }

    /// Like [`verify`](Self::verify), but reports the computed fingerprint on mismatch.
    pub fn check(data: &[u8], expected: &Fingerprint) -> Result<(), Mismatch> {
        let actual = Self::fingerprint(data);
        if actual == *expected {
            Ok(())
        } else {
            Err(Mismatch {
                expected: *expected,
                actual,
            })
        }
    }
}

/// Content did not hash to the address it was requested by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("fingerprint mismatch: expected {expected}, computed {actual}")]
pub struct Mismatch {
    pub expected: Fingerprint,
    pub actual: Fingerprint,
}
