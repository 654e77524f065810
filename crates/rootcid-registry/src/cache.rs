use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rootcid_crypto::ContentHasher;
use rootcid_types::Fingerprint;
use tracing::{debug, warn};

/// Local directory of verified documents, one file per fingerprint.
///
/// Entries are re-verified on every read, so a damaged file is dropped and
/// treated as a miss. I/O failures are logged and never surface as errors;
/// the cache only ever saves a round trip to the store.
#[derive(Clone, Debug)]
pub struct DocumentCache {
    dir: PathBuf,
}

impl DocumentCache {
    /// Use `dir` as the cache directory. It is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint.to_cid_string()))
    }

    /// Verified bytes for `fingerprint`, if cached.
    pub async fn load(&self, fingerprint: &Fingerprint) -> Option<Vec<u8>> {
        let path = self.path_for(fingerprint);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document cache read failed");
                return None;
            }
        };
        if let Err(mismatch) = ContentHasher::check(&bytes, fingerprint) {
            warn!(path = %path.display(), %mismatch, "discarding corrupt cache entry");
            self.evict(fingerprint).await;
            return None;
        }
        debug!(%fingerprint, "document cache hit");
        Some(bytes)
    }

    /// Record verified bytes for `fingerprint`.
    pub async fn store(&self, fingerprint: &Fingerprint, bytes: &[u8]) {
        if let Err(e) = self.write(fingerprint, bytes).await {
            warn!(dir = %self.dir.display(), error = %e, "document cache write failed");
        }
    }

    async fn write(&self, fingerprint: &Fingerprint, bytes: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(fingerprint);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await
    }

    pub async fn evict(&self, fingerprint: &Fingerprint) {
        let path = self.path_for(fingerprint);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "document cache evict failed"),
        }
    }

    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        tokio::fs::try_exists(self.path_for(fingerprint))
            .await
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path().join("docs"));
        let bytes = br#"{"x":1}"#;
        let fp = ContentHasher::fingerprint(bytes);

        assert!(cache.load(&fp).await.is_none());
        cache.store(&fp, bytes).await;
        assert!(cache.contains(&fp).await);
        assert_eq!(cache.load(&fp).await.unwrap(), bytes);
    }

    #[tokio::test]
    async fn corrupt_entry_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        let fp = ContentHasher::fingerprint(b"original");
        cache.store(&fp, b"original").await;

        std::fs::write(cache.path_for(&fp), b"tampered").unwrap();
        assert!(cache.load(&fp).await.is_none());
        assert!(!cache.contains(&fp).await);
    }

    #[tokio::test]
    async fn evict_missing_entry_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DocumentCache::new(dir.path());
        cache.evict(&ContentHasher::fingerprint(b"never")).await;
    }

    #[tokio::test]
    async fn unwritable_dir_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        // A regular file where the directory should be.
        let cache = DocumentCache::new(&blocker);
        let fp = ContentHasher::fingerprint(b"x");
        cache.store(&fp, b"x").await;
        assert!(cache.load(&fp).await.is_none());
    }
}
