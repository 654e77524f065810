use rootcid_types::Fingerprint;

/// Errors from content store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Transport or connection failure, timeout, or unexpected status.
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the input as malformed or unacceptable.
    #[error("content store rejected input: {0}")]
    Rejected(String),

    /// The fingerprint is not pinned or not present.
    #[error("content not found: {0}")]
    NotFound(Fingerprint),
}

impl StoreError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Returns `true` for failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
