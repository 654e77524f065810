/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Transport failure, timeout, or a write that was never confirmed.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Ledger-side validation refused the transition, or the slot holds a malformed value.
    #[error("ledger rejected transition: {0}")]
    Rejected(String),
}

impl LedgerError {
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

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
