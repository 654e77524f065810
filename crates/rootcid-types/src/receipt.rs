use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// Durable confirmation that the root pointer was set.
///
/// A receipt is only produced once the ledger has recorded the transition,
/// never on mere submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// The fingerprint the pointer now names.
    pub fingerprint: Fingerprint,
    /// Ledger-side transaction identifier (hex for on-chain ledgers).
    pub transaction: String,
    /// Ledger height at which the transition was recorded.
    pub block: u64,
    /// Whether the set event was found in the transaction's logs.
    pub event_observed: bool,
    /// Wall-clock time at which the confirmation was observed.
    pub confirmed_at: DateTime<Utc>,
}

impl CommitReceipt {
    pub fn new(fingerprint: Fingerprint, transaction: impl Into<String>, block: u64) -> Self {
        Self {
            fingerprint,
            transaction: transaction.into(),
            block,
            event_observed: false,
            confirmed_at: Utc::now(),
        }
    }

    /// Mark the receipt as backed by an emitted set event.
    pub fn with_event(mut self) -> Self {
        self.event_observed = true;
        self
    }
}

impl fmt::Display for CommitReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ block {} ({})",
            self.fingerprint.short_hex(),
            self.block,
            self.transaction
        )
    }
}

/// Event emitted by the ledger when the root pointer changes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootEvent {
    /// The newly recorded fingerprint.
    pub fingerprint: Fingerprint,
    /// Ledger height of the transition.
    pub block: u64,
    /// Transaction that emitted the event.
    pub transaction: String,
}

impl fmt::Display for RootEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.block, self.fingerprint)
    }
}
