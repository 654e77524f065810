use std::fmt;
use std::path::PathBuf;

use rootcid_crypto::CodecError;
use rootcid_ledger::LedgerError;
use rootcid_store::StoreError;
use rootcid_types::Fingerprint;
use thiserror::Error;

/// Phase of a publish in which a failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishPhase {
    /// Uploading and pinning the new document.
    Store,
    /// Setting the root pointer on the ledger.
    Commit,
}

impl fmt::Display for PublishPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

/// The boundary failure underlying a [`PublishError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl BoundaryError {
    /// Returns `true` for failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Ledger(e) => e.is_transient(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    /// A publish aborted before its commit became durable.
    ///
    /// `fingerprint` is set once the document is stored, so a caller can
    /// retry the commit with `commit_stored` without uploading again.
    #[error("publish failed in {phase} phase: {source}")]
    Failed {
        phase: PublishPhase,
        fingerprint: Option<Fingerprint>,
        #[source]
        source: BoundaryError,
    },

    #[error("document encoding failed: {0}")]
    Encode(#[from] CodecError),
}

impl PublishError {
    pub(crate) fn store(fingerprint: Option<Fingerprint>, source: StoreError) -> Self {
        Self::Failed {
            phase: PublishPhase::Store,
            fingerprint,
            source: source.into(),
        }
    }

    pub(crate) fn commit(fingerprint: Fingerprint, source: LedgerError) -> Self {
        Self::Failed {
            phase: PublishPhase::Commit,
            fingerprint: Some(fingerprint),
            source: source.into(),
        }
    }

    pub fn phase(&self) -> Option<PublishPhase> {
        match self {
            Self::Failed { phase, .. } => Some(*phase),
            Self::Encode(_) => None,
        }
    }

    /// The stored fingerprint, when the failure happened after the store phase.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::Failed { fingerprint, .. } => fingerprint.as_ref(),
            Self::Encode(_) => None,
        }
    }
}

pub type PublishResult<T> = Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("registry has never been published to")]
    RegistryUninitialized,

    /// The root pointer names content the store no longer holds.
    #[error("root pointer {fingerprint} references content that is not pinned")]
    DanglingPointer { fingerprint: Fingerprint },

    /// The store returned bytes that do not hash to the requested fingerprint.
    #[error("content for {expected} hashes to {actual}")]
    IntegrityViolation {
        expected: Fingerprint,
        actual: Fingerprint,
    },

    #[error("document {fingerprint} is malformed: {source}")]
    Malformed {
        fingerprint: Fingerprint,
        #[source]
        source: CodecError,
    },

    #[error("document {fingerprint} has no field at {pointer:?}")]
    FieldNotFound {
        fingerprint: Fingerprint,
        pointer: String,
    },
}

impl ResolveError {
    /// Consistency failures that must be surfaced to an operator, never retried.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            Self::DanglingPointer { .. } | Self::IntegrityViolation { .. }
        )
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Non-fatal failure to release a superseded document.
///
/// Reported in the publish receipt; the publish itself has already
/// committed. The superseded content simply stays pinned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to retire {fingerprint}: {source}")]
pub struct RetireFailed {
    pub fingerprint: Fingerprint,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Failure to assemble a [`Registry`](crate::Registry) from configuration.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
