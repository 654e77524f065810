use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::fingerprint::Fingerprint;

/// Value of the ledger's root slot.
///
/// The ledger stores the textual fingerprint; the empty string means the
/// registry has never been published to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "fingerprint", rename_all = "snake_case")]
pub enum RootPointer {
    /// Nothing has been published yet.
    #[default]
    Unset,
    /// The fingerprint of the current document.
    Set(Fingerprint),
}

impl RootPointer {
    /// Decode the raw slot value stored on the ledger.
    pub fn from_slot(value: &str) -> Result<Self, TypeError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::Unset);
        }
        Fingerprint::parse(trimmed).map(Self::Set)
    }

    /// Encode as the raw slot value.
    pub fn to_slot(&self) -> String {
        match self {
            Self::Unset => String::new(),
            Self::Set(fp) => fp.to_cid_string(),
        }
    }

    /// The referenced fingerprint, if set.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::Unset => None,
            Self::Set(fp) => Some(fp),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    /// Returns `true` if the pointer currently names `fp`.
    pub fn points_to(&self, fp: &Fingerprint) -> bool {
        self.fingerprint() == Some(fp)
    }
}

impl From<Fingerprint> for RootPointer {
    fn from(fp: Fingerprint) -> Self {
        Self::Set(fp)
    }
}

impl From<Option<Fingerprint>> for RootPointer {
    fn from(fp: Option<Fingerprint>) -> Self {
        fp.map_or(Self::Unset, Self::Set)
    }
}

impl fmt::Display for RootPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "<unset>"),
            Self::Set(fp) => write!(f, "{fp}"),
        }
    }
}
