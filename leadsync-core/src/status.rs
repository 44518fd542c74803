//! Canonical lead status and the normalizer that maps free-form strings onto it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The four statuses both stores agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CanonicalStatus {
    #[default]
    New,
    Contacted,
    Qualified,
    Lost,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 4] = [
        CanonicalStatus::New,
        CanonicalStatus::Contacted,
        CanonicalStatus::Qualified,
        CanonicalStatus::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalStatus::New => "NEW",
            CanonicalStatus::Contacted => "CONTACTED",
            CanonicalStatus::Qualified => "QUALIFIED",
            CanonicalStatus::Lost => "LOST",
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a non-empty status that matches no synonym.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownStatusPolicy {
    /// Treat it as [`CanonicalStatus::New`].
    #[default]
    DefaultToNew,
    /// Refuse it; the engine skips the record.
    Reject,
}

impl FromStr for UnknownStatusPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "default-to-new" | "default" | "new" => Ok(Self::DefaultToNew),
            "reject" | "strict" => Ok(Self::Reject),
            _ => Err(CoreError::InvalidValue {
                field: "unknown_status",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for UnknownStatusPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownStatusPolicy::DefaultToNew => f.write_str("default-to-new"),
            UnknownStatusPolicy::Reject => f.write_str("reject"),
        }
    }
}

const SYNONYMS: &[(&str, CanonicalStatus)] = &[
    ("new", CanonicalStatus::New),
    ("todo", CanonicalStatus::New),
    ("to_do", CanonicalStatus::New),
    ("pending", CanonicalStatus::New),
    ("contacted", CanonicalStatus::Contacted),
    ("in_progress", CanonicalStatus::Contacted),
    ("inprogress", CanonicalStatus::Contacted),
    ("working", CanonicalStatus::Contacted),
    ("active", CanonicalStatus::Contacted),
    ("reach_out", CanonicalStatus::Contacted),
    ("qualified", CanonicalStatus::Qualified),
    ("done", CanonicalStatus::Qualified),
    ("complete", CanonicalStatus::Qualified),
    ("completed", CanonicalStatus::Qualified),
    ("finished", CanonicalStatus::Qualified),
    ("won", CanonicalStatus::Qualified),
    ("success", CanonicalStatus::Qualified),
    ("lost", CanonicalStatus::Lost),
    ("rejected", CanonicalStatus::Lost),
    ("cancelled", CanonicalStatus::Lost),
    ("canceled", CanonicalStatus::Lost),
    ("closed_lost", CanonicalStatus::Lost),
    ("dead", CanonicalStatus::Lost),
];

/// Look a raw status up in the synonym table.
///
/// Matching is case-insensitive, ignores surrounding whitespace and treats
/// spaces and hyphens as underscores. Empty input is a fresh lead and yields
/// `Some(New)`; a non-empty miss yields `None`.
pub fn lookup(raw: &str) -> Option<CanonicalStatus> {
    let key = raw.trim().to_lowercase().replace([' ', '-'], "_");
    if key.is_empty() {
        return Some(CanonicalStatus::New);
    }
    SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == key)
        .map(|(_, status)| *status)
}

/// Total normalization: anything unrecognized becomes [`CanonicalStatus::New`].
pub fn normalize(raw: &str) -> CanonicalStatus {
    lookup(raw).unwrap_or(CanonicalStatus::New)
}

/// Normalizer bound to an [`UnknownStatusPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusNormalizer {
    policy: UnknownStatusPolicy,
}

impl StatusNormalizer {
    pub fn new(policy: UnknownStatusPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownStatusPolicy {
        self.policy
    }

    /// Always succeeds; see [`normalize`].
    pub fn normalize(&self, raw: &str) -> CanonicalStatus {
        normalize(raw)
    }

    /// Normalize under the configured policy.
    pub fn try_normalize(&self, raw: &str) -> Result<CanonicalStatus, CoreError> {
        match (lookup(raw), self.policy) {
            (Some(status), _) => Ok(status),
            (None, UnknownStatusPolicy::DefaultToNew) => {
                tracing::debug!("unrecognized status '{}' defaulted to NEW", raw.trim());
                Ok(CanonicalStatus::New)
            }
            (None, UnknownStatusPolicy::Reject) => {
                Err(CoreError::UnrecognizedStatus(raw.trim().to_string()))
            }
        }
    }
}
