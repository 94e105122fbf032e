use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised when decoding model values from their stored form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown legal basis '{0}'")]
    UnknownLegalBasis(String),
}

/// Lawful basis for processing personal data (GDPR Art. 6(1)).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalBasis {
    Consent,
    Contract,
    LegalObligation,
    VitalInterests,
    PublicTask,
    LegitimateInterests,
}

impl LegalBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalBasis::Consent => "consent",
            LegalBasis::Contract => "contract",
            LegalBasis::LegalObligation => "legal_obligation",
            LegalBasis::VitalInterests => "vital_interests",
            LegalBasis::PublicTask => "public_task",
            LegalBasis::LegitimateInterests => "legitimate_interests",
        }
    }

    /// Encode a set of bases as a comma separated list, the stored form.
    pub fn encode_set(bases: &BTreeSet<LegalBasis>) -> String {
        bases
            .iter()
            .map(LegalBasis::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Decode the stored form written by [`LegalBasis::encode_set`].
    pub fn decode_set(encoded: &str) -> Result<BTreeSet<LegalBasis>, ModelError> {
        encoded
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(LegalBasis::from_str)
            .collect()
    }
}

impl FromStr for LegalBasis {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consent" => Ok(LegalBasis::Consent),
            "contract" => Ok(LegalBasis::Contract),
            "legal_obligation" => Ok(LegalBasis::LegalObligation),
            "vital_interests" => Ok(LegalBasis::VitalInterests),
            "public_task" => Ok(LegalBasis::PublicTask),
            "legitimate_interests" => Ok(LegalBasis::LegitimateInterests),
            other => Err(ModelError::UnknownLegalBasis(other.to_string())),
        }
    }
}

impl fmt::Display for LegalBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A legally justified reason for processing a category of personal data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purpose {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub legal_bases: BTreeSet<LegalBasis>,
    /// Storage policies applying retention rules on behalf of this purpose.
    #[serde(default)]
    pub storage_policies: BTreeSet<String>,
    /// Vacuuming policies allowed to trigger enforcement for this purpose.
    #[serde(default)]
    pub vacuuming_policies: BTreeSet<String>,
}

impl Purpose {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            legal_bases: BTreeSet::new(),
            storage_policies: BTreeSet::new(),
            vacuuming_policies: BTreeSet::new(),
        }
    }

    pub fn with_legal_basis(mut self, basis: LegalBasis) -> Self {
        self.legal_bases.insert(basis);
        self
    }

    pub fn with_storage_policy(mut self, storage_policy_id: impl Into<String>) -> Self {
        self.storage_policies.insert(storage_policy_id.into());
        self
    }

    pub fn with_vacuuming_policy(mut self, vacuuming_policy_id: impl Into<String>) -> Self {
        self.vacuuming_policies.insert(vacuuming_policy_id.into());
        self
    }
}
