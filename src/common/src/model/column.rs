use super::purpose::LegalBasis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Composite key of a personal-data column.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnKey {
    pub table: String,
    pub column: String,
}

impl ColumnKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// A column known to hold personal data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalDataColumn {
    pub key: ColumnKey,
    /// Value written over the stored data when retention is enforced.
    pub default_value: String,
    #[serde(default)]
    pub purposes: BTreeSet<String>,
    #[serde(default)]
    pub legal_bases: BTreeSet<LegalBasis>,
}

impl PersonalDataColumn {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        default_value: impl Into<String>,
    ) -> Self {
        Self {
            key: ColumnKey::new(table, column),
            default_value: default_value.into(),
            purposes: BTreeSet::new(),
            legal_bases: BTreeSet::new(),
        }
    }

    pub fn with_purpose(mut self, purpose_id: impl Into<String>) -> Self {
        self.purposes.insert(purpose_id.into());
        self
    }

    pub fn with_legal_basis(mut self, basis: LegalBasis) -> Self {
        self.legal_bases.insert(basis);
        self
    }
}
