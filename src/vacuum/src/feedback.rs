//! Non-fatal diagnostics describing broken links in the bookkeeping data.
//!
//! Feedback never stops a pass. Everything unaffected by the broken link is
//! still resolved and executed.

use common::model::ColumnKey;
use serde::Serialize;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feedback {
    /// Storage policy has no personal-data column.
    MissingColumn { storage_policy: String },
    /// Storage policy names a column that is not registered.
    UnknownColumn {
        storage_policy: String,
        column: ColumnKey,
    },
    /// Purpose has no storage policies.
    MissingStoragePolicy { purpose: String },
    /// Purpose links a storage policy that does not exist.
    UnknownStoragePolicy {
        purpose: String,
        storage_policy: String,
    },
    /// Vacuuming policy has no purposes.
    MissingPurpose { vacuuming_policy: String },
    /// Vacuuming policy links a purpose that does not exist.
    UnknownPurpose {
        vacuuming_policy: String,
        purpose: String,
    },
    /// A vacuuming policy was requested by name but does not exist.
    UnknownVacuumingPolicy { name: String },
}

impl Feedback {
    pub fn log(&self) {
        warn!(feedback = %self, "Vacuuming feedback");
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::MissingColumn { storage_policy } => write!(
                f,
                "storage policy '{storage_policy}' has no personal data column and is ignored"
            ),
            Feedback::UnknownColumn {
                storage_policy,
                column,
            } => write!(
                f,
                "storage policy '{storage_policy}' references unknown column '{column}' and is ignored"
            ),
            Feedback::MissingStoragePolicy { purpose } => {
                write!(f, "purpose '{purpose}' has no storage policy")
            }
            Feedback::UnknownStoragePolicy {
                purpose,
                storage_policy,
            } => write!(
                f,
                "purpose '{purpose}' references unknown storage policy '{storage_policy}'"
            ),
            Feedback::MissingPurpose { vacuuming_policy } => {
                write!(f, "vacuuming policy '{vacuuming_policy}' has no purpose")
            }
            Feedback::UnknownPurpose {
                vacuuming_policy,
                purpose,
            } => write!(
                f,
                "vacuuming policy '{vacuuming_policy}' references unknown purpose '{purpose}'"
            ),
            Feedback::UnknownVacuumingPolicy { name } => {
                write!(f, "vacuuming policy '{name}' does not exist")
            }
        }
    }
}

/// Ordered, duplicate-free collection of feedback for one pass.
#[derive(Debug, Default)]
pub(crate) struct FeedbackSink {
    items: Vec<Feedback>,
}

impl FeedbackSink {
    pub(crate) fn push(&mut self, feedback: Feedback) {
        if !self.items.contains(&feedback) {
            self.items.push(feedback);
        }
    }

    pub(crate) fn into_vec(self) -> Vec<Feedback> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_drops_duplicates() {
        let mut sink = FeedbackSink::default();
        sink.push(Feedback::MissingStoragePolicy {
            purpose: "analytics".into(),
        });
        sink.push(Feedback::MissingColumn {
            storage_policy: "sp-1".into(),
        });
        sink.push(Feedback::MissingStoragePolicy {
            purpose: "analytics".into(),
        });

        let items = sink.into_vec();
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Feedback::MissingStoragePolicy { .. }));
    }

    #[test]
    fn test_display() {
        let feedback = Feedback::UnknownColumn {
            storage_policy: "sp-1".into(),
            column: ColumnKey::new("users", "phone"),
        };
        assert_eq!(
            feedback.to_string(),
            "storage policy 'sp-1' references unknown column 'users.phone' and is ignored"
        );
    }
}
