use super::column::ColumnKey;
use super::duration::{DurationError, RetentionPeriod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single retention rule: a condition, the column it protects and the
/// purposes invoking it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePolicy {
    pub id: String,
    /// Boolean predicate in the backing store's query language, e.g.
    /// `created_at < now() - interval '30 days'`. Opaque to the engine.
    pub condition: String,
    /// The protected column. A policy without one is invalid.
    #[serde(default)]
    pub column: Option<ColumnKey>,
    #[serde(default)]
    pub purposes: BTreeSet<String>,
}

impl StoragePolicy {
    pub fn new(id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            condition: condition.into(),
            column: None,
            purposes: BTreeSet::new(),
        }
    }

    pub fn for_column(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.column = Some(ColumnKey::new(table, column));
        self
    }

    pub fn with_purpose(mut self, purpose_id: impl Into<String>) -> Self {
        self.purposes.insert(purpose_id.into());
        self
    }
}

/// A named, schedulable trigger enforcing retention for a set of purposes.
///
/// The duration can only be set through [`VacuumingPolicy::new`] or
/// [`VacuumingPolicy::set_duration`], both of which reject strings outside
/// the grammar, so a stored policy always carries a valid period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacuumingPolicy {
    pub id: String,
    duration: RetentionPeriod,
    #[serde(default)]
    pub last_execution: Option<DateTime<Utc>>,
    #[serde(default)]
    pub purposes: BTreeSet<String>,
}

impl VacuumingPolicy {
    pub fn new(id: impl Into<String>, duration: &str) -> Result<Self, DurationError> {
        Ok(Self {
            id: id.into(),
            duration: RetentionPeriod::parse(duration)?,
            last_execution: None,
            purposes: BTreeSet::new(),
        })
    }

    pub fn duration(&self) -> RetentionPeriod {
        self.duration
    }

    /// Replace the duration. On error the previous value is kept.
    pub fn set_duration(&mut self, duration: &str) -> Result<(), DurationError> {
        self.duration = RetentionPeriod::parse(duration)?;
        Ok(())
    }

    pub fn with_purpose(mut self, purpose_id: impl Into<String>) -> Self {
        self.purposes.insert(purpose_id.into());
        self
    }

    pub fn with_last_execution(mut self, at: DateTime<Utc>) -> Self {
        self.last_execution = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_invalid_duration() {
        let result = VacuumingPolicy::new("nightly", "every night");
        assert_eq!(
            result.unwrap_err(),
            DurationError::InvalidDurationFormat("every night".to_string())
        );
    }

    #[test]
    fn test_set_duration_keeps_previous_value_on_error() {
        let mut policy = VacuumingPolicy::new("weekly", "7d").unwrap();

        assert!(policy.set_duration("1 week").is_err());
        assert_eq!(policy.duration().days, 7);

        policy.set_duration("1m").unwrap();
        assert_eq!(policy.duration().months, 1);
        assert_eq!(policy.duration().days, 0);
    }

    #[test]
    fn test_deserialize_validates_duration() {
        let json = r#"{"id":"p","duration":"12x","purposes":[]}"#;
        assert!(serde_json::from_str::<VacuumingPolicy>(json).is_err());

        let json = r#"{"id":"p","duration":"12h","purposes":["billing"]}"#;
        let policy: VacuumingPolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.duration().hours, 12);
        assert!(policy.last_execution.is_none());
    }
}
