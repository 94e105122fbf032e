//! Fluent builder for bookkeeping snapshots used in tests.

use chrono::{DateTime, Utc};

use crate::model::{PersonalDataColumn, Purpose, Snapshot, StoragePolicy, VacuumingPolicy};

/// Builder for creating test snapshots.
///
/// Links are recorded on the side that is most convenient to write: purposes
/// list their storage policies, vacuuming policies list their purposes.
#[derive(Debug, Clone, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a purpose applying the given storage policies.
    pub fn purpose(mut self, id: &str, storage_policies: &[&str]) -> Self {
        let purpose = storage_policies
            .iter()
            .fold(Purpose::new(id, format!("{id} purpose")), |p, sp| {
                p.with_storage_policy(*sp)
            });
        self.snapshot.insert_purpose(purpose);
        self
    }

    /// Add a personal-data column.
    pub fn column(mut self, table: &str, column: &str, default_value: &str) -> Self {
        self.snapshot
            .insert_column(PersonalDataColumn::new(table, column, default_value));
        self
    }

    /// Add a storage policy bound to `(table, column)`.
    pub fn storage_policy(mut self, id: &str, condition: &str, column: (&str, &str)) -> Self {
        self.snapshot
            .insert_storage_policy(StoragePolicy::new(id, condition).for_column(column.0, column.1));
        self
    }

    /// Add a storage policy without a column, which makes it invalid.
    pub fn dangling_storage_policy(mut self, id: &str, condition: &str) -> Self {
        self.snapshot
            .insert_storage_policy(StoragePolicy::new(id, condition));
        self
    }

    /// Add a vacuuming policy for the given purposes.
    ///
    /// # Panics
    ///
    /// Panics if `duration` is not a valid retention period.
    pub fn vacuuming_policy(mut self, id: &str, duration: &str, purposes: &[&str]) -> Self {
        let policy = purposes.iter().fold(
            VacuumingPolicy::new(id, duration).expect("test duration must be valid"),
            |p, purpose| p.with_purpose(*purpose),
        );
        self.snapshot.insert_vacuuming_policy(policy);
        self
    }

    /// Set the last execution of an already added vacuuming policy.
    ///
    /// # Panics
    ///
    /// Panics if no vacuuming policy with that id was added.
    pub fn last_execution(mut self, id: &str, at: DateTime<Utc>) -> Self {
        let policy = self
            .snapshot
            .vacuuming_policy(id)
            .cloned()
            .expect("vacuuming policy must be added first")
            .with_last_execution(at);
        self.snapshot.insert_vacuuming_policy(policy);
        self
    }

    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}
