use super::column::{ColumnKey, PersonalDataColumn};
use super::policy::{StoragePolicy, VacuumingPolicy};
use super::purpose::Purpose;
use std::collections::BTreeMap;

/// Read-only view of the bookkeeping data for one vacuuming pass.
///
/// Collections are keyed by identifier and iterate in key order, which keeps
/// everything derived from a snapshot deterministic.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    purposes: BTreeMap<String, Purpose>,
    storage_policies: BTreeMap<String, StoragePolicy>,
    columns: BTreeMap<ColumnKey, PersonalDataColumn>,
    vacuuming_policies: BTreeMap<String, VacuumingPolicy>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_purpose(&mut self, purpose: Purpose) {
        self.purposes.insert(purpose.id.clone(), purpose);
    }

    pub fn insert_storage_policy(&mut self, policy: StoragePolicy) {
        self.storage_policies.insert(policy.id.clone(), policy);
    }

    pub fn insert_column(&mut self, column: PersonalDataColumn) {
        self.columns.insert(column.key.clone(), column);
    }

    pub fn insert_vacuuming_policy(&mut self, policy: VacuumingPolicy) {
        self.vacuuming_policies.insert(policy.id.clone(), policy);
    }

    pub fn purpose(&self, id: &str) -> Option<&Purpose> {
        self.purposes.get(id)
    }

    pub fn storage_policy(&self, id: &str) -> Option<&StoragePolicy> {
        self.storage_policies.get(id)
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&PersonalDataColumn> {
        self.columns.get(key)
    }

    pub fn vacuuming_policy(&self, id: &str) -> Option<&VacuumingPolicy> {
        self.vacuuming_policies.get(id)
    }

    pub fn purposes(&self) -> impl Iterator<Item = &Purpose> {
        self.purposes.values()
    }

    pub fn storage_policies(&self) -> impl Iterator<Item = &StoragePolicy> {
        self.storage_policies.values()
    }

    pub fn columns(&self) -> impl Iterator<Item = &PersonalDataColumn> {
        self.columns.values()
    }

    pub fn vacuuming_policies(&self) -> impl Iterator<Item = &VacuumingPolicy> {
        self.vacuuming_policies.values()
    }

    pub fn is_empty(&self) -> bool {
        self.purposes.is_empty()
            && self.storage_policies.is_empty()
            && self.columns.is_empty()
            && self.vacuuming_policies.is_empty()
    }
}
