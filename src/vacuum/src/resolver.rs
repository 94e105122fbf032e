//! Policy resolution: turning bookkeeping data into deletion statements.
//!
//! ## Conjunctive retention
//!
//! A column may only be overwritten once every purpose bound to it agrees the
//! data may go. Both passes therefore build the predicate for a column from
//! *all* valid storage policies bound to that column across the snapshot,
//! regardless of which purpose or vacuuming policy led the resolver there.
//!
//! ## Passes
//!
//! - [`PolicyIndex::generate_all`]: one execution per column reachable from
//!   any purpose, ordered by `(table, column)`.
//! - [`PolicyIndex::enforce`]: one execution per column reachable from the
//!   purposes of a vacuuming policy, in first-encounter order.
//!
//! Resolution is pure: the same snapshot always yields the same executions
//! and feedback.

use std::collections::{BTreeMap, BTreeSet};

use common::model::{ColumnKey, Purpose, Snapshot, StoragePolicy, VacuumingPolicy};
use serde::Serialize;

use crate::execution::{DeletionExecution, build_statement};
use crate::feedback::{Feedback, FeedbackSink};

/// Executions and diagnostics produced by one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub executions: Vec<DeletionExecution>,
    pub feedback: Vec<Feedback>,
}

/// Per-pass index from personal-data columns to the storage policies
/// protecting them.
///
/// Built once from a snapshot and queried many times within the pass. Links
/// recorded on either side of a relation (purpose → storage policy or storage
/// policy → purpose, and likewise for vacuuming policies) are merged.
#[derive(Debug)]
pub struct PolicyIndex<'a> {
    snapshot: &'a Snapshot,
    /// Valid storage policies per column, sorted by storage policy id.
    by_column: BTreeMap<&'a ColumnKey, Vec<&'a StoragePolicy>>,
    /// Storage policies excluded from resolution and why.
    invalid: BTreeMap<&'a str, Feedback>,
    purposes_of_policy: BTreeMap<&'a str, BTreeSet<&'a str>>,
    policies_of_purpose: BTreeMap<&'a str, BTreeSet<&'a str>>,
    purposes_of_vacuuming: BTreeMap<&'a str, BTreeSet<&'a str>>,
}

impl<'a> PolicyIndex<'a> {
    pub fn build(snapshot: &'a Snapshot) -> Self {
        let mut by_column: BTreeMap<&ColumnKey, Vec<&StoragePolicy>> = BTreeMap::new();
        let mut invalid = BTreeMap::new();
        let mut purposes_of_policy: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut policies_of_purpose: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut purposes_of_vacuuming: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();

        // Snapshot iteration is in id order, so every Vec ends up sorted.
        for policy in snapshot.storage_policies() {
            match &policy.column {
                None => {
                    invalid.insert(
                        policy.id.as_str(),
                        Feedback::MissingColumn {
                            storage_policy: policy.id.clone(),
                        },
                    );
                }
                Some(key) => match snapshot.column(key) {
                    Some(column) => by_column.entry(&column.key).or_default().push(policy),
                    None => {
                        invalid.insert(
                            policy.id.as_str(),
                            Feedback::UnknownColumn {
                                storage_policy: policy.id.clone(),
                                column: key.clone(),
                            },
                        );
                    }
                },
            }

            for purpose_id in &policy.purposes {
                purposes_of_policy
                    .entry(policy.id.as_str())
                    .or_default()
                    .insert(purpose_id.as_str());
                policies_of_purpose
                    .entry(purpose_id.as_str())
                    .or_default()
                    .insert(policy.id.as_str());
            }
        }

        for purpose in snapshot.purposes() {
            for policy_id in &purpose.storage_policies {
                policies_of_purpose
                    .entry(purpose.id.as_str())
                    .or_default()
                    .insert(policy_id.as_str());
                purposes_of_policy
                    .entry(policy_id.as_str())
                    .or_default()
                    .insert(purpose.id.as_str());
            }
            for vacuuming_id in &purpose.vacuuming_policies {
                purposes_of_vacuuming
                    .entry(vacuuming_id.as_str())
                    .or_default()
                    .insert(purpose.id.as_str());
            }
        }

        for vacuuming in snapshot.vacuuming_policies() {
            for purpose_id in &vacuuming.purposes {
                purposes_of_vacuuming
                    .entry(vacuuming.id.as_str())
                    .or_default()
                    .insert(purpose_id.as_str());
            }
        }

        Self {
            snapshot,
            by_column,
            invalid,
            purposes_of_policy,
            policies_of_purpose,
            purposes_of_vacuuming,
        }
    }

    /// Valid storage policies bound to `column`, sorted by id.
    pub fn policies_for(&self, column: &ColumnKey) -> &[&'a StoragePolicy] {
        self.by_column
            .get(column)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// System-wide pass over every column reachable from any purpose.
    pub fn generate_all(&self) -> Resolution {
        let mut feedback = FeedbackSink::default();
        let mut reached = BTreeSet::new();

        for purpose in self.snapshot.purposes() {
            reached.extend(self.columns_of_purpose(purpose, &mut feedback));
        }

        // Invalid policies no purpose points at are still worth reporting.
        for problem in self.invalid.values() {
            feedback.push(problem.clone());
        }

        let executions = reached
            .into_iter()
            .filter_map(|key| self.execution_for(key, None))
            .collect();

        Resolution {
            executions,
            feedback: feedback.into_vec(),
        }
    }

    /// Targeted pass for the purposes of one vacuuming policy.
    pub fn enforce(&self, vacuuming: &VacuumingPolicy) -> Resolution {
        let mut feedback = FeedbackSink::default();

        let mut purpose_ids: BTreeSet<&str> =
            vacuuming.purposes.iter().map(String::as_str).collect();
        if let Some(linked) = self.purposes_of_vacuuming.get(vacuuming.id.as_str()) {
            purpose_ids.extend(linked.iter().copied());
        }

        if purpose_ids.is_empty() {
            feedback.push(Feedback::MissingPurpose {
                vacuuming_policy: vacuuming.id.clone(),
            });
            return Resolution {
                executions: vec![],
                feedback: feedback.into_vec(),
            };
        }

        let mut seen = BTreeSet::new();
        let mut executions = vec![];

        for purpose_id in purpose_ids {
            let Some(purpose) = self.snapshot.purpose(purpose_id) else {
                feedback.push(Feedback::UnknownPurpose {
                    vacuuming_policy: vacuuming.id.clone(),
                    purpose: purpose_id.to_string(),
                });
                continue;
            };

            for key in self.columns_of_purpose(purpose, &mut feedback) {
                if !seen.insert(key) {
                    continue;
                }
                if let Some(execution) = self.execution_for(key, Some(vacuuming.id.as_str())) {
                    executions.push(execution);
                }
            }
        }

        Resolution {
            executions,
            feedback: feedback.into_vec(),
        }
    }

    /// Columns protected by the valid storage policies of `purpose`.
    fn columns_of_purpose(
        &self,
        purpose: &Purpose,
        feedback: &mut FeedbackSink,
    ) -> Vec<&'a ColumnKey> {
        let Some(policy_ids) = self.policies_of_purpose.get(purpose.id.as_str()) else {
            feedback.push(Feedback::MissingStoragePolicy {
                purpose: purpose.id.clone(),
            });
            return vec![];
        };

        let mut columns = vec![];
        for policy_id in policy_ids {
            let Some(policy) = self.snapshot.storage_policy(policy_id) else {
                feedback.push(Feedback::UnknownStoragePolicy {
                    purpose: purpose.id.clone(),
                    storage_policy: policy_id.to_string(),
                });
                continue;
            };

            if let Some(problem) = self.invalid.get(*policy_id) {
                feedback.push(problem.clone());
                continue;
            }

            if let Some(key) = &policy.column {
                columns.push(key);
            }
        }
        columns
    }

    /// Build the execution for `key` from every valid policy bound to it.
    fn execution_for(&self, key: &ColumnKey, trigger: Option<&str>) -> Option<DeletionExecution> {
        let column = self.snapshot.column(key)?;
        let policies = self.policies_for(key);
        if policies.is_empty() {
            return None;
        }

        let conditions: Vec<&str> = policies.iter().map(|p| p.condition.as_str()).collect();
        let purposes = policies
            .iter()
            .filter_map(|p| self.purposes_of_policy.get(p.id.as_str()))
            .flatten()
            .map(|purpose| purpose.to_string())
            .collect();

        Some(DeletionExecution {
            table: key.table.clone(),
            column: key.column.clone(),
            statement: build_statement(column, &conditions),
            purposes,
            vacuuming_policy: trigger.map(str::to_string),
        })
    }
}

/// System-wide pass over `snapshot`.
pub fn generate_all(snapshot: &Snapshot) -> Resolution {
    PolicyIndex::build(snapshot).generate_all()
}

/// Targeted pass for `vacuuming` over `snapshot`.
pub fn enforce(snapshot: &Snapshot, vacuuming: &VacuumingPolicy) -> Resolution {
    PolicyIndex::build(snapshot).enforce(vacuuming)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::SnapshotBuilder;

    fn where_clause(statement: &str) -> BTreeSet<String> {
        let (_, predicate) = statement.split_once(" WHERE ").unwrap();
        predicate
            .trim_end_matches(';')
            .split(" AND ")
            .map(str::to_string)
            .collect()
    }

    /// Two unrelated purposes protect `customers.email`; only marketing has a
    /// vacuuming policy.
    fn shared_column_snapshot() -> Snapshot {
        SnapshotBuilder::new()
            .column("customers", "email", "")
            .column("customers", "phone", "000")
            .storage_policy("sp-marketing", "consent_withdrawn = 1", ("customers", "email"))
            .storage_policy("sp-billing", "invoice_settled = 1", ("customers", "email"))
            .storage_policy("sp-phone", "created_at < '2020-01-01'", ("customers", "phone"))
            .purpose("marketing", &["sp-marketing", "sp-phone"])
            .purpose("billing", &["sp-billing"])
            .vacuuming_policy("marketing-cleanup", "1d", &["marketing"])
            .build()
    }

    #[test]
    fn test_generate_all_conjoins_every_policy_per_column() {
        let resolution = generate_all(&shared_column_snapshot());

        assert!(resolution.feedback.is_empty());
        assert_eq!(resolution.executions.len(), 2);

        let email = &resolution.executions[0];
        assert_eq!((email.table.as_str(), email.column.as_str()), ("customers", "email"));
        assert_eq!(
            email.statement,
            "UPDATE customers SET email = '' WHERE (invoice_settled = 1) AND (consent_withdrawn = 1);"
        );
        assert_eq!(
            email.purposes,
            BTreeSet::from(["billing".to_string(), "marketing".to_string()])
        );
        assert!(email.vacuuming_policy.is_none());

        let phone = &resolution.executions[1];
        assert_eq!(phone.column, "phone");
        assert_eq!(
            phone.statement,
            "UPDATE customers SET phone = '000' WHERE (created_at < '2020-01-01');"
        );
    }

    #[test]
    fn test_enforce_includes_conditions_of_unrelated_purposes() {
        let snapshot = shared_column_snapshot();
        let trigger = snapshot.vacuuming_policy("marketing-cleanup").unwrap();

        let resolution = enforce(&snapshot, trigger);
        let email = resolution
            .executions
            .iter()
            .find(|e| e.column == "email")
            .unwrap();

        assert_eq!(
            where_clause(&email.statement),
            BTreeSet::from([
                "(consent_withdrawn = 1)".to_string(),
                "(invoice_settled = 1)".to_string(),
            ])
        );
        assert!(email.purposes.contains("billing"));
        assert_eq!(email.vacuuming_policy.as_deref(), Some("marketing-cleanup"));
    }

    #[test]
    fn test_enforce_matches_generate_all_statement_for_same_column() {
        let snapshot = shared_column_snapshot();
        let trigger = snapshot.vacuuming_policy("marketing-cleanup").unwrap();

        let targeted = enforce(&snapshot, trigger);
        let system_wide = generate_all(&snapshot);

        for execution in &targeted.executions {
            let twin = system_wide
                .executions
                .iter()
                .find(|e| e.table == execution.table && e.column == execution.column)
                .unwrap();
            assert_eq!(twin.statement, execution.statement);
            assert_eq!(twin.purposes, execution.purposes);
        }
    }

    #[test]
    fn test_condition_set_is_independent_of_insertion_order() {
        let forward = SnapshotBuilder::new()
            .column("t", "c", "")
            .storage_policy("a", "x > 1", ("t", "c"))
            .storage_policy("b", "y > 2", ("t", "c"))
            .purpose("p", &["a", "b"])
            .build();
        let reversed = SnapshotBuilder::new()
            .purpose("p", &["b", "a"])
            .storage_policy("b", "y > 2", ("t", "c"))
            .storage_policy("a", "x > 1", ("t", "c"))
            .column("t", "c", "")
            .build();

        assert_eq!(generate_all(&forward), generate_all(&reversed));
    }

    #[test]
    fn test_storage_policy_without_column_is_excluded() {
        let snapshot = SnapshotBuilder::new()
            .column("users", "name", "anonymous")
            .storage_policy("sp-valid", "deleted = 1", ("users", "name"))
            .dangling_storage_policy("sp-broken", "1 = 1")
            .purpose("accounts", &["sp-valid", "sp-broken"])
            .build();

        let resolution = generate_all(&snapshot);

        assert_eq!(resolution.executions.len(), 1);
        assert!(!resolution.executions[0].statement.contains("1 = 1"));
        assert_eq!(
            resolution.feedback,
            vec![Feedback::MissingColumn {
                storage_policy: "sp-broken".into()
            }]
        );
    }

    #[test]
    fn test_storage_policy_with_unknown_column_is_excluded() {
        let snapshot = SnapshotBuilder::new()
            .storage_policy("sp-ghost", "1 = 1", ("ghosts", "name"))
            .purpose("haunting", &["sp-ghost"])
            .build();

        let resolution = generate_all(&snapshot);

        assert!(resolution.executions.is_empty());
        assert_eq!(
            resolution.feedback,
            vec![Feedback::UnknownColumn {
                storage_policy: "sp-ghost".into(),
                column: ColumnKey::new("ghosts", "name"),
            }]
        );
    }

    #[test]
    fn test_unreachable_invalid_policy_is_still_reported() {
        let snapshot = SnapshotBuilder::new()
            .dangling_storage_policy("sp-orphan", "1 = 1")
            .build();

        let resolution = generate_all(&snapshot);
        assert_eq!(
            resolution.feedback,
            vec![Feedback::MissingColumn {
                storage_policy: "sp-orphan".into()
            }]
        );
    }

    #[test]
    fn test_purpose_without_storage_policy_yields_feedback() {
        let snapshot = SnapshotBuilder::new()
            .purpose("analytics", &[])
            .vacuuming_policy("weekly", "7d", &["analytics"])
            .build();

        let resolution = generate_all(&snapshot);
        assert!(resolution.executions.is_empty());
        assert_eq!(
            resolution.feedback,
            vec![Feedback::MissingStoragePolicy {
                purpose: "analytics".into()
            }]
        );

        let resolution = enforce(&snapshot, snapshot.vacuuming_policy("weekly").unwrap());
        assert!(resolution.executions.is_empty());
        assert_eq!(
            resolution.feedback,
            vec![Feedback::MissingStoragePolicy {
                purpose: "analytics".into()
            }]
        );
    }

    #[test]
    fn test_vacuuming_policy_without_purpose_yields_feedback() {
        let snapshot = SnapshotBuilder::new()
            .vacuuming_policy("idle", "1h", &[])
            .build();

        let resolution = enforce(&snapshot, snapshot.vacuuming_policy("idle").unwrap());
        assert!(resolution.executions.is_empty());
        assert_eq!(
            resolution.feedback,
            vec![Feedback::MissingPurpose {
                vacuuming_policy: "idle".into()
            }]
        );
    }

    #[test]
    fn test_unknown_links_yield_feedback() {
        let snapshot = SnapshotBuilder::new()
            .purpose("support", &["sp-missing"])
            .vacuuming_policy("nightly", "1d", &["support", "nobody"])
            .build();

        let resolution = enforce(&snapshot, snapshot.vacuuming_policy("nightly").unwrap());
        assert!(resolution.executions.is_empty());
        assert_eq!(
            resolution.feedback,
            vec![
                Feedback::UnknownPurpose {
                    vacuuming_policy: "nightly".into(),
                    purpose: "nobody".into(),
                },
                Feedback::UnknownStoragePolicy {
                    purpose: "support".into(),
                    storage_policy: "sp-missing".into(),
                },
            ]
        );
    }

    #[test]
    fn test_column_reached_twice_yields_one_execution() {
        let snapshot = SnapshotBuilder::new()
            .column("customers", "email", "")
            .storage_policy("sp-a", "a = 1", ("customers", "email"))
            .storage_policy("sp-b", "b = 1", ("customers", "email"))
            .purpose("newsletter", &["sp-a"])
            .purpose("surveys", &["sp-b"])
            .vacuuming_policy("monthly", "1m", &["newsletter", "surveys"])
            .build();

        let resolution = enforce(&snapshot, snapshot.vacuuming_policy("monthly").unwrap());
        assert_eq!(resolution.executions.len(), 1);
        assert_eq!(
            resolution.executions[0].statement,
            "UPDATE customers SET email = '' WHERE (a = 1) AND (b = 1);"
        );
    }

    #[test]
    fn test_links_recorded_on_either_side_are_merged() {
        let mut snapshot = Snapshot::new();
        snapshot.insert_column(common::model::PersonalDataColumn::new("t", "c", "-"));
        snapshot.insert_storage_policy(
            StoragePolicy::new("sp", "old = 1")
                .for_column("t", "c")
                .with_purpose("p"),
        );
        snapshot.insert_purpose(Purpose::new("p", "policy-side link").with_vacuuming_policy("v"));
        snapshot.insert_vacuuming_policy(VacuumingPolicy::new("v", "2h").unwrap());

        let resolution = enforce(&snapshot, snapshot.vacuuming_policy("v").unwrap());
        assert!(resolution.feedback.is_empty());
        assert_eq!(resolution.executions.len(), 1);
        assert_eq!(
            resolution.executions[0].purposes,
            BTreeSet::from(["p".to_string()])
        );
    }

    #[test]
    fn test_policy_without_purpose_still_guards_its_column() {
        let mut snapshot = SnapshotBuilder::new()
            .column("t", "c", "")
            .storage_policy("sp-owned", "x = 1", ("t", "c"))
            .purpose("p", &["sp-owned"])
            .build();
        snapshot.insert_storage_policy(StoragePolicy::new("sp-legal-hold", "hold = 0").for_column("t", "c"));

        let resolution = generate_all(&snapshot);
        assert_eq!(
            resolution.executions[0].statement,
            "UPDATE t SET c = '' WHERE (hold = 0) AND (x = 1);"
        );
    }

    #[test]
    fn test_generate_all_is_pure() {
        let snapshot = shared_column_snapshot();
        assert_eq!(generate_all(&snapshot), generate_all(&snapshot));
    }
}
