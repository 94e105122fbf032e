//! Deletion executions: one UPDATE statement per personal-data column.

use common::model::PersonalDataColumn;
use serde::Serialize;
use std::collections::BTreeSet;

/// The computed result of resolution for one column.
///
/// Created fresh on every pass and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionExecution {
    pub table: String,
    pub column: String,
    /// The exact statement handed to the execution boundary.
    pub statement: String,
    /// Union of the purposes of every storage policy in the conjunction.
    pub purposes: BTreeSet<String>,
    /// Vacuuming policy that triggered the run, `None` for system-wide passes.
    pub vacuuming_policy: Option<String>,
}

/// Build `UPDATE <table> SET <column> = '<default>' WHERE (<c1>) AND (<c2>)...;`.
///
/// Conditions are emitted in the given order; callers pass them sorted by
/// storage policy id. Quotes in the default value are doubled.
pub fn build_statement(column: &PersonalDataColumn, conditions: &[&str]) -> String {
    let predicate = conditions
        .iter()
        .map(|condition| format!("({condition})"))
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "UPDATE {} SET {} = '{}' WHERE {};",
        column.key.table,
        column.key.column,
        column.default_value.replace('\'', "''"),
        predicate
    )
}
