//! Result of one vacuuming pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::execution::DeletionExecution;
use crate::feedback::Feedback;

/// What started a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// System-wide pass over every column.
    All,
    /// Targeted pass for named vacuuming policies.
    Policies { names: Vec<String> },
    /// Targeted pass for every policy due at `at`.
    Due { at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DryRun,
    /// An earlier statement failed under the abort failure policy.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied { rows_affected: u64 },
    Failed { error: String },
    Skipped { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub execution: DeletionExecution,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

impl ExecutionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self.status, OutcomeStatus::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, OutcomeStatus::Skipped { .. })
    }
}

/// Outcome of a pass, handed back to whoever triggered it.
#[derive(Debug, Clone, Serialize)]
pub struct VacuumReport {
    pub run_id: Uuid,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    /// One entry per generated statement, in execution order.
    pub outcomes: Vec<ExecutionOutcome>,
    pub feedback: Vec<Feedback>,
    /// Vacuuming policies whose `LastExecution` was advanced.
    pub advanced_policies: Vec<String>,
}

impl VacuumReport {
    pub(crate) fn start(trigger: Trigger, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            trigger,
            started_at,
            completed_at: started_at,
            dry_run,
            outcomes: Vec::new(),
            feedback: Vec::new(),
            advanced_policies: Vec::new(),
        }
    }

    pub fn applied(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    pub fn rows_affected(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match o.status {
                OutcomeStatus::Applied { rows_affected } => rows_affected,
                _ => 0,
            })
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn log(&self) {
        for feedback in &self.feedback {
            feedback.log();
        }

        for outcome in &self.outcomes {
            if let OutcomeStatus::Failed { error } = &outcome.status {
                warn!(
                    run_id = %self.run_id,
                    table = %outcome.execution.table,
                    column = %outcome.execution.column,
                    error = %error,
                    "Deletion statement failed"
                );
            }
        }

        info!(
            run_id = %self.run_id,
            trigger = ?self.trigger,
            dry_run = self.dry_run,
            statements = self.outcomes.len(),
            applied = self.applied(),
            failed = self.failed(),
            skipped = self.skipped(),
            rows_affected = self.rows_affected(),
            feedback = self.feedback.len(),
            advanced_policies = ?self.advanced_policies,
            duration_ms = (self.completed_at - self.started_at).num_milliseconds(),
            "Vacuuming pass completed"
        );
    }
}
