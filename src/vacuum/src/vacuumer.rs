//! The vacuuming service: load a snapshot, resolve, execute, report.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::{FailurePolicy, VacuumConfig};
use common::model::{Snapshot, VacuumingPolicy};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::execution::DeletionExecution;
use crate::executor::QueryExecutor;
use crate::feedback::{Feedback, FeedbackSink};
use crate::metrics::VacuumMetrics;
use crate::report::{ExecutionOutcome, OutcomeStatus, SkipReason, Trigger, VacuumReport};
use crate::resolver::{PolicyIndex, Resolution};
use crate::scheduler::due_policies;
use crate::source::{SnapshotSource, SourceError};

#[derive(thiserror::Error, Debug)]
pub enum VacuumError {
    #[error("A vacuuming pass is already in flight")]
    PassInFlight,
    #[error("Failed to load snapshot: {0}")]
    Snapshot(#[source] SourceError),
}

/// Public operations of the vacuuming engine.
#[async_trait]
pub trait VacuumService: Send + Sync {
    /// System-wide pass over every column reachable from any purpose.
    async fn run_all(&self) -> Result<VacuumReport, VacuumError>;

    /// Targeted pass for the named vacuuming policies, in the given order.
    async fn run_policies(&self, names: &[String]) -> Result<VacuumReport, VacuumError>;

    /// Targeted pass for every vacuuming policy due at `now`.
    async fn run_due(&self, now: DateTime<Utc>) -> Result<VacuumReport, VacuumError>;

    /// System-wide resolution without executing anything.
    async fn plan(&self) -> Result<Resolution, VacuumError>;
}

/// Default [`VacuumService`] over a snapshot source and a query executor.
///
/// Only one executing pass runs at a time. A trigger arriving while a pass is
/// in flight fails with [`VacuumError::PassInFlight`] instead of queueing.
pub struct Vacuumer {
    source: Arc<dyn SnapshotSource>,
    executor: Arc<dyn QueryExecutor>,
    config: VacuumConfig,
    metrics: VacuumMetrics,
    in_flight: Mutex<()>,
}

/// Mutable state of one batch while statements are handed to the executor.
struct Batch {
    report: VacuumReport,
    feedback: FeedbackSink,
    aborted: bool,
}

impl Vacuumer {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        executor: Arc<dyn QueryExecutor>,
        config: VacuumConfig,
        metrics: VacuumMetrics,
    ) -> Self {
        Self {
            source,
            executor,
            config,
            metrics,
            in_flight: Mutex::new(()),
        }
    }

    pub fn metrics(&self) -> &VacuumMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &VacuumConfig {
        &self.config
    }

    async fn load_snapshot(&self) -> Result<Snapshot, VacuumError> {
        self.source
            .load_snapshot()
            .await
            .map_err(VacuumError::Snapshot)
    }

    fn begin(&self, trigger: Trigger, started_at: DateTime<Utc>) -> Batch {
        let report = VacuumReport::start(trigger, started_at, self.config.dry_run);
        info!(
            run_id = %report.run_id,
            trigger = ?report.trigger,
            dry_run = self.config.dry_run,
            "Starting vacuuming pass"
        );
        Batch {
            report,
            feedback: FeedbackSink::default(),
            aborted: false,
        }
    }

    fn finish(&self, batch: Batch) -> VacuumReport {
        let mut report = batch.report;
        report.feedback = batch.feedback.into_vec();
        report.completed_at = Utc::now().max(report.started_at);
        self.metrics.record_report(&report);
        report
    }

    /// Hand executions to the executor one at a time, in order.
    ///
    /// Returns `true` when every execution was applied.
    async fn execute_all(&self, batch: &mut Batch, executions: Vec<DeletionExecution>) -> bool {
        let mut all_applied = true;

        for execution in executions {
            let status = if batch.aborted {
                OutcomeStatus::Skipped {
                    reason: SkipReason::Aborted,
                }
            } else if self.config.dry_run {
                info!(
                    run_id = %batch.report.run_id,
                    statement = %execution.statement,
                    "Dry run: statement not executed"
                );
                OutcomeStatus::Skipped {
                    reason: SkipReason::DryRun,
                }
            } else {
                debug!(
                    run_id = %batch.report.run_id,
                    statement = %execution.statement,
                    "Executing deletion statement"
                );
                match self.executor.execute(&execution.statement).await {
                    Ok(rows_affected) => OutcomeStatus::Applied { rows_affected },
                    Err(e) => {
                        warn!(
                            run_id = %batch.report.run_id,
                            table = %execution.table,
                            column = %execution.column,
                            error = %e,
                            "Deletion statement failed"
                        );
                        if self.config.on_failure == FailurePolicy::Abort {
                            batch.aborted = true;
                        }
                        OutcomeStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };

            all_applied &= matches!(status, OutcomeStatus::Applied { .. });
            batch
                .report
                .outcomes
                .push(ExecutionOutcome { execution, status });
        }

        all_applied
    }

    async fn run_targeted(
        &self,
        trigger: Trigger,
        started_at: DateTime<Utc>,
        snapshot: &Snapshot,
        policies: Vec<&VacuumingPolicy>,
        unknown: Vec<Feedback>,
    ) -> VacuumReport {
        let mut batch = self.begin(trigger, started_at);
        for feedback in unknown {
            batch.feedback.push(feedback);
        }
        let index = PolicyIndex::build(snapshot);

        for policy in policies {
            let resolution = index.enforce(policy);
            for feedback in resolution.feedback {
                batch.feedback.push(feedback);
            }

            let succeeded = self.execute_all(&mut batch, resolution.executions).await;
            if !succeeded || self.config.dry_run {
                continue;
            }

            match self.source.record_execution(&policy.id, started_at).await {
                Ok(()) => batch.report.advanced_policies.push(policy.id.clone()),
                Err(e) => warn!(
                    vacuuming_policy = %policy.id,
                    error = %e,
                    "Failed to record vacuuming policy execution"
                ),
            }
        }

        self.finish(batch)
    }
}

#[async_trait]
impl VacuumService for Vacuumer {
    async fn run_all(&self) -> Result<VacuumReport, VacuumError> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            self.metrics.record_pass_rejected();
            VacuumError::PassInFlight
        })?;

        let started_at = Utc::now();
        let snapshot = self.load_snapshot().await?;
        let resolution = PolicyIndex::build(&snapshot).generate_all();

        let mut batch = self.begin(Trigger::All, started_at);
        for feedback in resolution.feedback {
            batch.feedback.push(feedback);
        }
        self.execute_all(&mut batch, resolution.executions).await;

        Ok(self.finish(batch))
    }

    async fn run_policies(&self, names: &[String]) -> Result<VacuumReport, VacuumError> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            self.metrics.record_pass_rejected();
            VacuumError::PassInFlight
        })?;

        let started_at = Utc::now();
        let snapshot = self.load_snapshot().await?;

        // Repeated names run once, in first-seen order.
        let mut seen = BTreeSet::new();
        let names: Vec<String> = names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        let mut unknown = Vec::new();
        let mut policies = Vec::new();
        for name in &names {
            match snapshot.vacuuming_policy(name) {
                Some(policy) => policies.push(policy),
                None => unknown.push(Feedback::UnknownVacuumingPolicy { name: name.clone() }),
            }
        }

        let trigger = Trigger::Policies { names };
        Ok(self
            .run_targeted(trigger, started_at, &snapshot, policies, unknown)
            .await)
    }

    async fn run_due(&self, now: DateTime<Utc>) -> Result<VacuumReport, VacuumError> {
        let _guard = self.in_flight.try_lock().map_err(|_| {
            self.metrics.record_pass_rejected();
            VacuumError::PassInFlight
        })?;

        let snapshot = self.load_snapshot().await?;
        let due = due_policies(&snapshot, now);
        debug!(due = due.len(), "Resolved due vacuuming policies");

        Ok(self
            .run_targeted(Trigger::Due { at: now }, now, &snapshot, due, Vec::new())
            .await)
    }

    async fn plan(&self) -> Result<Resolution, VacuumError> {
        let snapshot = self.load_snapshot().await?;
        Ok(PolicyIndex::build(&snapshot).generate_all())
    }
}
