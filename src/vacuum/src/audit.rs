//! Audit hooks around the public vacuum operations.
//!
//! [`Audited`] wraps any [`VacuumService`] and calls an [`AuditHook`] before
//! and after each operation, so audit concerns stay out of the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::report::VacuumReport;
use crate::resolver::Resolution;
use crate::vacuumer::{VacuumError, VacuumService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    RunAll,
    RunPolicies { names: Vec<String> },
    RunDue { now: DateTime<Utc> },
    Plan,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::RunAll => "run_all",
            Operation::RunPolicies { .. } => "run_policies",
            Operation::RunDue { .. } => "run_due",
            Operation::Plan => "plan",
        }
    }
}

/// What an audited operation produced.
#[derive(Debug, Clone, Copy)]
pub enum AuditOutcome<'a> {
    Report(&'a VacuumReport),
    Plan(&'a Resolution),
    Error(&'a VacuumError),
}

pub trait AuditHook: Send + Sync {
    fn before(&self, operation: &Operation);

    fn after(&self, operation: &Operation, outcome: AuditOutcome<'_>);
}

/// Audit hook writing one structured event before and after each operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditHook;

impl AuditHook for TracingAuditHook {
    fn before(&self, operation: &Operation) {
        info!(operation = operation.name(), details = ?operation, "Vacuum operation requested");
    }

    fn after(&self, operation: &Operation, outcome: AuditOutcome<'_>) {
        match outcome {
            AuditOutcome::Report(report) => info!(
                operation = operation.name(),
                run_id = %report.run_id,
                applied = report.applied(),
                failed = report.failed(),
                skipped = report.skipped(),
                advanced_policies = ?report.advanced_policies,
                "Vacuum operation finished"
            ),
            AuditOutcome::Plan(resolution) => info!(
                operation = operation.name(),
                statements = resolution.executions.len(),
                feedback = resolution.feedback.len(),
                "Vacuum plan computed"
            ),
            AuditOutcome::Error(error) => warn!(
                operation = operation.name(),
                error = %error,
                "Vacuum operation failed"
            ),
        }
    }
}

/// A [`VacuumService`] decorated with audit hooks.
pub struct Audited<S, H> {
    inner: S,
    hook: H,
}

impl<S, H> Audited<S, H> {
    pub fn new(inner: S, hook: H) -> Self {
        Self { inner, hook }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, H: AuditHook> Audited<S, H> {
    fn after_report(&self, operation: &Operation, result: &Result<VacuumReport, VacuumError>) {
        match result {
            Ok(report) => self.hook.after(operation, AuditOutcome::Report(report)),
            Err(e) => self.hook.after(operation, AuditOutcome::Error(e)),
        }
    }
}

#[async_trait]
impl<S: VacuumService, H: AuditHook> VacuumService for Audited<S, H> {
    async fn run_all(&self) -> Result<VacuumReport, VacuumError> {
        let operation = Operation::RunAll;
        self.hook.before(&operation);
        let result = self.inner.run_all().await;
        self.after_report(&operation, &result);
        result
    }

    async fn run_policies(&self, names: &[String]) -> Result<VacuumReport, VacuumError> {
        let operation = Operation::RunPolicies {
            names: names.to_vec(),
        };
        self.hook.before(&operation);
        let result = self.inner.run_policies(names).await;
        self.after_report(&operation, &result);
        result
    }

    async fn run_due(&self, now: DateTime<Utc>) -> Result<VacuumReport, VacuumError> {
        let operation = Operation::RunDue { now };
        self.hook.before(&operation);
        let result = self.inner.run_due(now).await;
        self.after_report(&operation, &result);
        result
    }

    async fn plan(&self) -> Result<Resolution, VacuumError> {
        let operation = Operation::Plan;
        self.hook.before(&operation);
        let result = self.inner.plan().await;
        match &result {
            Ok(resolution) => self.hook.after(&operation, AuditOutcome::Plan(resolution)),
            Err(e) => self.hook.after(&operation, AuditOutcome::Error(e)),
        }
        result
    }
}
